//! Overlay and keyboard controls. Both only produce [`Action`]s; the app
//! applies them to the player.

use winit::keyboard::KeyCode;

/// A user request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    TogglePlayback,
    NextScene,
    SetLayerCount(u32),
    SetEffects { desaturation: f32, colored: bool },
    SetDebugDepth(bool),
    SetStereo(bool),
    Recenter,
}

/// What the controls show; refreshed from the player every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub scene: Option<String>,
    pub loading: Option<String>,
    pub playing: bool,
    pub layer_count: u32,
    pub desaturation: f32,
    pub colored: bool,
    pub debug_depth: bool,
    pub stereo: bool,
    pub error: Option<String>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            scene: None,
            loading: None,
            playing: false,
            layer_count: 3,
            desaturation: 0.0,
            colored: false,
            debug_depth: false,
            stereo: false,
            error: None,
        }
    }
}

/// Maps a pressed key to its action.
pub fn key_action(key: KeyCode, state: &PanelState) -> Option<Action> {
    Some(match key {
        KeyCode::Space => Action::TogglePlayback,
        KeyCode::KeyN => Action::NextScene,
        KeyCode::Digit1 => Action::SetLayerCount(1),
        KeyCode::Digit2 => Action::SetLayerCount(2),
        KeyCode::Digit3 => Action::SetLayerCount(3),
        KeyCode::KeyR => Action::Recenter,
        KeyCode::KeyT => Action::SetEffects {
            desaturation: state.desaturation,
            colored: !state.colored,
        },
        KeyCode::KeyV => Action::SetStereo(!state.stereo),
        _ => return None,
    })
}

/// Scene name and playback state in the top-left corner.
pub fn draw_hud(ctx: &egui::Context, state: &PanelState) {
    egui::Area::new(egui::Id::new("hud"))
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .show(ctx, |ui| {
            let scene = state.scene.as_deref().unwrap_or("(no scene)");
            let status = if state.playing { "playing" } else { "paused" };
            ui.label(format!("{scene} | {status} | {} layer(s)", state.layer_count));
            if let Some(loading) = &state.loading {
                ui.label(format!("loading {loading}..."));
            }
            if let Some(err) = &state.error {
                ui.colored_label(egui::Color32::LIGHT_RED, err);
            }
        });
}

/// Settings window. Returns the actions of controls changed this frame.
pub fn draw_panel(ctx: &egui::Context, state: &PanelState) -> Vec<Action> {
    let mut actions = Vec::new();
    let mut edit = state.clone();

    egui::Window::new("Layers")
        .anchor(egui::Align2::RIGHT_TOP, [-8.0, 8.0])
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                let label = if state.playing { "Pause" } else { "Play" };
                if ui.button(label).clicked() {
                    actions.push(Action::TogglePlayback);
                }
                if ui.button("Next scene").clicked() {
                    actions.push(Action::NextScene);
                }
                if ui.button("Recenter").clicked() {
                    actions.push(Action::Recenter);
                }
            });
            ui.separator();

            if ui.add(egui::Slider::new(&mut edit.layer_count, 1..=3).text("layers")).changed() {
                actions.push(Action::SetLayerCount(edit.layer_count));
            }
            let desat =
                ui.add(egui::Slider::new(&mut edit.desaturation, 0.0..=1.0).text("desaturate"));
            let tint = ui.checkbox(&mut edit.colored, "tint layers");
            if desat.changed() || tint.changed() {
                actions.push(Action::SetEffects {
                    desaturation: edit.desaturation,
                    colored: edit.colored,
                });
            }
            if ui.checkbox(&mut edit.debug_depth, "show depth").changed() {
                actions.push(Action::SetDebugDepth(edit.debug_depth));
            }
            if ui.checkbox(&mut edit.stereo, "stereo preview").changed() {
                actions.push(Action::SetStereo(edit.stereo));
            }
        });

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_keys_pick_layer_count() {
        let s = PanelState::default();
        assert_eq!(key_action(KeyCode::Digit1, &s), Some(Action::SetLayerCount(1)));
        assert_eq!(key_action(KeyCode::Digit3, &s), Some(Action::SetLayerCount(3)));
        assert_eq!(key_action(KeyCode::KeyZ, &s), None);
    }

    #[test]
    fn toggles_flip_current_state() {
        let s = PanelState {
            desaturation: 0.25,
            colored: true,
            stereo: false,
            ..PanelState::default()
        };
        assert_eq!(
            key_action(KeyCode::KeyT, &s),
            Some(Action::SetEffects {
                desaturation: 0.25,
                colored: false
            })
        );
        assert_eq!(key_action(KeyCode::KeyV, &s), Some(Action::SetStereo(true)));
    }
}
