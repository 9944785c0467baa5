//! The scene driver: which scene is showing, which is loading, and the
//! presentation settings that survive a scene switch.

use crate::{
    assets::{PendingAssets, SceneLoader},
    camera::CameraRig,
    compositor::{Compositor, CompositorError, LayerSink, VisualEffects},
};
use depthwarp::{Calibration, SphereGeometry};
use glam::Vec3;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("no scenes to play")]
    NoScenes,
    #[error("scene index {index} out of range ({count} scenes)")]
    NoSuchScene { index: usize, count: usize },
    #[error("no scene is showing yet")]
    NoActiveScene,
    #[error(transparent)]
    Compositor(#[from] CompositorError),
}

/// Presentation state carried from one scene to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerSettings {
    pub layer_count: u32,
    pub effects: VisualEffects,
    pub debug_depth: bool,
    /// Start playing a scene as soon as it is installed.
    pub autoplay: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            layer_count: 3,
            effects: VisualEffects::default(),
            debug_depth: false,
            autoplay: true,
        }
    }
}

pub struct PlayerContext {
    loader: Box<dyn SceneLoader>,
    scenes: Vec<String>,
    current: usize,
    active: Option<Compositor>,
    pending: Option<(usize, PendingAssets)>,
    geometry: Arc<SphereGeometry>,
    calibration: Calibration,
    settings: PlayerSettings,
    last_error: Option<String>,
}

impl PlayerContext {
    pub fn new(
        loader: Box<dyn SceneLoader>,
        scenes: Vec<String>,
        geometry: Arc<SphereGeometry>,
        calibration: Calibration,
    ) -> Self {
        Self {
            loader,
            scenes,
            current: 0,
            active: None,
            pending: None,
            geometry,
            calibration,
            settings: PlayerSettings::default(),
            last_error: None,
        }
    }

    pub fn with_settings(mut self, settings: PlayerSettings) -> Self {
        self.settings = PlayerSettings {
            layer_count: settings.layer_count.clamp(1, 3),
            ..settings
        };
        self
    }

    /// Starts loading the first scene.
    pub fn init(&mut self) -> Result<(), PlayerError> {
        if self.scenes.is_empty() {
            return Err(PlayerError::NoScenes);
        }
        log::info!("Player starting with {} scene(s)", self.scenes.len());
        self.request(0);
        Ok(())
    }

    /// One frame: install a finished load, run the clocks, then draw.
    pub fn tick(&mut self, dt: f64, rig: &CameraRig, sink: &mut dyn LayerSink) {
        self.poll_pending();
        if let Some(active) = &mut self.active {
            active.advance(dt);
            active.update(rig, sink);
        }
    }

    pub fn next_scene(&mut self) -> Result<(), PlayerError> {
        if self.scenes.is_empty() {
            return Err(PlayerError::NoScenes);
        }
        // Step from the scene being loaded so repeated presses move on.
        let from = self.pending.as_ref().map_or(self.current, |(i, _)| *i);
        self.request((from + 1) % self.scenes.len());
        Ok(())
    }

    pub fn select_scene(&mut self, index: usize) -> Result<(), PlayerError> {
        if index >= self.scenes.len() {
            return Err(PlayerError::NoSuchScene {
                index,
                count: self.scenes.len(),
            });
        }
        self.request(index);
        Ok(())
    }

    pub fn toggle_playback(&mut self) -> Result<bool, PlayerError> {
        let active = self.active.as_mut().ok_or(PlayerError::NoActiveScene)?;
        Ok(active.toggle_playback()?)
    }

    pub fn set_layer_count(&mut self, n: u32) -> u32 {
        let applied = match &mut self.active {
            Some(active) => active.set_layer_count(n),
            None => n.clamp(1, 3),
        };
        self.settings.layer_count = applied;
        applied
    }

    pub fn set_visual_effects(&mut self, desaturation: f32, colored: bool) {
        if let Some(active) = &mut self.active {
            active.set_visual_effects(desaturation, colored);
            self.settings.effects = active.effects();
        } else {
            self.settings.effects = VisualEffects {
                desaturation: if desaturation.is_nan() {
                    0.0
                } else {
                    desaturation.clamp(0.0, 1.0)
                },
                colored,
            };
        }
    }

    pub fn set_debug_depth(&mut self, on: bool) {
        self.settings.debug_depth = on;
        if let Some(active) = &mut self.active {
            active.set_debug_depth(on);
        }
    }

    pub fn recenter(&mut self, head: Vec3) {
        if let Some(active) = &mut self.active {
            active.recenter(head);
        }
    }

    /// Tears down the active scene and abandons any load in flight.
    pub fn dispose(&mut self) {
        if let Some((_, pending)) = self.pending.take() {
            log::debug!("Abandoned load of '{}'", pending.scene());
        }
        if let Some(mut active) = self.active.take() {
            active.dispose();
        }
    }

    #[inline]
    pub fn active(&self) -> Option<&Compositor> {
        self.active.as_ref()
    }

    #[inline]
    pub fn scenes(&self) -> &[String] {
        &self.scenes
    }

    #[inline]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Name of the scene being shown, if any.
    pub fn current_scene(&self) -> Option<&str> {
        self.active.as_ref().map(|c| c.assets().name())
    }

    /// Name of the scene being loaded, if any.
    pub fn loading_scene(&self) -> Option<&str> {
        self.pending.as_ref().map(|(_, p)| p.scene())
    }

    #[inline]
    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    #[inline]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn request(&mut self, index: usize) {
        let Some(name) = self.scenes.get(index) else {
            return;
        };
        log::info!("Loading scene '{name}'");
        // Replacing an older request abandons it.
        self.pending = Some((index, self.loader.load(name)));
    }

    fn poll_pending(&mut self) {
        let Some((index, pending)) = &mut self.pending else {
            return;
        };
        let Some(result) = pending.poll() else {
            return;
        };
        let index = *index;
        let scene = pending.scene().to_string();
        self.pending = None;

        let installed = result
            .map_err(|e| e.to_string())
            .and_then(|set| {
                Compositor::new(set, self.geometry.clone(), self.calibration)
                    .map_err(|e| e.to_string())
            });
        match installed {
            Ok(next) => self.install(index, next),
            Err(msg) => {
                log::error!("Failed to load scene '{scene}': {msg}");
                self.last_error = Some(format!("{scene}: {msg}"));
            }
        }
    }

    fn install(&mut self, index: usize, mut next: Compositor) {
        if let Some(mut old) = self.active.take() {
            old.dispose();
        }
        let s = self.settings;
        next.set_layer_count(s.layer_count);
        next.set_visual_effects(s.effects.desaturation, s.effects.colored);
        next.set_debug_depth(s.debug_depth);
        self.last_error = None;
        if s.autoplay {
            if let Err(e) = next.toggle_playback() {
                log::warn!("Scene '{}' did not start: {e}", next.assets().name());
                self.last_error = Some(e.to_string());
            }
        }
        log::info!("Showing scene '{}'", next.assets().name());
        self.current = index;
        self.active = Some(next);
    }
}

impl Drop for PlayerContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
