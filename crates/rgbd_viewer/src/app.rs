use crate::{
    camera::{Camera, CameraController},
    config::Config,
    player::{PlayerContext, PlayerSettings},
    renderer::{GpuSink, Renderer},
    ui::{self, Action, PanelState},
};
use anyhow::Result;
use std::{sync::Arc, time::Instant};
use winit::{
    event::{ElementState, WindowEvent},
    keyboard::PhysicalKey,
    window::Window,
};

pub struct App {
    pub renderer: Renderer,
    pub camera: Camera,
    pub camera_controller: CameraController,
    pub player: PlayerContext,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    stereo: bool,
    last_frame: Instant,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let calibration = config.load_calibration()?;
        let sphere = Arc::new(config.sphere());
        let (loader, scenes) = config.scene_source()?;

        let renderer = Renderer::new(window.clone(), &sphere).await?;
        let size = renderer.gfx.size;

        let mut camera = Camera::new(1.0);
        camera.set_aspect(size.width, size.height);

        let settings = PlayerSettings {
            layer_count: config.layers,
            ..PlayerSettings::default()
        };
        let mut player =
            PlayerContext::new(loader, scenes, sphere, calibration).with_settings(settings);
        player.init()?;

        let egui_ctx = egui::Context::default();
        let egui_state =
            egui_winit::State::new(egui_ctx.clone(), egui_ctx.viewport_id(), &*window, None, None);

        Ok(Self {
            renderer,
            camera,
            camera_controller: CameraController::new(),
            player,
            egui_ctx,
            egui_state,
            stereo: config.stereo,
            last_frame: Instant::now(),
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            self.camera.set_aspect(new_size.width, new_size.height);
        }
    }

    /// Returns true when the event was consumed.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        if let WindowEvent::KeyboardInput { event: key, .. } = event {
            if key.state == ElementState::Pressed && !key.repeat {
                if let PhysicalKey::Code(code) = key.physical_key {
                    if let Some(action) = ui::key_action(code, &self.panel_state()) {
                        self.apply(action);
                        return true;
                    }
                }
            }
        }

        if self.camera_controller.handle_event(event, &mut self.camera) {
            return true;
        }

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    pub fn apply(&mut self, action: Action) {
        let result = match action {
            Action::TogglePlayback => self.player.toggle_playback().map(|_| ()),
            Action::NextScene => self.player.next_scene(),
            Action::SetLayerCount(n) => {
                self.player.set_layer_count(n);
                Ok(())
            }
            Action::SetEffects { desaturation, colored } => {
                self.player.set_visual_effects(desaturation, colored);
                Ok(())
            }
            Action::SetDebugDepth(on) => {
                self.player.set_debug_depth(on);
                Ok(())
            }
            Action::SetStereo(on) => {
                self.stereo = on;
                log::info!("Stereo preview {}", if on { "on" } else { "off" });
                Ok(())
            }
            Action::Recenter => {
                self.player.recenter(self.camera.rig(self.stereo).head_position());
                Ok(())
            }
        };
        if let Err(e) = result {
            log::warn!("{action:?} failed: {e}");
        }
    }

    fn panel_state(&self) -> PanelState {
        let settings = self.player.settings();
        PanelState {
            scene: self.player.current_scene().map(str::to_string),
            loading: self.player.loading_scene().map(str::to_string),
            playing: self.player.active().is_some_and(|c| c.is_playing()),
            layer_count: settings.layer_count,
            desaturation: settings.effects.desaturation,
            colored: settings.effects.colored,
            debug_depth: settings.debug_depth,
            stereo: self.stereo,
            error: self.player.last_error().map(str::to_string),
        }
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f64();
        self.last_frame = now;

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.camera_controller.update(dt as f32, &mut self.camera);
        let rig = self.camera.rig(self.stereo);
        let mut sink = GpuSink::default();
        self.player.tick(dt, &rig, &mut sink);
        self.renderer
            .render(&swap_view, self.player.active(), &sink.draws, rig.is_stereo());

        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);
        let state = self.panel_state();
        ui::draw_hud(&self.egui_ctx, &state);
        let actions = ui::draw_panel(&self.egui_ctx, &state);
        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);

        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.renderer.gfx.config.width, self.renderer.gfx.config.height],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("UI Encoder") });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer
                .egui_renderer
                .update_texture(&self.renderer.gfx.device, &self.renderer.gfx.queue, *id, delta);
        }
        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer.gfx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();

        for action in actions {
            self.apply(action);
        }
        Ok(())
    }
}
