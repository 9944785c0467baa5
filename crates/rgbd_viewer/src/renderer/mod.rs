//! The wgpu side of the player. Owns the GPU context, the depth target, the
//! layer pipelines and the GPU copies of the active scene.

pub mod context;
pub mod pipelines;
pub mod scene_gpu;
pub mod targets;

use self::{
    context::GfxContext, pipelines::depth_layers::DepthLayerPipelines, scene_gpu::SceneGpu,
    targets::Targets,
};
use crate::{
    compositor::{Compositor, LayerDraw, LayerSink},
    layer::{LayerKind, LayerUniforms},
};
use depthwarp::SphereGeometry;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

/// A draw call captured from the compositor for later GPU submission.
#[derive(Debug, Clone, Copy)]
pub struct GpuDraw {
    pub kind: LayerKind,
    pub eye: usize,
    pub uniforms: LayerUniforms,
}

/// Collects one frame's draws in submission order.
#[derive(Debug, Default)]
pub struct GpuSink {
    pub draws: Vec<GpuDraw>,
}

impl LayerSink for GpuSink {
    fn draw_layer(&mut self, draw: LayerDraw<'_>) {
        self.draws.push(GpuDraw {
            kind: draw.kind,
            eye: draw.eye,
            uniforms: *draw.uniforms,
        });
    }
}

/// Viewport of `eye` in a `width` x `height` target: the whole target in mono,
/// the left or right half in stereo.
pub fn eye_viewport(eye: usize, stereo: bool, width: u32, height: u32) -> [f32; 4] {
    let (w, h) = (width as f32, height as f32);
    if stereo {
        [eye as f32 * w * 0.5, 0.0, w * 0.5, h]
    } else {
        [0.0, 0.0, w, h]
    }
}

pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    pub layers: DepthLayerPipelines,
    pub scene: SceneGpu,
    sphere_vb: wgpu::Buffer,
    sphere_ib: wgpu::Buffer,
    index_count: u32,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, sphere: &SphereGeometry) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let targets = Targets::new(&gfx.device, gfx.size);
        let layers = DepthLayerPipelines::new(&gfx.device, gfx.config.format, targets.depth_fmt);
        let scene = SceneGpu::new(&gfx.device, &gfx.queue);

        let sphere_vb = gfx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere VB"),
            contents: bytemuck::cast_slice(sphere.vertices()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let sphere_ib = gfx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere IB"),
            contents: bytemuck::cast_slice(sphere.indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        let (ws, hs) = sphere.segments();
        log::info!(
            "Sphere mesh: {ws}x{hs} segments, {} vertices, {} triangles",
            sphere.vertices().len(),
            sphere.indices().len() / 3
        );

        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            targets,
            layers,
            scene,
            sphere_vb,
            sphere_ib,
            index_count: sphere.indices().len() as u32,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    /// Draws one frame of layers into `swap_view`. With no active scene the
    /// frame is cleared to black and any leftover textures are released.
    pub fn render(
        &mut self,
        swap_view: &wgpu::TextureView,
        active: Option<&Compositor>,
        draws: &[GpuDraw],
        stereo: bool,
    ) {
        match active {
            Some(compositor) => self.scene.sync(
                &self.gfx.device,
                &self.gfx.queue,
                &self.layers.layer_layout,
                compositor,
            ),
            None => self.scene.clear(),
        }

        // Each (layer, eye) owns its buffer, so every write lands before the pass.
        for d in draws {
            self.scene.write_uniforms(&self.gfx.queue, d.kind, d.eye, &d.uniforms);
        }

        let mut encoder = self.gfx.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Layer Encoder"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Layer Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_vertex_buffer(0, self.sphere_vb.slice(..));
            pass.set_index_buffer(self.sphere_ib.slice(..), wgpu::IndexFormat::Uint32);
            let (w, h) = (self.gfx.config.width, self.gfx.config.height);
            for d in draws {
                let Some(bind) = self.scene.bind_group(d.kind, d.eye) else {
                    log::trace!("{} layer not bound yet; skipped", d.kind.label());
                    continue;
                };
                let [x, y, vw, vh] = eye_viewport(d.eye, stereo, w, h);
                pass.set_viewport(x, y, vw, vh, 0.0, 1.0);
                pass.set_pipeline(self.layers.pipeline(d.kind));
                pass.set_bind_group(0, bind, &[]);
                pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
        }
        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_viewports_split_the_window() {
        assert_eq!(eye_viewport(0, false, 800, 600), [0.0, 0.0, 800.0, 600.0]);
        assert_eq!(eye_viewport(0, true, 800, 600), [0.0, 0.0, 400.0, 600.0]);
        assert_eq!(eye_viewport(1, true, 800, 600), [400.0, 0.0, 400.0, 600.0]);
    }
}
