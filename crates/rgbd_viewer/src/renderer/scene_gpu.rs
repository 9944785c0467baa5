//! GPU copies of the active asset set.
//!
//! One texture per [`TextureId`], re-uploaded whenever its source publishes a
//! new frame. Textures of a previous asset set are destroyed as soon as they
//! are no longer bound, so two sets never hold the same slot for long.

use super::pipelines::depth_layers::binding;
use crate::{
    camera::MAX_EYES,
    compositor::Compositor,
    layer::{LayerKind, LayerUniforms, Material},
    media::TextureId,
};
use std::collections::{HashMap, HashSet};

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    size: (u32, u32),
    generation: u64,
}

impl GpuTexture {
    fn new(device: &wgpu::Device, label: &str, size: (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            size,
            generation: u64::MAX,
        }
    }

    fn write(&self, queue: &wgpu::Queue, rgba8: &[u8]) {
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba8,
            upload_layout(self.size),
            extent(self.size),
        );
    }
}

/// Tightly packed RGBA8 rows, matching a frame's `as_raw()` bytes.
fn upload_layout((width, height): (u32, u32)) -> wgpu::ImageDataLayout {
    wgpu::ImageDataLayout {
        offset: 0,
        bytes_per_row: Some(4 * width),
        rows_per_image: Some(height),
    }
}

fn extent((width, height): (u32, u32)) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

/// Color, alpha and the three depth views of one material.
type MaterialViews<'a> = (&'a wgpu::TextureView, &'a wgpu::TextureView, [&'a wgpu::TextureView; 3]);

pub struct SceneGpu {
    textures: HashMap<TextureId, GpuTexture>,
    /// Stands in for the alpha of opaque layers.
    white: GpuTexture,
    sampler: wgpu::Sampler,
    uniforms: [[wgpu::Buffer; MAX_EYES]; 3],
    bind_groups: Option<[[wgpu::BindGroup; MAX_EYES]; 3]>,
}

impl SceneGpu {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let white = GpuTexture::new(device, "white 1x1", (1, 1));
        white.write(queue, &[255; 4]);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Layer Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniforms = LayerKind::ALL.map(|kind| {
            [0, 1].map(|eye| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("{} uniforms eye {eye}", kind.label())),
                    size: std::mem::size_of::<LayerUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
        });

        Self {
            textures: HashMap::new(),
            white,
            sampler,
            uniforms,
            bind_groups: None,
        }
    }

    /// Brings the GPU textures in line with `compositor`'s asset set.
    pub fn sync(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        compositor: &Compositor,
    ) {
        let assets = compositor.assets();
        let wanted: HashSet<TextureId> = assets.texture_ids().into_iter().collect();

        let before = self.textures.len();
        self.textures.retain(|id, t| {
            let keep = wanted.contains(id);
            if !keep {
                t.texture.destroy();
            }
            keep
        });
        let mut rebind = self.textures.len() != before;

        for id in &wanted {
            let Some(source) = assets.source(*id) else {
                continue;
            };
            if !source.is_ready() {
                continue;
            }
            let size = (source.width(), source.height());
            let stale = self.textures.get(id).map_or(true, |t| t.size != size);
            if stale {
                if let Some(old) = self.textures.remove(id) {
                    old.texture.destroy();
                }
                let label = format!("{} tex {}", assets.name(), id.raw());
                self.textures.insert(*id, GpuTexture::new(device, &label, size));
                rebind = true;
            }
            if let Some(t) = self.textures.get_mut(id) {
                if t.generation != source.generation() {
                    t.write(queue, source.frame().as_raw());
                    t.generation = source.generation();
                }
            }
        }

        if rebind || self.bind_groups.is_none() {
            self.bind_groups = self.build_bind_groups(device, layout, compositor);
            if self.bind_groups.is_some() {
                log::debug!("Bound {} textures for '{}'", self.textures.len(), assets.name());
            }
        }
    }

    pub fn write_uniforms(
        &self,
        queue: &wgpu::Queue,
        kind: LayerKind,
        eye: usize,
        uniforms: &LayerUniforms,
    ) {
        queue.write_buffer(&self.uniforms[kind.index()][eye], 0, bytemuck::bytes_of(uniforms));
    }

    pub fn bind_group(&self, kind: LayerKind, eye: usize) -> Option<&wgpu::BindGroup> {
        self.bind_groups.as_ref().map(|g| &g[kind.index()][eye])
    }

    /// Destroys every texture of the current set.
    pub fn clear(&mut self) {
        for (_, t) in self.textures.drain() {
            t.texture.destroy();
        }
        self.bind_groups = None;
    }

    fn build_bind_groups(
        &self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        compositor: &Compositor,
    ) -> Option<[[wgpu::BindGroup; MAX_EYES]; 3]> {
        let mut all = Vec::with_capacity(3);
        for kind in LayerKind::ALL {
            let (color, alpha, depth) = self.material_views(compositor.layer(kind).material())?;
            let groups = [0usize, 1].map(|eye| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&format!("{} layer eye {eye}", kind.label())),
                    layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: binding::UNIFORMS,
                            resource: self.uniforms[kind.index()][eye].as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: binding::SAMPLER,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                        wgpu::BindGroupEntry {
                            binding: binding::COLOR,
                            resource: wgpu::BindingResource::TextureView(color),
                        },
                        wgpu::BindGroupEntry {
                            binding: binding::ALPHA,
                            resource: wgpu::BindingResource::TextureView(alpha),
                        },
                        wgpu::BindGroupEntry {
                            binding: binding::DEPTH[0],
                            resource: wgpu::BindingResource::TextureView(depth[0]),
                        },
                        wgpu::BindGroupEntry {
                            binding: binding::DEPTH[1],
                            resource: wgpu::BindingResource::TextureView(depth[1]),
                        },
                        wgpu::BindGroupEntry {
                            binding: binding::DEPTH[2],
                            resource: wgpu::BindingResource::TextureView(depth[2]),
                        },
                    ],
                })
            });
            all.push(groups);
        }
        all.try_into().ok()
    }

    /// Views for color, alpha and the three depth slots; `None` until all are uploaded.
    fn material_views(&self, m: &Material) -> Option<MaterialViews<'_>> {
        let view = |id: TextureId| self.textures.get(&id).map(|t| &t.view);
        let alpha = match m.alpha {
            Some(id) => view(id)?,
            None => &self.white.view,
        };
        Some((view(m.color)?, alpha, [view(m.depth[0])?, view(m.depth[1])?, view(m.depth[2])?]))
    }
}
