//! The three layer pipelines: one vertex stage, three fragment variants.

use crate::layer::{LayerKind, LayerUniforms};
use depthwarp::SphereVertex;

/// WGSL of every layer, sharing one set of bindings.
pub const LAYERS_WGSL: &str = concat!(
    include_str!("../../../shaders/common.wgsl"),
    include_str!("../../../shaders/background.wgsl"),
    include_str!("../../../shaders/extrapolated.wgsl"),
    include_str!("../../../shaders/moving.wgsl"),
);

/// Binding slots of group 0.
pub mod binding {
    pub const UNIFORMS: u32 = 0;
    pub const SAMPLER: u32 = 1;
    pub const COLOR: u32 = 2;
    pub const ALPHA: u32 = 3;
    pub const DEPTH: [u32; 3] = [4, 5, 6];
}

pub struct DepthLayerPipelines {
    pub layer_layout: wgpu::BindGroupLayout,
    pipelines: [wgpu::RenderPipeline; 3],
}

impl DepthLayerPipelines {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let texture = |binding, visibility| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let both = wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT;

        let layer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Layer BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: binding::UNIFORMS,
                    visibility: both,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<LayerUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: binding::SAMPLER,
                    visibility: both,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                texture(binding::COLOR, wgpu::ShaderStages::FRAGMENT),
                texture(binding::ALPHA, wgpu::ShaderStages::FRAGMENT),
                texture(binding::DEPTH[0], wgpu::ShaderStages::VERTEX),
                texture(binding::DEPTH[1], wgpu::ShaderStages::VERTEX),
                texture(binding::DEPTH[2], wgpu::ShaderStages::VERTEX),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/layers.wgsl"),
            source: wgpu::ShaderSource::Wgsl(LAYERS_WGSL.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Layer PipelineLayout"),
            bind_group_layouts: &[&layer_layout],
            push_constant_ranges: &[],
        });

        let vertex_layout = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<SphereVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
        }];

        let pipelines = LayerKind::ALL.map(|kind| {
            let label = format!("{} layer pipeline", kind.label());
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &vertex_layout,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                // Seen from inside; no face is ever culled.
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: depth_fmt,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: fragment_entry(kind),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_fmt,
                        blend: kind.is_blended().then_some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        });

        Self {
            layer_layout,
            pipelines,
        }
    }

    #[inline]
    pub fn pipeline(&self, kind: LayerKind) -> &wgpu::RenderPipeline {
        &self.pipelines[kind.index()]
    }
}

pub fn fragment_entry(kind: LayerKind) -> &'static str {
    match kind {
        LayerKind::Background => "fs_background",
        LayerKind::ExtrapolatedForeground => "fs_extrapolated",
        LayerKind::MovingForeground => "fs_moving",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fragment_entry_exists() {
        for kind in LayerKind::ALL {
            let entry = format!("fn {}(", fragment_entry(kind));
            assert!(LAYERS_WGSL.contains(&entry), "missing {entry}");
        }
        assert!(LAYERS_WGSL.contains("fn vs_main("));
    }

    #[test]
    fn wgsl_uniform_fields_follow_rust_order() {
        let fields = [
            "mat_wvp", "mat_world", "view_dir", "sphere_center", "desat", "eye_pos", "colored",
            "head_pos", "depth_scale", "tint", "depth_epsilon", "falloff",
        ];
        let positions: Vec<usize> = fields
            .iter()
            .map(|f| LAYERS_WGSL.find(&format!("    {f}:")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
