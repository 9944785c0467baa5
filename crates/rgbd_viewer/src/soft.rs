//! CPU evaluation of the layer shaders.
//!
//! [`SoftRenderer`] is a [`LayerSink`] that records every draw call and can run
//! the vertex stage over the whole sphere, the same way the WGSL does. It lets
//! the compositor be exercised without a GPU.

use crate::{
    compositor::{LayerDraw, LayerSink},
    layer::{LayerKind, LayerUniforms, Material},
    media::TextureId,
};
use depthwarp::{
    decode_inverse_depth, desaturate, displace, min_depth, tint, AlphaFalloff, SphereVertex,
};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Output of the vertex stage for one vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexOut {
    /// Displaced position in group space.
    pub position: Vec3,
    pub clip: Vec4,
    pub uv: Vec2,
    pub inverse_depth: f32,
}

/// One recorded draw call.
#[derive(Debug, Clone)]
pub struct DrawRecord {
    pub kind: LayerKind,
    pub eye: usize,
    pub render_order: i32,
    pub textures: Vec<TextureId>,
    pub uniforms: LayerUniforms,
    /// Filled only by an evaluating renderer.
    pub vertices: Vec<VertexOut>,
}

#[derive(Debug, Default)]
pub struct SoftRenderer {
    evaluate: bool,
    draws: Vec<DrawRecord>,
}

impl SoftRenderer {
    /// Records draw calls only.
    pub fn recording() -> Self {
        Self::default()
    }

    /// Records draw calls and runs the vertex stage for each.
    pub fn evaluating() -> Self {
        Self {
            evaluate: true,
            draws: Vec::new(),
        }
    }

    #[inline]
    pub fn draws(&self) -> &[DrawRecord] {
        &self.draws
    }

    /// Forgets the recorded frame.
    pub fn clear(&mut self) {
        self.draws.clear();
    }
}

impl LayerSink for SoftRenderer {
    fn draw_layer(&mut self, draw: LayerDraw<'_>) {
        let vertices = if self.evaluate {
            draw.geometry.vertices().iter().map(|v| vertex_stage(&draw, v)).collect()
        } else {
            Vec::new()
        };
        self.draws.push(DrawRecord {
            kind: draw.kind,
            eye: draw.eye,
            render_order: draw.render_order,
            textures: draw.material.textures().collect(),
            uniforms: *draw.uniforms,
            vertices,
        });
    }
}

fn sample(draw: &LayerDraw<'_>, id: TextureId, uv: Vec2) -> Vec4 {
    match draw.assets.source(id) {
        Some(source) => source.sample(uv),
        None => {
            log::warn!("{:?} not bound to asset set '{}'", id, draw.assets.name());
            Vec4::ZERO
        }
    }
}

/// Minimum raw depth over the material's depth slots.
fn depth_sample(draw: &LayerDraw<'_>, material: &Material, uv: Vec2) -> f32 {
    let samples = material.depth.map(|id| sample(draw, id, uv).x);
    min_depth(&samples)
}

/// Decoded inverse depth at `uv`, using the layer's own constants.
pub fn inverse_depth_at(draw: &LayerDraw<'_>, uv: Vec2) -> f32 {
    let u = draw.uniforms;
    decode_inverse_depth(depth_sample(draw, draw.material, uv), u.depth_scale, u.depth_epsilon)
}

pub fn vertex_stage(draw: &LayerDraw<'_>, vertex: &SphereVertex) -> VertexOut {
    let uv = Vec2::from(vertex.uv);
    let inverse_depth = inverse_depth_at(draw, uv);
    let position = displace(Vec3::from(vertex.position), inverse_depth);
    let clip = Mat4::from_cols_array_2d(&draw.uniforms.mat_wvp) * position.extend(1.0);
    VertexOut {
        position,
        clip,
        uv,
        inverse_depth,
    }
}

/// Straight-alpha RGBA for one fragment.
pub fn fragment_stage(draw: &LayerDraw<'_>, uv: Vec2) -> Vec4 {
    let u = draw.uniforms;
    if u.debug_depth() {
        // Nearer is brighter.
        let g = (u.depth_scale / inverse_depth_at(draw, uv)).clamp(0.0, 1.0);
        return Vec3::splat(g).extend(1.0);
    }

    let mut rgb = desaturate(sample(draw, draw.material.color, uv).truncate(), u.desat);
    if u.colored > 0.5 {
        rgb = tint(rgb, Vec3::from(u.tint));
    }

    let mask = draw.material.alpha.map_or(1.0, |id| sample(draw, id, uv).x);
    let alpha = match draw.kind {
        LayerKind::Background => 1.0,
        LayerKind::ExtrapolatedForeground => mask,
        LayerKind::MovingForeground => {
            let falloff = AlphaFalloff {
                steepness: u.falloff[0],
                midpoint: u.falloff[1],
                distance_floor: u.falloff[2],
            };
            falloff.corrected_alpha(mask, Vec3::from(u.head_pos), Vec3::from(u.sphere_center))
        }
    };
    rgb.extend(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::{RgbdAssetSet, SyntheticLoader},
        camera::Camera,
        compositor::Compositor,
        layer::LayerKind,
        media::{from_unorm8, to_unorm8},
    };
    use depthwarp::{Calibration, SphereGeometry};
    use std::sync::Arc;

    /// The depth a solid scene of `d` actually stores.
    fn stored(d: f32) -> f32 {
        from_unorm8(to_unorm8(d))
    }

    fn build(depth: f32, size: u32) -> Compositor {
        let set: RgbdAssetSet = SyntheticLoader::solid(size, size, depth).build("soft").unwrap();
        let sphere = Arc::new(SphereGeometry::inverted(6.0, 24, 12));
        Compositor::new(set, sphere, Calibration::default()).unwrap()
    }

    /// Runs `f` on the draw of `kind` for eye 0, after one mono frame.
    fn with_draw<R>(c: &mut Compositor, kind: LayerKind, f: impl FnOnce(&LayerDraw<'_>) -> R) -> R {
        let rig = Camera::new(1.0).rig(false);
        let mut sink = SoftRenderer::recording();
        c.update(&rig, &mut sink);
        let layer = c.layer(kind);
        let draw = LayerDraw {
            kind,
            eye: 0,
            render_order: layer.render_order(),
            material: layer.material(),
            uniforms: layer.uniforms(0),
            geometry: c.geometry(),
            assets: c.assets(),
        };
        f(&draw)
    }

    #[test]
    fn constant_depth_scales_every_vertex_by_the_reference_decode() {
        let mut c = build(0.5, 16);
        let rig = Camera::new(1.0).rig(false);
        let mut sink = SoftRenderer::evaluating();
        c.update(&rig, &mut sink);
        assert_eq!(sink.draws().len(), 3);

        for draw in sink.draws() {
            let eps = draw.uniforms.depth_epsilon;
            let expected = 0.3 / (stored(0.5) + eps);
            for (out, v) in draw.vertices.iter().zip(c.geometry().vertices()) {
                let radius = Vec3::from(v.position).length();
                assert!((out.inverse_depth - expected).abs() < 1e-5);
                assert!((out.position.length() - radius * expected).abs() < 1e-3);
            }
        }
        let magnitudes: Vec<f32> =
            sink.draws().iter().map(|d| d.vertices[0].inverse_depth).collect();
        assert!(magnitudes[0] > magnitudes[1] && magnitudes[1] > magnitudes[2]);
    }

    #[test]
    fn single_layer_frame_leaves_sphere_undisplaced() {
        // 0.299 + 0.001 decodes to one; 8-bit storage keeps it within half a step.
        let inv = 0.3 / (stored(0.299) + 0.001);
        assert!((inv - 1.0).abs() < 0.007);

        let mut c = build(0.299, 64);
        c.set_layer_count(1);
        let rig = Camera::new(1.0).rig(false);
        let mut sink = SoftRenderer::evaluating();
        c.update(&rig, &mut sink);

        assert_eq!(sink.draws().len(), 1);
        let bg = &sink.draws()[0];
        assert_eq!(bg.kind, LayerKind::Background);
        for (out, v) in bg.vertices.iter().zip(c.geometry().vertices()) {
            let rest = Vec3::from(v.position);
            assert!((out.inverse_depth - inv).abs() < 1e-5);
            assert!((out.position - rest * inv).length() < 1e-4);
            assert!((out.position - rest).length() <= rest.length() * 0.007);
        }
    }

    #[test]
    fn background_takes_the_farthest_depth() {
        let mut c = build(0.5, 4);
        with_draw(&mut c, LayerKind::Background, |draw| {
            let d = depth_sample(draw, draw.material, Vec2::splat(0.5));
            assert_eq!(d, stored(0.5));
        });
    }

    #[test]
    fn moving_alpha_follows_head_distance() {
        let mut c = build(0.5, 4);
        // Head exactly at the sphere centre: distance is the floor.
        let alpha = with_draw(&mut c, LayerKind::MovingForeground, |draw| {
            fragment_stage(draw, Vec2::splat(0.5)).w
        });
        let s = 1.0 / (1.0 + (-30.0f32 * (0.05 - 0.15)).exp());
        assert!((alpha - ((1.0 - s) + 1.0 * s)).abs() < 1e-6);

        let falloff = AlphaFalloff::default();
        let near = falloff.corrected_alpha(0.2, Vec3::ZERO, Vec3::ZERO);
        assert!((near - (0.2 * s + (1.0 - s))).abs() <= 0.01 * near);
    }

    #[test]
    fn tint_and_desaturation_reach_the_fragment() {
        let mut c = build(0.5, 4);
        c.set_visual_effects(1.0, false);
        let rgba = with_draw(&mut c, LayerKind::Background, |draw| {
            fragment_stage(draw, Vec2::splat(0.5))
        });
        assert!((rgba.x - rgba.y).abs() < 1e-6 && (rgba.y - rgba.z).abs() < 1e-6);
        assert_eq!(rgba.w, 1.0);

        c.set_visual_effects(0.0, true);
        let rgba = with_draw(&mut c, LayerKind::Background, |draw| {
            fragment_stage(draw, Vec2::splat(0.5))
        });
        let expected = Vec3::new(0.8, 0.4, 0.2).lerp(LayerKind::Background.tint(), 0.5);
        assert!((rgba.truncate() - expected).length() < 1e-5);
    }

    #[test]
    fn debug_depth_shows_grey() {
        let mut c = build(0.5, 4);
        c.set_debug_depth(true);
        let rgba = with_draw(&mut c, LayerKind::ExtrapolatedForeground, |draw| {
            fragment_stage(draw, Vec2::splat(0.5))
        });
        assert!((rgba.x - (stored(0.5) + 0.002)).abs() < 1e-4);
        assert_eq!(rgba.w, 1.0);
    }
}
