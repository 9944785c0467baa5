//! The three fixed layers of the depth compositor.

use crate::{
    assets::{RgbdAssetSet, Slot},
    camera::MAX_EYES,
    media::TextureId,
};
use depthwarp::{Calibration, DepthEncoding};
use glam::Vec3;

/// Layer identity. Declaration order is render order, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    /// Inpainted panorama behind everything else. Opaque.
    Background,
    /// Static extrapolation of the scene around the live patch.
    ExtrapolatedForeground,
    /// The live video patch with view-dependent opacity.
    MovingForeground,
}

impl LayerKind {
    pub const ALL: [LayerKind; 3] = [
        LayerKind::Background,
        LayerKind::ExtrapolatedForeground,
        LayerKind::MovingForeground,
    ];

    /// Painter's-algorithm order; the depth warp is not a real occlusion test.
    #[inline]
    pub fn render_order(self) -> i32 {
        match self {
            LayerKind::Background => 0,
            LayerKind::ExtrapolatedForeground => 1,
            LayerKind::MovingForeground => 2,
        }
    }

    /// Smallest layer count at which this layer is shown.
    #[inline]
    pub fn min_layer_count(self) -> u32 {
        self.render_order() as u32 + 1
    }

    #[inline]
    pub fn index(self) -> usize {
        self.render_order() as usize
    }

    pub fn encoding(self, calibration: &Calibration) -> DepthEncoding {
        match self {
            LayerKind::Background => calibration.background(),
            LayerKind::ExtrapolatedForeground => calibration.extrapolated(),
            LayerKind::MovingForeground => calibration.moving(),
        }
    }

    /// Colour mixed in when the `colored` effect is on.
    pub fn tint(self) -> Vec3 {
        match self {
            LayerKind::Background => Vec3::new(0.4, 0.1, 0.8),
            LayerKind::ExtrapolatedForeground => Vec3::new(0.1, 0.9, 0.7),
            LayerKind::MovingForeground => Vec3::new(0.9, 0.8, 0.2),
        }
    }

    #[inline]
    pub fn is_blended(self) -> bool {
        !matches!(self, LayerKind::Background)
    }

    pub fn label(self) -> &'static str {
        match self {
            LayerKind::Background => "background",
            LayerKind::ExtrapolatedForeground => "extrapolated",
            LayerKind::MovingForeground => "moving",
        }
    }
}

/// Texture bindings of one layer.
///
/// The vertex stage decodes the minimum of the three depth slots. Layers with
/// fewer depth sources repeat one, which leaves the minimum unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Material {
    pub color: TextureId,
    /// `None` for opaque layers.
    pub alpha: Option<TextureId>,
    pub depth: [TextureId; 3],
}

impl Material {
    pub fn for_layer(kind: LayerKind, assets: &RgbdAssetSet) -> Self {
        let id = |slot| assets.id(slot);
        match kind {
            // Farthest of everything, so it never covers the layers in front.
            LayerKind::Background => Self {
                color: id(Slot::InpaintedColor),
                alpha: None,
                depth: [
                    id(Slot::InpaintedDepth),
                    id(Slot::ExtrapolatedDepth),
                    id(Slot::LiveDepth),
                ],
            },
            LayerKind::ExtrapolatedForeground => Self {
                color: id(Slot::ExtrapolatedColor),
                alpha: Some(id(Slot::ExtrapolatedAlpha)),
                depth: [
                    id(Slot::ExtrapolatedDepth),
                    id(Slot::LiveDepth),
                    id(Slot::LiveDepth),
                ],
            },
            LayerKind::MovingForeground => Self {
                color: id(Slot::LiveColor),
                alpha: Some(id(Slot::LiveAlpha)),
                depth: [id(Slot::LiveDepth); 3],
            },
        }
    }

    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        std::iter::once(self.color)
            .chain(self.alpha)
            .chain(self.depth.iter().copied())
    }
}

/// Per-layer, per-eye shader constants (std140).
/// Must match `LayerUniforms` in `shaders/common.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LayerUniforms {
    /// projection * view * world.
    pub mat_wvp: [[f32; 4]; 4],
    /// Group world transform.
    pub mat_world: [[f32; 4]; 4],
    /// Look-at from the eye toward the sphere centre.
    pub view_dir: [[f32; 4]; 4],
    pub sphere_center: [f32; 3],
    pub desat: f32,
    pub eye_pos: [f32; 3],
    /// 0.0 or 1.0.
    pub colored: f32,
    pub head_pos: [f32; 3],
    pub depth_scale: f32,
    pub tint: [f32; 3],
    pub depth_epsilon: f32,
    /// Logistic steepness, midpoint, distance floor, debug-depth flag.
    pub falloff: [f32; 4],
}

// Compile-time check against the WGSL-reflected size.
const _: [(); 272] = [(); core::mem::size_of::<LayerUniforms>()];

impl LayerUniforms {
    /// Constants that do not depend on the camera.
    pub fn new(kind: LayerKind, calibration: &Calibration) -> Self {
        let encoding = kind.encoding(calibration);
        let f = calibration.falloff;
        Self {
            mat_wvp: glam::Mat4::IDENTITY.to_cols_array_2d(),
            mat_world: glam::Mat4::IDENTITY.to_cols_array_2d(),
            view_dir: glam::Mat4::IDENTITY.to_cols_array_2d(),
            sphere_center: [0.0; 3],
            desat: 0.0,
            eye_pos: [0.0; 3],
            colored: 0.0,
            head_pos: [0.0; 3],
            depth_scale: encoding.scale,
            tint: kind.tint().to_array(),
            depth_epsilon: encoding.epsilon,
            falloff: [f.steepness, f.midpoint, f.distance_floor, 0.0],
        }
    }

    #[inline]
    pub fn debug_depth(&self) -> bool {
        self.falloff[3] > 0.5
    }
}

/// One mesh of the compositor: a material over the shared sphere.
#[derive(Debug, Clone)]
pub struct Layer {
    kind: LayerKind,
    material: Material,
    uniforms: [LayerUniforms; MAX_EYES],
    visible: bool,
}

impl Layer {
    pub fn new(kind: LayerKind, material: Material, calibration: &Calibration) -> Self {
        Self {
            kind,
            material,
            uniforms: [LayerUniforms::new(kind, calibration); MAX_EYES],
            visible: true,
        }
    }

    #[inline]
    pub fn kind(&self) -> LayerKind {
        self.kind
    }

    #[inline]
    pub fn render_order(&self) -> i32 {
        self.kind.render_order()
    }

    #[inline]
    pub fn material(&self) -> &Material {
        &self.material
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Uniforms last written for `eye`.
    #[inline]
    pub fn uniforms(&self, eye: usize) -> &LayerUniforms {
        &self.uniforms[eye]
    }

    pub(crate) fn uniforms_mut(&mut self, eye: usize) -> &mut LayerUniforms {
        &mut self.uniforms[eye]
    }

    /// Applies `f` to the uniforms of every eye.
    pub(crate) fn for_each_eye(&mut self, f: impl Fn(&mut LayerUniforms)) {
        self.uniforms.iter_mut().for_each(f);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::SyntheticLoader;

    #[test]
    fn render_order_is_strictly_back_to_front() {
        let orders: Vec<i32> = LayerKind::ALL.iter().map(|k| k.render_order()).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert!(LayerKind::Background < LayerKind::ExtrapolatedForeground);
        assert!(LayerKind::ExtrapolatedForeground < LayerKind::MovingForeground);
    }

    #[test]
    fn epsilon_per_layer() {
        let c = Calibration::default();
        let eps: Vec<f32> = LayerKind::ALL
            .iter()
            .map(|k| LayerUniforms::new(*k, &c).depth_epsilon)
            .collect();
        assert_eq!(eps, vec![0.001, 0.002, 0.003]);
    }

    #[test]
    fn background_material_takes_every_depth() {
        let set = SyntheticLoader::solid(4, 4, 0.5).build("m").unwrap();
        let bg = Material::for_layer(LayerKind::Background, &set);
        assert_eq!(
            bg.depth,
            [
                set.id(Slot::InpaintedDepth),
                set.id(Slot::ExtrapolatedDepth),
                set.id(Slot::LiveDepth)
            ]
        );
        assert!(bg.alpha.is_none());

        let mov = Material::for_layer(LayerKind::MovingForeground, &set);
        assert_eq!(mov.color, set.id(Slot::LiveColor));
        assert_eq!(mov.alpha, Some(set.id(Slot::LiveAlpha)));
        assert_eq!(mov.textures().count(), 5);
    }
}
