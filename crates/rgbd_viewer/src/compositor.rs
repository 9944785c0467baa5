//! Binds one asset set to the three layers and keeps their uniforms in step
//! with the camera, one eye at a time.

use crate::{
    assets::{RgbdAssetSet, Slot},
    camera::{CameraRig, EyeCamera, EYE_HEIGHT_M},
    layer::{Layer, LayerKind, LayerUniforms, Material},
    media::TextureId,
    playback::PlaybackError,
};
use depthwarp::{Calibration, SphereGeometry};
use glam::{Mat4, Vec3};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CompositorError {
    #[error("cannot build layers: {slot:?} texture is not ready")]
    NotReady { slot: Slot },
    #[error("compositor has been disposed")]
    Disposed,
    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Lifecycle of a compositor. A compositor that failed to construct never
/// exists, so there is no uninitialised state to observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorState {
    /// Built, never played.
    Ready,
    Playing,
    Paused,
    Disposed,
}

/// Desaturation and tint applied uniformly to every layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualEffects {
    /// In [0, 1].
    pub desaturation: f32,
    pub colored: bool,
}

impl Default for VisualEffects {
    fn default() -> Self {
        Self {
            desaturation: 0.0,
            colored: false,
        }
    }
}

/// Per-eye values shared by every layer drawn for that eye.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeViewState {
    pub eye: usize,
    /// projection * view * group world.
    pub combined: Mat4,
    pub world: Mat4,
    /// Look-at from the eye toward the sphere centre.
    pub view_dir: Mat4,
    pub eye_position: Vec3,
    /// Shared by both eyes of a stereo rig.
    pub head_position: Vec3,
    pub sphere_center: Vec3,
}

/// Everything a sink needs to draw one layer for one eye.
#[derive(Clone, Copy)]
pub struct LayerDraw<'a> {
    pub kind: LayerKind,
    pub eye: usize,
    pub render_order: i32,
    pub material: &'a Material,
    pub uniforms: &'a LayerUniforms,
    pub geometry: &'a SphereGeometry,
    pub assets: &'a RgbdAssetSet,
}

/// Receives draw calls in the order they must be executed.
pub trait LayerSink {
    fn draw_layer(&mut self, draw: LayerDraw<'_>);
}

pub struct Compositor {
    assets: RgbdAssetSet,
    geometry: Arc<SphereGeometry>,
    layers: [Layer; 3],
    group_position: Vec3,
    /// Set once the group has been moved to a head pose.
    placed: bool,
    layer_count: u32,
    effects: VisualEffects,
    debug_depth: bool,
    started: bool,
    disposed: bool,
}

impl Compositor {
    /// Builds the three layers over `assets`. Every texture must be ready.
    pub fn new(
        assets: RgbdAssetSet,
        geometry: Arc<SphereGeometry>,
        calibration: Calibration,
    ) -> Result<Self, CompositorError> {
        if let Some(slot) = assets.first_unready() {
            return Err(CompositorError::NotReady { slot });
        }
        let layers = LayerKind::ALL
            .map(|kind| Layer::new(kind, Material::for_layer(kind, &assets), &calibration));
        log::info!(
            "Compositor ready for '{}' ({} sphere vertices)",
            assets.name(),
            geometry.vertices().len()
        );
        Ok(Self {
            assets,
            geometry,
            layers,
            group_position: Vec3::new(0.0, EYE_HEIGHT_M, 0.0),
            placed: false,
            layer_count: 3,
            effects: VisualEffects::default(),
            debug_depth: false,
            started: false,
            disposed: false,
        })
    }

    pub fn state(&self) -> CompositorState {
        if self.disposed {
            CompositorState::Disposed
        } else if self.assets.playback().is_playing() {
            CompositorState::Playing
        } else if self.started {
            CompositorState::Paused
        } else {
            CompositorState::Ready
        }
    }

    /// Writes every layer's uniforms for every eye of `rig` and hands the
    /// visible layers to `sink`, back to front within each eye. The first
    /// update centres the sphere on the head unless it was placed already.
    pub fn update(&mut self, rig: &CameraRig, sink: &mut dyn LayerSink) {
        if self.disposed {
            log::debug!("update() on a disposed compositor ignored");
            return;
        }
        debug_assert!(self.assets.all_ready(), "rendering with unready textures");

        let head = rig.head_position();
        if !self.placed {
            self.recenter(head);
        }
        for (index, eye) in rig.eyes().iter().enumerate() {
            let view = self.eye_view_state(index, eye, head);
            for kind in LayerKind::ALL {
                self.render_layer(kind, &view, sink);
            }
        }
    }

    /// Updates one layer's uniforms for one eye, then draws it if visible.
    pub fn render_layer(&mut self, kind: LayerKind, view: &EyeViewState, sink: &mut dyn LayerSink) {
        let effects = self.effects;
        let debug = self.debug_depth;
        let layer = &mut self.layers[kind.index()];
        let u = layer.uniforms_mut(view.eye);
        u.mat_wvp = view.combined.to_cols_array_2d();
        u.mat_world = view.world.to_cols_array_2d();
        u.view_dir = view.view_dir.to_cols_array_2d();
        u.sphere_center = view.sphere_center.to_array();
        u.eye_pos = view.eye_position.to_array();
        u.head_pos = view.head_position.to_array();
        u.desat = effects.desaturation;
        u.colored = if effects.colored { 1.0 } else { 0.0 };
        u.falloff[3] = if debug { 1.0 } else { 0.0 };

        if !layer.is_visible() {
            return;
        }
        let layer = &self.layers[kind.index()];
        sink.draw_layer(LayerDraw {
            kind,
            eye: view.eye,
            render_order: layer.render_order(),
            material: layer.material(),
            uniforms: layer.uniforms(view.eye),
            geometry: &self.geometry,
            assets: &self.assets,
        });
    }

    pub fn eye_view_state(&self, eye: usize, camera: &EyeCamera, head: Vec3) -> EyeViewState {
        let world = self.world_matrix();
        let center = self.sphere_center();
        EyeViewState {
            eye,
            combined: camera.projection * camera.view * world,
            world,
            view_dir: look_toward(camera.world_position, center),
            eye_position: camera.world_position,
            head_position: head,
            sphere_center: center,
        }
    }

    /// Shows the first `n` layers. Out-of-range values are clamped to 1..=3.
    /// Returns the count applied.
    pub fn set_layer_count(&mut self, n: u32) -> u32 {
        let n = n.clamp(1, 3);
        if self.disposed {
            return n;
        }
        for layer in &mut self.layers {
            layer.set_visible(n >= layer.kind().min_layer_count());
        }
        if n != self.layer_count {
            log::info!("Layer count {} -> {}", self.layer_count, n);
        }
        self.layer_count = n;
        n
    }

    pub fn set_visual_effects(&mut self, desaturation: f32, colored: bool) {
        let desaturation = if desaturation.is_nan() {
            0.0
        } else {
            desaturation.clamp(0.0, 1.0)
        };
        self.effects = VisualEffects { desaturation, colored };
        let c = if colored { 1.0 } else { 0.0 };
        for layer in &mut self.layers {
            layer.for_each_eye(|u| {
                u.desat = desaturation;
                u.colored = c;
            });
        }
    }

    pub fn set_debug_depth(&mut self, on: bool) {
        self.debug_depth = on;
    }

    /// Centres the sphere on `head`.
    pub fn recenter(&mut self, head: Vec3) {
        if head.is_finite() {
            self.group_position = head;
            self.placed = true;
            log::debug!("Recentered layers at {head:?}");
        }
    }

    /// Puts the sphere back at standing eye height over the origin.
    pub fn reset_origin(&mut self) {
        self.group_position = Vec3::new(0.0, EYE_HEIGHT_M, 0.0);
        self.placed = true;
    }

    pub fn toggle_playback(&mut self) -> Result<bool, CompositorError> {
        if self.disposed {
            return Err(CompositorError::Disposed);
        }
        let playing = self.assets.playback_mut().toggle()?;
        self.started = true;
        log::info!(
            "'{}' {}",
            self.assets.name(),
            if playing { "playing" } else { "paused" }
        );
        Ok(playing)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        !self.disposed && self.assets.playback().is_playing()
    }

    /// Runs the live clocks; the sampled frames follow on their own.
    pub fn advance(&mut self, dt: f64) {
        if !self.disposed {
            self.assets.playback_mut().advance(dt);
        }
    }

    /// Stops playback, releases every texture and hides every layer.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.assets.dispose();
        for layer in &mut self.layers {
            layer.set_visible(false);
        }
        self.disposed = true;
        log::info!("Disposed compositor for '{}'", self.assets.name());
    }

    #[inline]
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.group_position)
    }

    /// The group origin in world space.
    #[inline]
    pub fn sphere_center(&self) -> Vec3 {
        self.world_matrix().transform_point3(Vec3::ZERO)
    }

    #[inline]
    pub fn layer(&self, kind: LayerKind) -> &Layer {
        &self.layers[kind.index()]
    }

    #[inline]
    pub fn layers(&self) -> &[Layer; 3] {
        &self.layers
    }

    #[inline]
    pub fn layer_count(&self) -> u32 {
        self.layer_count
    }

    #[inline]
    pub fn effects(&self) -> VisualEffects {
        self.effects
    }

    #[inline]
    pub fn debug_depth(&self) -> bool {
        self.debug_depth
    }

    #[inline]
    pub fn assets(&self) -> &RgbdAssetSet {
        &self.assets
    }

    #[inline]
    pub fn geometry(&self) -> &Arc<SphereGeometry> {
        &self.geometry
    }

    /// Texture handles bound by visible layers.
    pub fn bound_textures(&self) -> Vec<TextureId> {
        let mut ids: Vec<TextureId> = self
            .layers
            .iter()
            .filter(|l| l.is_visible())
            .flat_map(|l| l.material().textures())
            .collect();
        ids.sort_by_key(|id| id.raw());
        ids.dedup();
        ids
    }
}

/// Look-at from `eye` toward `target`; an eye at the target looks down -Z.
fn look_toward(eye: Vec3, target: Vec3) -> Mat4 {
    let dir = target - eye;
    if dir.length_squared() < 1e-12 {
        return Mat4::look_to_rh(eye, Vec3::NEG_Z, Vec3::Y);
    }
    let dir = dir.normalize();
    // Up must not be parallel to the view direction.
    let up = if dir.cross(Vec3::Y).length_squared() < 1e-8 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    Mat4::look_at_rh(eye, target, up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::SyntheticLoader,
        camera::{Camera, CameraRig},
        media::MediaElement,
        soft::SoftRenderer,
    };
    use proptest::prelude::*;

    fn geometry() -> Arc<SphereGeometry> {
        Arc::new(SphereGeometry::inverted(6.0, 16, 8))
    }

    fn compositor(depth: f32) -> Compositor {
        let set = SyntheticLoader::solid(8, 8, depth).build("test").unwrap();
        Compositor::new(set, geometry(), Calibration::default()).unwrap()
    }

    fn visible(c: &Compositor) -> [bool; 3] {
        std::array::from_fn(|i| c.layers()[i].is_visible())
    }

    fn mono() -> CameraRig {
        Camera::new(1.0).rig(false)
    }

    #[test]
    fn refuses_unready_assets() {
        let mut set = SyntheticLoader::solid(4, 4, 0.5).build("x").unwrap();
        set.dispose();
        let err = Compositor::new(set, geometry(), Calibration::default()).err();
        assert!(matches!(err, Some(CompositorError::NotReady { slot: Slot::LiveColor })));
    }

    #[test]
    fn starts_ready_with_all_layers() {
        let c = compositor(0.5);
        assert_eq!(c.state(), CompositorState::Ready);
        assert_eq!(c.layer_count(), 3);
        assert!(c.layers().iter().all(|l| l.is_visible()));
        assert_eq!(c.sphere_center(), Vec3::new(0.0, 1.7, 0.0));
    }

    #[test]
    fn draws_back_to_front_per_eye() {
        let mut c = compositor(0.5);
        let mut sink = SoftRenderer::recording();
        c.update(&mono(), &mut sink);
        let orders: Vec<i32> = sink.draws().iter().map(|d| d.render_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn layer_count_is_monotone_and_idempotent() {
        let mut c = compositor(0.5);

        c.set_layer_count(1);
        assert_eq!(visible(&c), [true, false, false]);
        c.set_layer_count(2);
        assert_eq!(visible(&c), [true, true, false]);
        c.set_layer_count(3);
        assert_eq!(visible(&c), [true, true, true]);

        c.set_layer_count(2);
        let once = visible(&c);
        c.set_layer_count(2);
        assert_eq!(visible(&c), once);
    }

    #[test]
    fn layer_count_is_clamped() {
        let mut c = compositor(0.5);
        assert_eq!(c.set_layer_count(0), 1);
        assert_eq!(visible(&c), [true, false, false]);
        assert_eq!(c.set_layer_count(9), 3);
    }

    #[test]
    fn hidden_layers_still_get_uniforms() {
        let mut c = compositor(0.5);
        c.set_layer_count(1);
        let mut sink = SoftRenderer::recording();
        let rig = mono();
        c.update(&rig, &mut sink);
        assert_eq!(sink.draws().len(), 1);
        let mov = c.layer(LayerKind::MovingForeground).uniforms(0);
        assert_eq!(mov.head_pos, rig.head_position().to_array());
    }

    #[test]
    fn effects_are_clamped_and_broadcast() {
        let mut c = compositor(0.5);
        c.set_visual_effects(1.7, true);
        for layer in c.layers() {
            for eye in 0..2 {
                assert_eq!(layer.uniforms(eye).desat, 1.0);
                assert_eq!(layer.uniforms(eye).colored, 1.0);
            }
        }
        c.set_visual_effects(f32::NAN, false);
        assert_eq!(c.effects().desaturation, 0.0);
        assert_eq!(c.layer(LayerKind::Background).uniforms(0).colored, 0.0);
    }

    #[test]
    fn stereo_draws_every_layer_per_eye_with_one_head() {
        let mut c = compositor(0.5);
        let mut cam = Camera::new(2.0);
        cam.position = Vec3::new(0.3, 1.6, -0.2);
        let rig = cam.rig(true);
        let mut sink = SoftRenderer::recording();
        c.update(&rig, &mut sink);

        let draws = sink.draws();
        assert_eq!(draws.len(), 6);
        assert_eq!(draws.iter().filter(|d| d.eye == 0).count(), 3);
        assert_eq!(draws.iter().filter(|d| d.eye == 1).count(), 3);

        let mov = c.layer(LayerKind::MovingForeground);
        assert_eq!(mov.uniforms(0).head_pos, mov.uniforms(1).head_pos);
        assert_eq!(mov.uniforms(0).head_pos, cam.position.to_array());
        assert_ne!(mov.uniforms(0).eye_pos, mov.uniforms(1).eye_pos);
        assert_ne!(mov.uniforms(0).mat_wvp, mov.uniforms(1).mat_wvp);
    }

    #[test]
    fn combined_matrix_includes_group_transform() {
        let mut c = compositor(0.5);
        let rig = mono();
        let mut sink = SoftRenderer::recording();
        c.update(&rig, &mut sink);
        let eye = rig.eyes()[0];
        let expected = eye.projection * eye.view * Mat4::from_translation(Vec3::new(0.0, 1.7, 0.0));
        let got = Mat4::from_cols_array_2d(&c.layer(LayerKind::Background).uniforms(0).mat_wvp);
        assert!(got.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn recenter_moves_the_sphere() {
        let mut c = compositor(0.5);
        c.recenter(Vec3::new(1.0, 1.5, 2.0));
        assert_eq!(c.sphere_center(), Vec3::new(1.0, 1.5, 2.0));
        c.recenter(Vec3::NAN);
        assert_eq!(c.sphere_center(), Vec3::new(1.0, 1.5, 2.0));
        c.reset_origin();
        assert_eq!(c.sphere_center(), Vec3::new(0.0, 1.7, 0.0));
    }

    #[test]
    fn first_update_centres_on_the_head_once() {
        let mut c = compositor(0.5);
        let mut cam = Camera::new(1.0);
        cam.position = Vec3::new(0.4, 1.55, -0.3);
        let mut sink = SoftRenderer::recording();
        c.update(&cam.rig(false), &mut sink);
        assert_eq!(c.sphere_center(), cam.position);

        // Later head motion is parallax, not a new origin.
        let start = cam.position;
        cam.position += Vec3::new(0.2, 0.0, 0.1);
        c.update(&cam.rig(true), &mut sink);
        assert_eq!(c.sphere_center(), start);
        let mov = c.layer(LayerKind::MovingForeground).uniforms(0);
        assert_eq!(mov.sphere_center, start.to_array());
    }

    #[test]
    fn explicit_placement_beats_the_first_frame() {
        let mut c = compositor(0.5);
        c.reset_origin();
        let mut cam = Camera::new(1.0);
        cam.position = Vec3::new(2.0, 1.0, 2.0);
        c.update(&cam.rig(false), &mut SoftRenderer::recording());
        assert_eq!(c.sphere_center(), Vec3::new(0.0, 1.7, 0.0));
    }

    #[test]
    fn view_dir_survives_eye_at_center() {
        let m = look_toward(Vec3::ONE, Vec3::ONE);
        assert!(m.is_finite());
        let m = look_toward(Vec3::ZERO, Vec3::new(0.0, 5.0, 0.0));
        assert!(m.is_finite());
    }

    #[test]
    fn playback_toggles_all_three_streams() {
        let mut c = compositor(0.5);
        c.advance(0.5);
        assert!(c.toggle_playback().unwrap());
        assert_eq!(c.state(), CompositorState::Playing);
        let p = c.assets().playback();
        assert!(!p.color().paused() && !p.depth().paused() && !p.alpha().paused());
        assert!(p.drift() < 1.0 / p.color().fps() as f64);

        assert!(!c.toggle_playback().unwrap());
        assert_eq!(c.state(), CompositorState::Paused);
        let p = c.assets().playback();
        assert!(p.color().paused() && p.depth().paused() && p.alpha().paused());
    }

    #[test]
    fn disposed_compositor_draws_nothing() {
        let mut c = compositor(0.5);
        c.dispose();
        assert_eq!(c.state(), CompositorState::Disposed);
        assert!(matches!(c.toggle_playback(), Err(CompositorError::Disposed)));
        let mut sink = SoftRenderer::recording();
        c.update(&mono(), &mut sink);
        assert!(sink.draws().is_empty());
        assert!(c.bound_textures().is_empty());
    }

    proptest! {
        #[test]
        fn visible_layers_track_clamped_count(n in 0u32..10, desat in -2.0f32..2.0) {
            let mut c = compositor(0.5);
            let applied = c.set_layer_count(n);
            prop_assert_eq!(applied, n.clamp(1, 3));
            let visible = c.layers().iter().filter(|l| l.is_visible()).count() as u32;
            prop_assert_eq!(visible, applied);

            c.set_visual_effects(desat, false);
            prop_assert!((0.0..=1.0).contains(&c.effects().desaturation));
        }
    }
}
