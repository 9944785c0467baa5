//! Generated scenes for tests and for running without any assets on disk.

use super::{loader::PendingAssets, AssetError, RgbdAssetSet, SceneLoader, Slot, StillLayers};
use crate::{
    media::{to_unorm8, Frame, FrameSequence, TextureSource},
    playback::PlaybackController,
};
use image::{Rgba, RgbaImage};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Pattern {
    /// Every slot one flat value; depth everywhere `depth`.
    Solid { depth: f32 },
    /// A horizon gradient with a near pillar and an orbiting live blob.
    Demo,
}

#[derive(Debug, Clone)]
pub struct SyntheticLoader {
    width: u32,
    height: u32,
    frames: usize,
    fps: f32,
    pattern: Pattern,
}

impl SyntheticLoader {
    /// Flat textures: depth `depth` in every depth slot, opaque alpha.
    pub fn solid(width: u32, height: u32, depth: f32) -> Self {
        Self {
            width,
            height,
            frames: 1,
            fps: 30.0,
            pattern: Pattern::Solid { depth },
        }
    }

    /// A small animated panorama for trying the viewer without assets.
    pub fn demo() -> Self {
        Self {
            width: 512,
            height: 256,
            frames: 60,
            fps: 30.0,
            pattern: Pattern::Demo,
        }
    }

    pub fn build(&self, name: &str) -> Result<RgbdAssetSet, AssetError> {
        let (w, h) = (self.width.max(1), self.height.max(1));
        let frames = self.frames.max(1);

        let still = |f: &dyn Fn(f32, f32) -> [f32; 4]| TextureSource::new(Arc::new(paint(w, h, f)));
        let video = |slot: Slot, f: &dyn Fn(f32, f32, f32) -> [f32; 4]| {
            let seq: Vec<Frame> = (0..frames)
                .map(|i| {
                    let t = i as f32 / frames as f32;
                    Arc::new(paint(w, h, &|u: f32, v: f32| f(u, v, t)))
                })
                .collect();
            FrameSequence::new(seq, self.fps).map_err(|source| AssetError::Media { slot, source })
        };

        let p = self.pattern;
        let stills = StillLayers {
            extrapolated_color: still(&|u: f32, v: f32| color(p, u, v, 0.15)),
            extrapolated_depth: still(&|u: f32, v: f32| gray(extrapolated_depth(p, u, v))),
            extrapolated_alpha: still(&|u: f32, v: f32| gray(extrapolated_alpha(p, u, v))),
            inpainted_color: still(&|u: f32, v: f32| color(p, u, v, 0.0)),
            inpainted_depth: still(&|u: f32, v: f32| gray(background_depth(p, u, v))),
        };

        let live = PlaybackController::new(
            video(Slot::LiveColor, &|u: f32, v: f32, t: f32| {
                color(p, u, v, 0.3 + 0.2 * blob(p, u, v, t))
            })?,
            video(Slot::LiveDepth, &|u: f32, v: f32, t: f32| gray(live_depth(p, u, v, t)))?,
            video(Slot::LiveAlpha, &|u: f32, v: f32, t: f32| gray(live_alpha(p, u, v, t)))?,
        );

        Ok(RgbdAssetSet::new(name, live, stills))
    }
}

impl SceneLoader for SyntheticLoader {
    fn load(&self, scene: &str) -> PendingAssets {
        match self.build(scene) {
            Ok(set) => PendingAssets::ready(set),
            Err(e) => PendingAssets::failed(scene, e),
        }
    }
}

fn paint(w: u32, h: u32, f: &dyn Fn(f32, f32) -> [f32; 4]) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        let u = (x as f32 + 0.5) / w as f32;
        let v = (y as f32 + 0.5) / h as f32;
        Rgba(f(u, v).map(to_unorm8))
    })
}

#[inline]
fn gray(value: f32) -> [f32; 4] {
    [value, value, value, 1.0]
}

fn color(pattern: Pattern, u: f32, v: f32, warm: f32) -> [f32; 4] {
    match pattern {
        Pattern::Solid { .. } => [0.8, 0.4, 0.2, 1.0],
        Pattern::Demo => {
            let sky = 1.0 - v;
            let stripe = if (u * 24.0).fract() < 0.5 { 0.9 } else { 0.7 };
            [
                (0.2 + 0.6 * sky + warm).min(1.0) * stripe,
                (0.3 + 0.5 * sky) * stripe,
                (0.5 + 0.5 * sky - warm * 0.5).max(0.0) * stripe,
                1.0,
            ]
        }
    }
}

fn background_depth(pattern: Pattern, _u: f32, v: f32) -> f32 {
    match pattern {
        Pattern::Solid { depth } => depth,
        // Floor rises toward the viewer below the horizon.
        Pattern::Demo => 0.06 + 0.25 * (v - 0.5).max(0.0),
    }
}

fn pillar(u: f32) -> f32 {
    let d = (u - 0.5).abs();
    if d < 0.04 {
        1.0
    } else {
        0.0
    }
}

fn extrapolated_depth(pattern: Pattern, u: f32, v: f32) -> f32 {
    match pattern {
        Pattern::Solid { depth } => depth,
        Pattern::Demo => background_depth(pattern, u, v).max(0.25 * pillar(u)),
    }
}

fn extrapolated_alpha(pattern: Pattern, u: f32, _v: f32) -> f32 {
    match pattern {
        Pattern::Solid { .. } => 1.0,
        Pattern::Demo => pillar(u),
    }
}

/// Soft disc circling the front of the panorama over one loop.
fn blob(pattern: Pattern, u: f32, v: f32, t: f32) -> f32 {
    match pattern {
        Pattern::Solid { .. } => 0.0,
        Pattern::Demo => {
            let cu = 0.25 + 0.1 * (t * std::f32::consts::TAU).cos();
            let cv = 0.55 + 0.05 * (t * std::f32::consts::TAU).sin();
            let r = ((u - cu) * 2.0).hypot(v - cv);
            (1.0 - r / 0.08).clamp(0.0, 1.0)
        }
    }
}

fn live_depth(pattern: Pattern, u: f32, v: f32, t: f32) -> f32 {
    match pattern {
        Pattern::Solid { depth } => depth,
        Pattern::Demo => extrapolated_depth(pattern, u, v).max(0.5 * blob(pattern, u, v, t)),
    }
}

fn live_alpha(pattern: Pattern, u: f32, v: f32, t: f32) -> f32 {
    match pattern {
        Pattern::Solid { .. } => 1.0,
        Pattern::Demo => (blob(pattern, u, v, t) * 4.0).min(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::from_unorm8;
    use glam::Vec2;

    #[test]
    fn solid_scene_is_flat() {
        let set = SyntheticLoader::solid(64, 64, 0.299).build("flat").unwrap();
        assert!(set.all_ready());
        for slot in [Slot::LiveDepth, Slot::ExtrapolatedDepth, Slot::InpaintedDepth] {
            let t = set.texture(slot);
            assert_eq!((t.width(), t.height()), (64, 64));
            assert_eq!(t.sample(Vec2::splat(0.3)).x, from_unorm8(to_unorm8(0.299)));
        }
    }

    #[test]
    fn demo_scene_animates() {
        let set = SyntheticLoader::demo().build("demo").unwrap();
        assert_eq!(set.playback().color().frame_count(), 60);
        assert!(set.all_ready());
    }

    #[test]
    fn every_build_gets_fresh_handles() {
        let loader = SyntheticLoader::solid(4, 4, 0.5);
        let a = loader.build("a").unwrap();
        let b = loader.build("b").unwrap();
        for id in a.texture_ids() {
            assert!(b.source(id).is_none());
        }
    }
}
