//! One scene's worth of color/depth/alpha textures and how they are loaded.

pub mod loader;
pub mod synthetic;

pub use self::loader::{DiskLoader, PendingAssets, SceneLoader};
pub use self::synthetic::SyntheticLoader;

use crate::{
    media::{FrameSequence, MediaError, TextureId, TextureSource},
    playback::PlaybackController,
};
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("missing {slot:?} asset at {path}")]
    Missing { slot: Slot, path: PathBuf },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("{slot:?} video: {source}")]
    Media {
        slot: Slot,
        #[source]
        source: MediaError,
    },
    #[error("{slot:?} texture is not ready")]
    NotReady { slot: Slot },
    #[error("asset loader for scene '{0}' stopped without a result")]
    Disconnected(String),
    #[error("failed to spawn asset loader: {0}")]
    Spawn(#[from] std::io::Error),
}

/// The eight texture slots of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    LiveColor,
    LiveDepth,
    LiveAlpha,
    ExtrapolatedColor,
    ExtrapolatedDepth,
    ExtrapolatedAlpha,
    InpaintedColor,
    InpaintedDepth,
}

impl Slot {
    pub const ALL: [Slot; 8] = [
        Slot::LiveColor,
        Slot::LiveDepth,
        Slot::LiveAlpha,
        Slot::ExtrapolatedColor,
        Slot::ExtrapolatedDepth,
        Slot::ExtrapolatedAlpha,
        Slot::InpaintedColor,
        Slot::InpaintedDepth,
    ];

    pub const STILLS: [Slot; 5] = [
        Slot::ExtrapolatedColor,
        Slot::ExtrapolatedDepth,
        Slot::ExtrapolatedAlpha,
        Slot::InpaintedColor,
        Slot::InpaintedDepth,
    ];

    #[inline]
    pub fn is_live(self) -> bool {
        matches!(self, Slot::LiveColor | Slot::LiveDepth | Slot::LiveAlpha)
    }
}

/// Still images of a scene, fixed for the lifetime of the set.
#[derive(Debug)]
pub struct StillLayers {
    pub extrapolated_color: TextureSource,
    pub extrapolated_depth: TextureSource,
    pub extrapolated_alpha: TextureSource,
    pub inpainted_color: TextureSource,
    pub inpainted_depth: TextureSource,
}

/// Every texture source of one scene. Replaced wholesale on scene change.
#[derive(Debug)]
pub struct RgbdAssetSet {
    name: String,
    live: PlaybackController<FrameSequence>,
    stills: StillLayers,
}

impl RgbdAssetSet {
    pub fn new(
        name: impl Into<String>,
        live: PlaybackController<FrameSequence>,
        stills: StillLayers,
    ) -> Self {
        Self {
            name: name.into(),
            live,
            stills,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn playback(&self) -> &PlaybackController<FrameSequence> {
        &self.live
    }

    #[inline]
    pub fn playback_mut(&mut self) -> &mut PlaybackController<FrameSequence> {
        &mut self.live
    }

    pub fn texture(&self, slot: Slot) -> &TextureSource {
        match slot {
            Slot::LiveColor => self.live.color().texture(),
            Slot::LiveDepth => self.live.depth().texture(),
            Slot::LiveAlpha => self.live.alpha().texture(),
            Slot::ExtrapolatedColor => &self.stills.extrapolated_color,
            Slot::ExtrapolatedDepth => &self.stills.extrapolated_depth,
            Slot::ExtrapolatedAlpha => &self.stills.extrapolated_alpha,
            Slot::InpaintedColor => &self.stills.inpainted_color,
            Slot::InpaintedDepth => &self.stills.inpainted_depth,
        }
    }

    #[inline]
    pub fn id(&self, slot: Slot) -> TextureId {
        self.texture(slot).id()
    }

    pub fn texture_ids(&self) -> Vec<TextureId> {
        Slot::ALL.iter().map(|&s| self.id(s)).collect()
    }

    /// Looks a source up by handle.
    pub fn source(&self, id: TextureId) -> Option<&TextureSource> {
        Slot::ALL
            .iter()
            .map(|&s| self.texture(s))
            .find(|t| t.id() == id)
    }

    /// First slot whose source is not ready, if any.
    pub fn first_unready(&self) -> Option<Slot> {
        Slot::ALL.into_iter().find(|&s| !self.texture(s).is_ready())
    }

    #[inline]
    pub fn all_ready(&self) -> bool {
        self.first_unready().is_none()
    }

    /// Stops the videos and drops every frame.
    pub fn dispose(&mut self) {
        self.live.pause();
        for stream in self.live.streams_mut() {
            stream.release();
        }
        let s = &mut self.stills;
        for t in [
            &mut s.extrapolated_color,
            &mut s.extrapolated_depth,
            &mut s.extrapolated_alpha,
            &mut s.inpainted_color,
            &mut s.inpainted_depth,
        ] {
            t.release();
        }
        log::debug!("Disposed asset set '{}'", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_lookup_by_id() {
        let set = SyntheticLoader::solid(8, 8, 0.5).build("probe").unwrap();
        for slot in Slot::ALL {
            let id = set.id(slot);
            assert_eq!(set.source(id).map(|t| t.id()), Some(id));
        }
        assert_eq!(set.texture_ids().len(), 8);
    }

    #[test]
    fn dispose_releases_everything() {
        let mut set = SyntheticLoader::solid(8, 8, 0.5).build("probe").unwrap();
        assert!(set.all_ready());
        set.dispose();
        assert_eq!(set.first_unready(), Some(Slot::LiveColor));
        assert!(Slot::ALL.iter().all(|&s| !set.texture(s).is_ready()));
        assert!(!set.playback().is_playing());
    }

    #[test]
    fn live_slots() {
        assert_eq!(Slot::ALL.iter().filter(|s| s.is_live()).count(), 3);
        assert!(Slot::STILLS.iter().all(|s| !s.is_live()));
    }
}
