//! Background loading of asset sets.
//!
//! A load runs on its own thread and fans the decoding out over rayon. The
//! caller holds a [`PendingAssets`] and polls it from the frame loop; dropping
//! it abandons the load, and the worker discards its result when done.

use super::{AssetError, RgbdAssetSet, Slot, StillLayers};
use crate::{
    media::{Frame, FrameSequence, TextureSource},
    playback::PlaybackController,
};
use crossbeam_channel::{Receiver, TryRecvError};
use rayon::prelude::*;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

type LoadResult = Result<RgbdAssetSet, AssetError>;

/// Anything that can produce asset sets by scene name.
pub trait SceneLoader {
    fn load(&self, scene: &str) -> PendingAssets;
}

enum PendingState {
    Done(Option<LoadResult>),
    Loading(Receiver<LoadResult>),
}

/// An asset set that may still be loading.
pub struct PendingAssets {
    scene: String,
    state: PendingState,
}

impl PendingAssets {
    pub fn ready(set: RgbdAssetSet) -> Self {
        Self {
            scene: set.name().to_string(),
            state: PendingState::Done(Some(Ok(set))),
        }
    }

    pub fn failed(scene: impl Into<String>, err: AssetError) -> Self {
        Self {
            scene: scene.into(),
            state: PendingState::Done(Some(Err(err))),
        }
    }

    /// Runs `job` on a named worker thread.
    pub fn spawn<F>(scene: impl Into<String>, job: F) -> Self
    where
        F: FnOnce() -> LoadResult + Send + 'static,
    {
        let scene = scene.into();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker_scene = scene.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("assets-{scene}"))
            .spawn(move || {
                let result = job();
                if tx.send(result).is_err() {
                    log::debug!("Discarded assets for abandoned scene '{}'", worker_scene);
                }
            });

        match spawned {
            Ok(_) => Self {
                scene,
                state: PendingState::Loading(rx),
            },
            Err(e) => Self::failed(scene, AssetError::Spawn(e)),
        }
    }

    #[inline]
    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Non-blocking; yields the result exactly once.
    pub fn poll(&mut self) -> Option<LoadResult> {
        match &mut self.state {
            PendingState::Done(result) => result.take(),
            PendingState::Loading(rx) => match rx.try_recv() {
                Ok(result) => {
                    self.state = PendingState::Done(None);
                    Some(result)
                }
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    self.state = PendingState::Done(None);
                    Some(Err(AssetError::Disconnected(self.scene.clone())))
                }
            },
        }
    }

    /// Blocks until the load finishes.
    pub fn wait(mut self) -> LoadResult {
        match &mut self.state {
            PendingState::Done(result) => result
                .take()
                .unwrap_or_else(|| Err(AssetError::Disconnected(self.scene.clone()))),
            PendingState::Loading(rx) => rx
                .recv()
                .unwrap_or_else(|_| Err(AssetError::Disconnected(self.scene.clone()))),
        }
    }
}

/// Loads scenes from a directory laid out as
///
/// ```text
/// <root>/<scene>/            color video frames
/// <root>/<scene>_depth/      depth video frames
/// <root>/<scene>_alphaproc/  alpha video frames
/// <root>/<scene>_BG.png      extrapolated color
/// <root>/<scene>_BGD.png     extrapolated depth
/// <root>/<scene>_BGA.png     extrapolated alpha
/// <root>/<scene>_BG_inp.png  inpainted color
/// <root>/<scene>_BGD_inp.png inpainted depth
/// ```
#[derive(Debug, Clone)]
pub struct DiskLoader {
    root: PathBuf,
    fps: f32,
}

const FRAME_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

impl DiskLoader {
    pub fn new(root: impl Into<PathBuf>, fps: f32) -> Self {
        Self {
            root: root.into(),
            fps,
        }
    }

    /// Where a slot of `scene` lives on disk.
    pub fn slot_path(&self, scene: &str, slot: Slot) -> PathBuf {
        let name = match slot {
            Slot::LiveColor => scene.to_string(),
            Slot::LiveDepth => format!("{scene}_depth"),
            Slot::LiveAlpha => format!("{scene}_alphaproc"),
            Slot::ExtrapolatedColor => format!("{scene}_BG.png"),
            Slot::ExtrapolatedDepth => format!("{scene}_BGD.png"),
            Slot::ExtrapolatedAlpha => format!("{scene}_BGA.png"),
            Slot::InpaintedColor => format!("{scene}_BG_inp.png"),
            Slot::InpaintedDepth => format!("{scene}_BGD_inp.png"),
        };
        self.root.join(name)
    }

    /// Scenes under the root with every slot present, sorted by name.
    pub fn discover(&self) -> Vec<String> {
        let mut scenes: Vec<String> = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix("_BG_inp.png"))
                    .map(str::to_string)
            })
            .filter(|scene| {
                Slot::ALL.iter().all(|&slot| {
                    let path = self.slot_path(scene, slot);
                    if slot.is_live() {
                        path.is_dir()
                    } else {
                        path.is_file()
                    }
                })
            })
            .collect();
        scenes.sort();
        scenes
    }

    /// Decodes every asset of `scene` on the calling thread (plus rayon).
    pub fn load_blocking(&self, scene: &str) -> LoadResult {
        let (stills, videos) = rayon::join(
            || {
                Slot::STILLS
                    .par_iter()
                    .map(|&slot| Ok((slot, self.load_still(scene, slot)?)))
                    .collect::<Result<HashMap<_, _>, AssetError>>()
            },
            || {
                [Slot::LiveColor, Slot::LiveDepth, Slot::LiveAlpha]
                    .par_iter()
                    .map(|&slot| Ok((slot, self.load_video(scene, slot)?)))
                    .collect::<Result<HashMap<_, _>, AssetError>>()
            },
        );
        let mut stills = stills?;
        let mut videos = videos?;

        let mut still = |slot| {
            stills.remove(&slot).ok_or_else(|| AssetError::Missing {
                slot,
                path: self.slot_path(scene, slot),
            })
        };
        let stills = StillLayers {
            extrapolated_color: still(Slot::ExtrapolatedColor)?,
            extrapolated_depth: still(Slot::ExtrapolatedDepth)?,
            extrapolated_alpha: still(Slot::ExtrapolatedAlpha)?,
            inpainted_color: still(Slot::InpaintedColor)?,
            inpainted_depth: still(Slot::InpaintedDepth)?,
        };

        let mut video = |slot| {
            videos.remove(&slot).ok_or_else(|| AssetError::Missing {
                slot,
                path: self.slot_path(scene, slot),
            })
        };
        let live = PlaybackController::new(
            video(Slot::LiveColor)?,
            video(Slot::LiveDepth)?,
            video(Slot::LiveAlpha)?,
        );

        let set = RgbdAssetSet::new(scene, live, stills);
        if let Some(slot) = set.first_unready() {
            return Err(AssetError::NotReady { slot });
        }

        log::info!(
            "Loaded scene '{}': {} frames at {}x{}",
            scene,
            set.playback().color().frame_count(),
            set.texture(Slot::LiveColor).width(),
            set.texture(Slot::LiveColor).height(),
        );
        Ok(set)
    }

    fn load_still(&self, scene: &str, slot: Slot) -> Result<TextureSource, AssetError> {
        let path = self.slot_path(scene, slot);
        if !path.is_file() {
            return Err(AssetError::Missing { slot, path });
        }
        let image = image::open(&path).map_err(|source| AssetError::Decode { path, source })?;
        Ok(TextureSource::from_image(image))
    }

    fn load_video(&self, scene: &str, slot: Slot) -> Result<FrameSequence, AssetError> {
        let dir = self.slot_path(scene, slot);
        if !dir.is_dir() {
            return Err(AssetError::Missing { slot, path: dir });
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|s| s.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let frames = paths
            .into_par_iter()
            .map(|path| {
                image::open(&path)
                    .map(|img| Arc::new(img.into_rgba8()) as Frame)
                    .map_err(|source| AssetError::Decode { path, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!("{:?}: {} frames from {}", slot, frames.len(), dir.display());
        FrameSequence::new(frames, self.fps).map_err(|source| AssetError::Media { slot, source })
    }
}

impl SceneLoader for DiskLoader {
    fn load(&self, scene: &str) -> PendingAssets {
        let loader = self.clone();
        let name = scene.to_string();
        PendingAssets::spawn(scene, move || loader.load_blocking(&name))
    }
}
