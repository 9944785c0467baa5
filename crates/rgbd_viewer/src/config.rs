use crate::assets::{DiskLoader, SceneLoader, SyntheticLoader};
use anyhow::{Context, Result};
use clap::Parser;
use depthwarp::{Calibration, SphereGeometry};
use std::path::PathBuf;

/// `rgbd_viewer` - plays layered RGBD panoramas with depth parallax.
///
/// Each scene is a live color/depth/alpha video plus extrapolated and
/// inpainted stills, composited on three displaced spheres.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory holding the scene assets.
    ///
    /// Without it the viewer plays a generated demo scene.
    #[arg(long, env = "RGBD_ASSET_ROOT")]
    pub asset_root: Option<PathBuf>,

    /// Scenes to cycle through, in order.
    ///
    /// Defaults to every complete scene found under the asset root.
    #[arg(long, env = "RGBD_SCENES", value_delimiter = ',')]
    pub scenes: Vec<String>,

    /// Frame rate of the live video frame sequences.
    #[arg(long, env = "RGBD_FPS", default_value_t = 30.0)]
    pub fps: f32,

    /// Number of layers shown at start (1-3).
    #[arg(long, env = "RGBD_LAYERS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..=3))]
    pub layers: u32,

    /// JSON file overriding the depth and alpha calibration constants.
    #[arg(long, env = "RGBD_CALIBRATION")]
    pub calibration: Option<PathBuf>,

    /// Sphere tessellation per axis.
    #[arg(long, env = "RGBD_SPHERE_SEGMENTS", default_value_t = SphereGeometry::DEFAULT_SEGMENTS)]
    pub sphere_segments: u32,

    /// Start in the side-by-side stereo preview.
    #[arg(long, env = "RGBD_STEREO")]
    pub stereo: bool,
}

impl Config {
    pub fn load_calibration(&self) -> Result<Calibration> {
        match &self.calibration {
            Some(path) => {
                let c = Calibration::from_path(path)
                    .with_context(|| format!("reading calibration {}", path.display()))?;
                log::info!("Using calibration from {}", path.display());
                Ok(c)
            }
            None => Ok(Calibration::default()),
        }
    }

    pub fn sphere(&self) -> SphereGeometry {
        SphereGeometry::inverted(
            SphereGeometry::DEFAULT_RADIUS,
            self.sphere_segments,
            self.sphere_segments,
        )
    }

    /// Picks the loader and the scene list.
    pub fn scene_source(&self) -> Result<(Box<dyn SceneLoader>, Vec<String>)> {
        let Some(root) = &self.asset_root else {
            log::info!("No asset root given; playing the generated demo scene");
            return Ok((Box::new(SyntheticLoader::demo()), vec!["demo".to_string()]));
        };

        let loader = DiskLoader::new(root, self.fps);
        let scenes = if self.scenes.is_empty() {
            loader.discover()
        } else {
            self.scenes.clone()
        };
        anyhow::ensure!(!scenes.is_empty(), "no complete scenes under {}", root.display());
        log::info!("Found {} scene(s) under {}", scenes.len(), root.display());
        Ok((Box::new(loader), scenes))
    }
}
