//! Calibration constants tuned to the capture rig.
//!
//! The defaults reproduce the values the assets were authored against and must
//! stay bit-for-bit identical; a JSON file may override them when retargeting
//! to different capture hardware.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Numerator of the inverse-depth decode.
pub const DEFAULT_DEPTH_SCALE: f32 = 0.3;
/// Decode offsets per layer, back to front.
pub const DEFAULT_EPSILON_BACKGROUND: f32 = 0.001;
pub const DEFAULT_EPSILON_EXTRAPOLATED: f32 = 0.002;
pub const DEFAULT_EPSILON_MOVING: f32 = 0.003;
/// Logistic steepness `k`, midpoint `c` and distance floor of the alpha fade.
pub const DEFAULT_FALLOFF_STEEPNESS: f32 = 30.0;
pub const DEFAULT_FALLOFF_MIDPOINT: f32 = 0.15;
pub const DEFAULT_FALLOFF_FLOOR: f32 = 0.05;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("calibration value `{field}` must be finite and > 0 (got {value})")]
    NotPositive { field: &'static str, value: f32 },
    #[error("calibration value `{field}` must be finite (got {value})")]
    NotFinite { field: &'static str, value: f32 },
    #[error("failed to read calibration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed calibration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// `K / (d + ε)` parameters for one layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthEncoding {
    pub scale: f32,
    pub epsilon: f32,
}

impl DepthEncoding {
    #[inline]
    pub fn decode(self, sample: f32) -> f32 {
        crate::warp::decode_inverse_depth(sample, self.scale, self.epsilon)
    }
}

/// View-dependent opacity correction of the live foreground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaFalloff {
    pub steepness: f32,
    pub midpoint: f32,
    pub distance_floor: f32,
}

impl Default for AlphaFalloff {
    fn default() -> Self {
        Self {
            steepness: DEFAULT_FALLOFF_STEEPNESS,
            midpoint: DEFAULT_FALLOFF_MIDPOINT,
            distance_floor: DEFAULT_FALLOFF_FLOOR,
        }
    }
}

impl AlphaFalloff {
    /// Floored distance between the head and the sphere centre.
    #[inline]
    pub fn head_distance(&self, head: glam::Vec3, sphere_center: glam::Vec3) -> f32 {
        self.distance_floor + head.distance(sphere_center)
    }

    /// Logistic `1 / (1 + e^{-k (dist - c)})`.
    #[inline]
    pub fn s_curve(&self, dist: f32) -> f32 {
        1.0 / (1.0 + (-self.steepness * (dist - self.midpoint)).exp())
    }

    /// `|(1 - s) + mask * s|` for the floored head distance.
    pub fn corrected_alpha(&self, mask: f32, head: glam::Vec3, sphere_center: glam::Vec3) -> f32 {
        let s = self.s_curve(self.head_distance(head, sphere_center));
        ((1.0 - s) + mask * s).abs()
    }
}

/// All tunable constants of the layer shaders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub depth_scale: f32,
    pub epsilon_background: f32,
    pub epsilon_extrapolated: f32,
    pub epsilon_moving: f32,
    pub falloff: AlphaFalloff,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            depth_scale: DEFAULT_DEPTH_SCALE,
            epsilon_background: DEFAULT_EPSILON_BACKGROUND,
            epsilon_extrapolated: DEFAULT_EPSILON_EXTRAPOLATED,
            epsilon_moving: DEFAULT_EPSILON_MOVING,
            falloff: AlphaFalloff::default(),
        }
    }
}

impl Calibration {
    pub fn background(&self) -> DepthEncoding {
        DepthEncoding { scale: self.depth_scale, epsilon: self.epsilon_background }
    }

    pub fn extrapolated(&self) -> DepthEncoding {
        DepthEncoding { scale: self.depth_scale, epsilon: self.epsilon_extrapolated }
    }

    pub fn moving(&self) -> DepthEncoding {
        DepthEncoding { scale: self.depth_scale, epsilon: self.epsilon_moving }
    }

    /// Parses a (possibly partial) JSON override; missing keys keep defaults.
    pub fn from_json(text: &str) -> Result<Self, CalibrationError> {
        let calibration: Self = serde_json::from_str(text)?;
        calibration.validate()?;
        Ok(calibration)
    }

    pub fn from_path(path: &Path) -> Result<Self, CalibrationError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Rejects values that would divide by zero or flip the decode sign.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let positive = [
            ("depth_scale", self.depth_scale),
            ("epsilon_background", self.epsilon_background),
            ("epsilon_extrapolated", self.epsilon_extrapolated),
            ("epsilon_moving", self.epsilon_moving),
            ("falloff.steepness", self.falloff.steepness),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(CalibrationError::NotPositive { field, value });
            }
        }

        let finite = [
            ("falloff.midpoint", self.falloff.midpoint),
            ("falloff.distance_floor", self.falloff.distance_floor),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(CalibrationError::NotFinite { field, value });
            }
        }

        Ok(())
    }
}
