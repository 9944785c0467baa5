//! DEPTHWARP: reference math for layered RGBD panoramas rendered on a sphere.
//!
//! - Depth maps follow the "Google Jump" convention: higher stored values are
//!   nearer. A sample `d` decodes to a radial scale `K / (d + ε)`.
//! - Each vertex of a unit-radius (here: `radius`-scaled) inverted sphere is
//!   multiplied component-wise by that scale. No renormalisation happens.
//! - The live foreground patch fades by a logistic curve of the distance
//!   between the viewer's head and the sphere centre.
//!
//! Everything here is engine independent so the GPU shaders and the CPU
//! reference evaluator share one definition of every constant.

pub mod calibration;
pub mod sphere;
pub mod warp;

pub use calibration::{AlphaFalloff, Calibration, CalibrationError, DepthEncoding};
pub use sphere::{SphereGeometry, SphereVertex};
pub use warp::{
    decode_inverse_depth, desaturate, displace, min_depth, tint, LUMA_WEIGHTS, TINT_WEIGHT,
};
