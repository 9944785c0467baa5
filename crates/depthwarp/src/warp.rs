//! Per-vertex and per-fragment reference formulas of the layer shaders.

use glam::Vec3;

/// Rec. 709 luminance weights used by the desaturation.
pub const LUMA_WEIGHTS: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// Weight of the fixed tint colour when the `colored` effect is on.
pub const TINT_WEIGHT: f32 = 0.5;

/// Smallest of the given depth samples (the farthest surface).
///
/// Layers drawn behind others take the minimum over every depth source in
/// front of them so they can never poke through.
#[inline]
pub fn min_depth(samples: &[f32]) -> f32 {
    samples.iter().copied().fold(f32::INFINITY, f32::min)
}

/// `scale / (sample + epsilon)`.
#[inline]
pub fn decode_inverse_depth(sample: f32, scale: f32, epsilon: f32) -> f32 {
    scale / (sample + epsilon)
}

/// Component-wise multiply of a sphere vertex by its decoded inverse depth.
#[inline]
pub fn displace(position: Vec3, inverse_depth: f32) -> Vec3 {
    position * inverse_depth
}

/// Interpolates toward luminance grey; `amount` is clamped to `[0, 1]`.
#[inline]
pub fn desaturate(rgb: Vec3, amount: f32) -> Vec3 {
    let gray = Vec3::splat(rgb.dot(LUMA_WEIGHTS));
    rgb.lerp(gray, amount.clamp(0.0, 1.0))
}

#[inline]
pub fn tint(rgb: Vec3, tint_color: Vec3) -> Vec3 {
    rgb.lerp(tint_color, TINT_WEIGHT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Calibration;
    use proptest::prelude::*;

    #[test]
    fn decode_uses_layer_epsilon() {
        let c = Calibration::default();
        assert_eq!(c.background().decode(0.5), 0.3 / (0.5 + 0.001));
        assert_eq!(c.extrapolated().decode(0.5), 0.3 / (0.5 + 0.002));
        assert_eq!(c.moving().decode(0.5), 0.3 / (0.5 + 0.003));
    }

    #[test]
    fn nearer_layers_decode_closer() {
        let c = Calibration::default();
        let d = 0.42;
        assert!(c.moving().decode(d) < c.extrapolated().decode(d));
        assert!(c.extrapolated().decode(d) < c.background().decode(d));
    }

    #[test]
    fn displacement_is_per_axis_scale() {
        let p = Vec3::new(-1.0, 2.0, 3.0);
        assert_eq!(displace(p, 2.0), Vec3::new(-2.0, 4.0, 6.0));
    }

    #[test]
    fn min_depth_picks_farthest() {
        assert_eq!(min_depth(&[0.7, 0.2, 0.9]), 0.2);
        assert_eq!(min_depth(&[0.5]), 0.5);
    }

    #[test]
    fn desaturate_extremes() {
        let red = Vec3::new(1.0, 0.0, 0.0);
        assert_eq!(desaturate(red, 0.0), red);
        assert!((desaturate(red, 1.0) - Vec3::splat(0.2126)).length() < 1e-6);
        // Out of range amounts clamp.
        assert!((desaturate(red, 4.0) - Vec3::splat(0.2126)).length() < 1e-6);
        assert_eq!(desaturate(red, -1.0), red);
    }

    #[test]
    fn tint_is_even_mix() {
        let out = tint(Vec3::ZERO, Vec3::new(0.4, 0.1, 0.8));
        assert!((out - Vec3::new(0.2, 0.05, 0.4)).length() < 1e-6);
    }

    proptest! {
        #[test]
        fn decode_matches_reference(d in 0.0001f32..=1.0, eps_idx in 0usize..3) {
            let c = Calibration::default();
            let enc = [c.background(), c.extrapolated(), c.moving()][eps_idx];
            let eps = [0.001f32, 0.002, 0.003][eps_idx];
            prop_assert_eq!(enc.decode(d), 0.3 / (d + eps));
        }

        #[test]
        fn displaced_magnitude_scales_radius(
            x in -1.0f32..1.0, y in -1.0f32..1.0, z in -1.0f32..1.0, d in 0.01f32..=1.0,
        ) {
            let p = Vec3::new(x, y, z);
            prop_assume!(p.length() > 1e-3);
            let inv = decode_inverse_depth(d, 0.3, 0.002);
            let q = displace(p, inv);
            prop_assert!((q.length() - p.length() * inv).abs() <= 1e-4 * q.length().max(1.0));
        }

        #[test]
        fn corrected_alpha_between_mask_and_one(mask in 0.0f32..=1.0, dist in 0.0f32..5.0) {
            let f = crate::AlphaFalloff::default();
            let a = f.corrected_alpha(mask, Vec3::new(dist, 0.0, 0.0), Vec3::ZERO);
            prop_assert!(a >= mask - 1e-6);
            prop_assert!(a <= 1.0 + 1e-6);
        }
    }
}
