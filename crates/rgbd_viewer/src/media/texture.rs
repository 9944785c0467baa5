use glam::{Vec2, Vec4};
use image::{DynamicImage, RgbaImage};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// One decoded 8-bit RGBA frame, laid out as the GPU texture expects.
pub type Frame = Arc<RgbaImage>;

/// Quantises a `[0, 1]` channel to 8 bits, clamping out-of-range values.
#[inline]
pub fn to_unorm8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// The channel value an 8-bit texel samples as.
#[inline]
pub fn from_unorm8(b: u8) -> f32 {
    b as f32 / 255.0
}

/// Process-unique handle of a texture source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A GPU-uploadable image whose pixels may be replaced over time.
#[derive(Debug, Clone)]
pub struct TextureSource {
    id: TextureId,
    frame: Frame,
    generation: u64,
    ready: bool,
}

impl TextureSource {
    pub fn new(frame: Frame) -> Self {
        let ready = frame.width() > 0 && frame.height() > 0;
        Self {
            id: TextureId::next(),
            frame,
            generation: 0,
            ready,
        }
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self::new(Arc::new(image.into_rgba8()))
    }

    /// A `width x height` image of one colour.
    pub fn solid(width: u32, height: u32, rgba: [f32; 4]) -> Self {
        Self::new(Arc::new(RgbaImage::from_pixel(
            width,
            height,
            image::Rgba(rgba.map(to_unorm8)),
        )))
    }

    #[inline]
    pub fn id(&self) -> TextureId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.frame.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.frame.height()
    }

    #[inline]
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Bumped every time a different frame is published.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Replaces the current pixels. Publishing the same frame is a no-op.
    pub fn publish(&mut self, frame: Frame) {
        if Arc::ptr_eq(&self.frame, &frame) {
            return;
        }
        self.ready = frame.width() > 0 && frame.height() > 0;
        self.frame = frame;
        self.generation += 1;
    }

    /// Drops the pixel data; the source is no longer ready afterwards.
    pub fn release(&mut self) {
        self.frame = Arc::new(RgbaImage::new(0, 0));
        self.ready = false;
        self.generation += 1;
    }

    /// Bilinear, clamp-to-edge sample with the UV origin at the top-left.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let (w, h) = (self.width(), self.height());
        if w == 0 || h == 0 {
            return Vec4::ZERO;
        }

        let x = (uv.x * w as f32 - 0.5).clamp(0.0, (w - 1) as f32);
        let y = (uv.y * h as f32 - 0.5).clamp(0.0, (h - 1) as f32);
        let (x0, y0) = (x.floor() as u32, y.floor() as u32);
        let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);

        let texel = |px: u32, py: u32| Vec4::from(self.frame.get_pixel(px, py).0.map(from_unorm8));
        let top = texel(x0, y0).lerp(texel(x1, y0), fx);
        let bottom = texel(x0, y1).lerp(texel(x1, y1), fx);
        top.lerp(bottom, fy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = TextureSource::solid(1, 1, [0.0; 4]);
        let b = TextureSource::solid(1, 1, [0.0; 4]);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn solid_sample_is_the_stored_texel() {
        let t = TextureSource::solid(64, 64, [0.299, 0.5, 1.0, 1.0]);
        let expected = Vec4::new(76.0 / 255.0, 128.0 / 255.0, 1.0, 1.0);
        for uv in [Vec2::ZERO, Vec2::splat(0.37), Vec2::ONE] {
            assert_eq!(t.sample(uv), expected);
        }
    }

    #[test]
    fn quantisation_clamps_and_rounds() {
        let t = TextureSource::solid(2, 1, [0.5, 1.5, -0.2, 1.0]);
        assert_eq!(t.frame().as_raw(), &vec![128, 255, 0, 255, 128, 255, 0, 255]);
        assert_eq!(from_unorm8(to_unorm8(0.2)), 51.0 / 255.0);
    }

    #[test]
    fn frames_hold_four_bytes_per_texel() {
        let t = TextureSource::from_image(DynamicImage::new_rgba8(2048, 1024));
        assert_eq!(t.frame().as_raw().len(), 2048 * 1024 * 4);

        let t = TextureSource::from_image(DynamicImage::new_rgb16(16, 8));
        assert_eq!(t.frame().as_raw().len(), 16 * 8 * 4);
    }

    #[test]
    fn bilinear_blends_neighbours() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([255, 255, 255, 255]));
        let t = TextureSource::new(Arc::new(img));
        let mid = t.sample(Vec2::new(0.5, 0.5));
        assert!((mid.x - 0.5).abs() < 1e-6);
        // Edges clamp to the outer texels.
        assert_eq!(t.sample(Vec2::new(0.0, 0.5)).x, 0.0);
        assert_eq!(t.sample(Vec2::new(1.0, 0.5)).x, 1.0);
    }

    #[test]
    fn publish_bumps_generation_once_per_frame() {
        let mut t = TextureSource::solid(2, 2, [0.0; 4]);
        let next: Frame = Arc::new(RgbaImage::new(2, 2));
        t.publish(next.clone());
        t.publish(next);
        assert_eq!(t.generation(), 1);
    }

    #[test]
    fn released_source_is_not_ready() {
        let mut t = TextureSource::solid(2, 2, [0.0; 4]);
        assert!(t.is_ready());
        t.release();
        assert!(!t.is_ready());
        assert_eq!(t.sample(Vec2::ZERO), Vec4::ZERO);
    }
}
