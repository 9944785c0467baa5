use super::{Frame, MediaElement, MediaError, TextureSource};

/// A looping video held in memory as decoded frames.
///
/// Its clock only moves through [`MediaElement::advance`], standing in for the
/// independent decoder of a real video element: the renderer samples whatever
/// frame is current and never waits for a specific one.
#[derive(Debug)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    fps: f32,
    time: f64,
    paused: bool,
    released: bool,
    texture: TextureSource,
}

impl FrameSequence {
    /// Creates a paused sequence at time 0. All frames must share one size.
    pub fn new(frames: Vec<Frame>, fps: f32) -> Result<Self, MediaError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(MediaError::BadFrameRate(fps));
        }
        let first = frames.first().cloned().ok_or(MediaError::Empty)?;
        let expected = first.dimensions();
        for (index, frame) in frames.iter().enumerate() {
            if frame.dimensions() != expected {
                return Err(MediaError::SizeMismatch {
                    index,
                    got: frame.dimensions(),
                    expected,
                });
            }
        }

        Ok(Self {
            frames,
            fps,
            time: 0.0,
            paused: true,
            released: false,
            texture: TextureSource::new(first),
        })
    }

    #[inline]
    pub fn texture(&self) -> &TextureSource {
        &self.texture
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Length of one loop in seconds.
    pub fn duration(&self) -> f64 {
        self.frames.len() as f64 / self.fps as f64
    }

    /// Index of the frame shown at the current time.
    pub fn frame_index(&self) -> usize {
        if self.frames.is_empty() {
            return 0;
        }
        let index = (self.time * self.fps as f64).floor() as usize;
        index.min(self.frames.len() - 1)
    }

    /// Stops playback and drops every decoded frame.
    pub fn release(&mut self) {
        self.paused = true;
        self.released = true;
        self.frames.clear();
        self.texture.release();
    }

    fn wrap(&self, seconds: f64) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 || !seconds.is_finite() {
            return 0.0;
        }
        seconds.rem_euclid(duration)
    }

    fn publish_current(&mut self) {
        if let Some(frame) = self.frames.get(self.frame_index()) {
            self.texture.publish(frame.clone());
        }
    }
}

impl MediaElement for FrameSequence {
    fn play(&mut self) -> Result<(), MediaError> {
        if self.released {
            return Err(MediaError::Released);
        }
        if self.frames.is_empty() {
            return Err(MediaError::Empty);
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn paused(&self) -> bool {
        self.paused
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn set_current_time(&mut self, seconds: f64) {
        self.time = self.wrap(seconds);
        self.publish_current();
    }

    fn advance(&mut self, dt: f64) {
        if self.paused || dt <= 0.0 {
            return;
        }
        self.time = self.wrap(self.time + dt);
        self.publish_current();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use std::sync::Arc;

    /// Frame `i` carries `i` in its red channel.
    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Arc::new(RgbaImage::from_pixel(2, 2, image::Rgba([i as u8, 0, 0, 255]))))
            .collect()
    }

    #[test]
    fn starts_paused_at_zero() {
        let seq = FrameSequence::new(frames(3), 30.0).unwrap();
        assert!(seq.paused());
        assert_eq!(seq.current_time(), 0.0);
        assert!(seq.texture().is_ready());
    }

    #[test]
    fn rejects_empty_and_bad_rate() {
        assert_eq!(FrameSequence::new(vec![], 30.0).unwrap_err(), MediaError::Empty);
        assert_eq!(
            FrameSequence::new(frames(1), 0.0).unwrap_err(),
            MediaError::BadFrameRate(0.0)
        );
    }

    #[test]
    fn rejects_mixed_sizes() {
        let mut f = frames(2);
        f.push(Arc::new(RgbaImage::new(4, 4)));
        assert!(matches!(
            FrameSequence::new(f, 10.0),
            Err(MediaError::SizeMismatch { index: 2, .. })
        ));
    }

    #[test]
    fn advance_only_while_playing() {
        let mut seq = FrameSequence::new(frames(10), 10.0).unwrap();
        seq.advance(0.35);
        assert_eq!(seq.frame_index(), 0);

        seq.play().unwrap();
        seq.advance(0.35);
        assert_eq!(seq.frame_index(), 3);
        assert_eq!(seq.texture().generation(), 1);
    }

    #[test]
    fn loops_past_the_end() {
        let mut seq = FrameSequence::new(frames(4), 4.0).unwrap();
        seq.play().unwrap();
        seq.advance(1.25);
        assert!((seq.current_time() - 0.25).abs() < 1e-9);
        assert_eq!(seq.frame_index(), 1);
    }

    #[test]
    fn seeking_publishes_frame() {
        let mut seq = FrameSequence::new(frames(4), 4.0).unwrap();
        seq.set_current_time(0.5);
        assert_eq!(seq.frame_index(), 2);
        assert_eq!(seq.texture().frame().get_pixel(0, 0).0[0], 2);
    }

    #[test]
    fn released_sequence_refuses_to_play() {
        let mut seq = FrameSequence::new(frames(2), 30.0).unwrap();
        seq.release();
        assert_eq!(seq.play(), Err(MediaError::Released));
        assert!(!seq.texture().is_ready());
    }
}
