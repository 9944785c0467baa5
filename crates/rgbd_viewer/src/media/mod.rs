//! Texture sources and the media-element boundary.
//!
//! A [`TextureSource`] is one image that may change over time; a
//! [`FrameSequence`] is a looping in-memory video that drives one.

pub mod sequence;
pub mod texture;

pub use self::sequence::FrameSequence;
pub use self::texture::{from_unorm8, to_unorm8, Frame, TextureId, TextureSource};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MediaError {
    #[error("frame sequence has no frames")]
    Empty,
    #[error("media element was released")]
    Released,
    #[error("frame rate must be finite and > 0 (got {0})")]
    BadFrameRate(f32),
    #[error("frame {index} is {got:?}, expected {expected:?}")]
    SizeMismatch {
        index: usize,
        got: (u32, u32),
        expected: (u32, u32),
    },
}

/// The playback surface of a video element.
pub trait MediaElement {
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn paused(&self) -> bool;
    /// Seconds since the start of the stream.
    fn current_time(&self) -> f64;
    fn set_current_time(&mut self, seconds: f64);
    /// Lets the element's own clock run for `dt` seconds while playing.
    fn advance(&mut self, dt: f64);
}
