//! Keeps the live color, depth and alpha streams on one logical clock.

use crate::media::{FrameSequence, MediaElement, MediaError};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Color,
    Depth,
    Alpha,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stream::Color => "color",
            Stream::Depth => "depth",
            Stream::Alpha => "alpha",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("{stream} stream failed to start: {source}")]
    Start {
        stream: Stream,
        #[source]
        source: MediaError,
    },
}

/// Drives three media elements as one. The playing state is never stored
/// here: it is read back from the color element.
#[derive(Debug)]
pub struct PlaybackController<M: MediaElement = FrameSequence> {
    color: M,
    depth: M,
    alpha: M,
}

impl<M: MediaElement> PlaybackController<M> {
    pub fn new(color: M, depth: M, alpha: M) -> Self {
        Self { color, depth, alpha }
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        !self.color.paused()
    }

    /// Plays all three streams if paused, pauses all three otherwise.
    ///
    /// Returns the new playing state. If any stream refuses to start, every
    /// stream is paused again before the error is returned.
    pub fn toggle(&mut self) -> Result<bool, PlaybackError> {
        if self.color.paused() {
            self.start()?;
            Ok(true)
        } else {
            self.pause();
            Ok(false)
        }
    }

    pub fn pause(&mut self) {
        self.color.pause();
        self.depth.pause();
        self.alpha.pause();
    }

    fn start(&mut self) -> Result<(), PlaybackError> {
        let failure = [
            (Stream::Color, &mut self.color),
            (Stream::Depth, &mut self.depth),
            (Stream::Alpha, &mut self.alpha),
        ]
        .into_iter()
        .find_map(|(stream, element)| element.play().err().map(|source| (stream, source)));

        if let Some((stream, source)) = failure {
            self.pause();
            return Err(PlaybackError::Start { stream, source });
        }

        // Elements do not start in lock-step; snap the followers to the leader.
        self.resync();
        Ok(())
    }

    /// Sets the depth and alpha clocks to the color clock.
    pub fn resync(&mut self) {
        let t = self.color.current_time();
        self.depth.set_current_time(t);
        self.alpha.set_current_time(t);
    }

    /// Lets every stream's clock run for `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.color.advance(dt);
        self.depth.advance(dt);
        self.alpha.advance(dt);
    }

    /// Largest clock offset of depth or alpha against color, in seconds.
    pub fn drift(&self) -> f64 {
        let t = self.color.current_time();
        (self.depth.current_time() - t)
            .abs()
            .max((self.alpha.current_time() - t).abs())
    }

    #[inline]
    pub fn color(&self) -> &M {
        &self.color
    }

    #[inline]
    pub fn depth(&self) -> &M {
        &self.depth
    }

    #[inline]
    pub fn alpha(&self) -> &M {
        &self.alpha
    }

    pub fn streams_mut(&mut self) -> [&mut M; 3] {
        [&mut self.color, &mut self.depth, &mut self.alpha]
    }
}
