//! # Seek Detection
//!
//! YouTube reports `PAUSED` both for real pauses and for the brief pause a
//! user seek causes, and has no seek event. [`SeekDetector`] infers seeks
//! by comparing each sampled position with where playback should be given
//! the wall-clock time since the last sample.

use bridge_traits::time::Clock;
use std::sync::Arc;
use tracing::debug;

pub struct SeekDetector {
    clock: Arc<dyn Clock>,
    threshold: f64,
    last_sample: Option<Sample>,
    seeking: bool,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    position: f64,
    wall_ms: i64,
    playing: bool,
}

impl SeekDetector {
    /// `threshold` is the tolerated drift in seconds.
    pub fn new(clock: Arc<dyn Clock>, threshold: f64) -> Self {
        Self {
            clock,
            threshold,
            last_sample: None,
            seeking: false,
        }
    }

    /// Record a sampled position. Returns true when this sample revealed a
    /// jump; the detector then stays in the seeking state until
    /// [`mark_playing`](Self::mark_playing).
    pub fn observe(&mut self, position: f64, playing: bool) -> bool {
        let now = self.clock.unix_timestamp_millis();
        let jumped = self.last_sample.map_or(false, |last| {
            let elapsed = if last.playing {
                (now - last.wall_ms) as f64 / 1000.0
            } else {
                0.0
            };
            let expected = last.position + elapsed;
            (position - expected).abs() > self.threshold
        });

        if jumped {
            debug!(position, "Position jump detected, treating as seek");
            self.seeking = true;
        }
        self.last_sample = Some(Sample {
            position,
            wall_ms: now,
            playing,
        });
        jumped
    }

    pub fn is_seeking(&self) -> bool {
        self.seeking
    }

    /// A seek was requested directly; no sample is needed to know it.
    pub fn mark_seeking(&mut self) {
        self.seeking = true;
    }

    /// The player reported `PLAYING`; any seek in progress is over.
    pub fn mark_playing(&mut self) {
        self.seeking = false;
    }

    /// Forget history, e.g. when a new video loads.
    pub fn reset(&mut self) {
        self.last_sample = None;
        self.seeking = false;
    }
}
