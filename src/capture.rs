//! Capture windows and file stem rotation.

use chrono::{DateTime, Local, TimeDelta};
use log::{info, warn};

use crate::config::Config;

/// Stem timestamp, second resolution, e.g. `20240102T030405`.
const STEM_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S";

/// Progress counters as reported after a sample has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub loop_index: u64,
    pub total_bytes: u64,
}

/// Result of a rotation check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// The window is still current.
    Unchanged,
    /// A new window started under a fresh stem.
    Rotated,
    /// A new window started but formats to the previous stem, so its samples
    /// land in the same files.
    Reused,
}

impl Rotation {
    /// Whether a new window (and fresh counters) began.
    pub fn rotated(self) -> bool {
        !matches!(self, Rotation::Unchanged)
    }
}

/// The current group of samples sharing one file stem.
///
/// A window lasts `sample_duration`; the first tick at or past that age
/// starts a new one at the tick's time. Two windows that start within the
/// same second get the same stem and end up appending to the same files.
#[derive(Debug, Clone)]
pub struct CaptureWindow {
    started_at: DateTime<Local>,
    duration: TimeDelta,
    suffix: String,
    stem: String,
    loop_index: u64,
    total_bytes: u64,
}

impl CaptureWindow {
    pub fn start(now: DateTime<Local>, config: &Config) -> Self {
        let suffix = config.stem_suffix();
        let stem = make_stem(&now, &suffix);
        info!("Saving data to file {stem}");
        Self {
            started_at: now,
            duration: TimeDelta::from_std(config.sample_duration()).unwrap_or(TimeDelta::MAX),
            suffix,
            stem,
            loop_index: 1,
            total_bytes: 0,
        }
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Loop index the next recorded sample will be reported with.
    pub fn loop_index(&self) -> u64 {
        self.loop_index
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Rotate if the window has lasted `sample_duration` or longer.
    pub fn advance(&mut self, now: DateTime<Local>) -> Rotation {
        if now.signed_duration_since(self.started_at) < self.duration {
            return Rotation::Unchanged;
        }

        let stem = make_stem(&now, &self.suffix);
        let rotation = if stem == self.stem {
            warn!("New capture window reuses stem {stem}; samples keep appending to the same files");
            Rotation::Reused
        } else {
            Rotation::Rotated
        };
        self.started_at = now;
        self.stem = stem;
        self.loop_index = 1;
        self.total_bytes = 0;

        info!("Starting new capture...");
        info!("Saving data to file {}", self.stem);
        rotation
    }

    /// Account for one persisted sample of `bytes` bytes.
    pub fn record(&mut self, bytes: usize) -> Progress {
        self.total_bytes += bytes as u64;
        let progress = Progress {
            loop_index: self.loop_index,
            total_bytes: self.total_bytes,
        };
        self.loop_index += 1;
        progress
    }
}

fn make_stem(at: &DateTime<Local>, suffix: &str) -> String {
    format!("{}_{suffix}", at.format(STEM_TIMESTAMP_FORMAT))
}
