//! The sampling loop.
//!
//! Each tick runs rotation check → sample → persist → report, then sleeps
//! for whatever is left of the interval. Processing that overruns the
//! interval just means the next tick starts immediately.
//!
//! Nothing is retried. Any error ends the loop and is returned to the caller,
//! which drops the session and with it the port.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Local};
use log::{debug, info};

use crate::capture::CaptureWindow;
use crate::config::Config;
use crate::device::TrngSession;
use crate::errors::Result;
use crate::sink::CaptureSink;

// ============================================================================
// Time
// ============================================================================

/// Wall clock and sleep, swappable for tests.
pub trait Clock {
    fn now(&self) -> DateTime<Local>;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Time left in the interval after `elapsed` of processing. Never negative.
pub fn pacing_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Stem the sample was written under.
    pub stem: String,
    /// Whether this tick opened a new capture window.
    pub rotated: bool,
    /// Popcount of the sample.
    pub ones: u32,
    pub loop_index: u64,
    pub total_bytes: u64,
    /// Wall time from the rotation check through reporting.
    pub elapsed: Duration,
}

/// Totals over a whole run, returned when the loop is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    /// Capture windows opened, the initial one included.
    pub windows: u64,
    pub bytes: u64,
}

// ============================================================================
// Acquisition
// ============================================================================

pub struct Acquisition<'a, C: Clock> {
    config: &'a Config,
    session: TrngSession,
    sink: CaptureSink,
    window: CaptureWindow,
    clock: C,
    summary: RunSummary,
}

impl<'a, C: Clock> Acquisition<'a, C> {
    /// Start the first capture window now. The sink directory must already exist.
    pub fn new(config: &'a Config, session: TrngSession, sink: CaptureSink, clock: C) -> Self {
        let window = CaptureWindow::start(clock.now(), config);
        Self {
            config,
            session,
            sink,
            window,
            clock,
            summary: RunSummary {
                windows: 1,
                ..RunSummary::default()
            },
        }
    }

    pub fn window(&self) -> &CaptureWindow {
        &self.window
    }

    pub fn sink(&self) -> &CaptureSink {
        &self.sink
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Run one tick without pacing.
    pub fn tick(&mut self) -> Result<TickReport> {
        let started = self.clock.now();

        let rotated = self.window.advance(started).rotated();
        if rotated {
            self.summary.windows += 1;
        }

        let sample = self.session.read_sample(self.config.sample_bytes())?;
        self.sink
            .write(self.window.stem(), &self.clock.now(), &sample)?;

        let progress = self.window.record(sample.len());
        self.summary.ticks += 1;
        self.summary.bytes += sample.len() as u64;
        info!(
            "Collecting data - Loop: {} - Total bytes collected: {}",
            progress.loop_index, progress.total_bytes
        );

        let elapsed = self
            .clock
            .now()
            .signed_duration_since(started)
            .to_std()
            .unwrap_or_default();

        Ok(TickReport {
            stem: self.window.stem().to_string(),
            rotated,
            ones: sample.ones(),
            loop_index: progress.loop_index,
            total_bytes: progress.total_bytes,
            elapsed,
        })
    }

    /// Tick and pace until `running` goes false.
    ///
    /// The flag is polled once at the top of every tick; a tick in progress
    /// always completes (or fails) first.
    pub fn run(&mut self, running: &AtomicBool) -> Result<RunSummary> {
        let interval = self.config.interval();
        while running.load(Ordering::SeqCst) {
            let report = self.tick()?;
            let delay = pacing_delay(interval, report.elapsed);
            debug!(
                "Tick took {:?}, sleeping {:?} (ones={})",
                report.elapsed, delay, report.ones
            );
            self.clock.sleep(delay);
        }

        info!(
            "Stopped after {} sample(s), {} bytes across {} capture window(s)",
            self.summary.ticks, self.summary.bytes, self.summary.windows
        );
        Ok(self.summary)
    }
}
