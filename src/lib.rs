//! TrueRNG entropy logger.
//!
//! Polls a TrueRNG hardware random number generator over its USB serial port
//! at a fixed interval. Every sample is appended raw to a `.bin` file, and its
//! popcount (number of set bits) is appended as a `timestamp,count` row to a
//! matching `.csv` file. Both files rotate to a new timestamped stem once the
//! configured capture window has elapsed.
//!
//! # Pipeline
//!
//! 1. [`locate`] the first allow-listed device among [`enumerate_ports`]
//! 2. [`TrngSession::open`] it: 10 s read timeout, DTR asserted, input flushed
//! 3. [`Acquisition::run`] ticks until cancelled:
//!    rotation check, sample, persist, report, pace
//!
//! # Timing
//!
//! Samples start roughly every `interval` seconds: the loop sleeps whatever is
//! left of the interval after reading and writing. A tick that overruns the
//! interval is followed immediately by the next one; cadence degrades, it
//! never goes negative.

mod acquisition;
mod capture;
mod config;
mod device;
mod errors;
pub mod logging;
mod sampler;
mod sink;

pub use acquisition::{pacing_delay, Acquisition, Clock, RunSummary, SystemClock, TickReport};
pub use capture::{CaptureWindow, Progress, Rotation};
pub use config::{env_file_path, load_env_file, Config, ConfigArgs};
pub use device::{
    enumerate_ports, locate, LocatedDevice, PortCandidate, Transport, TrngModel, TrngSession,
    DEFAULT_TIMEOUT,
};
pub use errors::*;
pub use sampler::{popcount, Sample};
pub use sink::{append_binary, append_row, format_row, CaptureSink};
