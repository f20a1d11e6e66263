//! Acquisition configuration.
//!
//! Every option is required. Values come from command-line flags or, when a
//! flag is absent, from the matching environment variable. Variables missing
//! from the environment may be supplied by a `variables.env` file, loaded with
//! [`load_env_file`] before the flags are parsed. Validation happens
//! here rather than in clap so that a missing or malformed value surfaces as
//! [`AcquisitionError::Configuration`] before any device is touched.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use log::debug;

use crate::errors::{AcquisitionError, Result};

pub const SAMPLE_VALUE: &str = "SAMPLE_VALUE";
pub const INTERVAL_VALUE: &str = "INTERVAL_VALUE";
pub const SAMPLE_DURATION: &str = "SAMPLE_DURATION";
pub const TEMP_FOLDER: &str = "TEMP_FOLDER";

/// Settings file read from the working directory at startup.
pub const ENV_FILE: &str = "variables.env";
/// Overrides the location of [`ENV_FILE`].
pub const ENV_FILE_VAR: &str = "TRNG_ENV_FILE";

/// Path of the settings file: `$TRNG_ENV_FILE`, else `variables.env`.
pub fn env_file_path() -> PathBuf {
    std::env::var_os(ENV_FILE_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(ENV_FILE))
}

/// Load `KEY=VALUE` lines from `path` into the process environment.
///
/// Variables that are already set keep their value. A missing file is not an
/// error and returns `false`; an unreadable or malformed one is.
pub fn load_env_file(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => {
            debug!("Loaded settings from {}", path.display());
            Ok(true)
        }
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(AcquisitionError::Configuration(format!(
            "failed to load {}: {e}",
            path.display()
        ))),
    }
}

/// Raw, unvalidated configuration as supplied by the operator.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Sample size in bits (multiple of 8)
    #[arg(long = "sample-bits", env = SAMPLE_VALUE)]
    pub sample_value: Option<String>,
    /// Seconds between sample starts (fractions allowed)
    #[arg(long = "interval", env = INTERVAL_VALUE)]
    pub interval_value: Option<String>,
    /// Seconds per capture window before a new pair of files is started
    #[arg(long = "sample-duration", env = SAMPLE_DURATION)]
    pub sample_duration: Option<String>,
    /// Output directory, created if missing
    #[arg(long = "temp-folder", env = TEMP_FOLDER)]
    pub temp_folder: Option<String>,
}

impl ConfigArgs {
    /// Build from an arbitrary key lookup (environment, map, ...).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            sample_value: lookup(SAMPLE_VALUE),
            interval_value: lookup(INTERVAL_VALUE),
            sample_duration: lookup(SAMPLE_DURATION),
            temp_folder: lookup(TEMP_FOLDER),
        }
    }

    /// Validate and convert into an immutable [`Config`].
    pub fn resolve(&self) -> Result<Config> {
        let sample_bits = parse_sample_bits(required(SAMPLE_VALUE, &self.sample_value)?)?;
        let interval_secs = parse_interval(required(INTERVAL_VALUE, &self.interval_value)?)?;
        let sample_duration_secs =
            parse_positive_secs(SAMPLE_DURATION, required(SAMPLE_DURATION, &self.sample_duration)?)?;
        let temp_folder = PathBuf::from(required(TEMP_FOLDER, &self.temp_folder)?);

        Ok(Config {
            sample_bits,
            interval_secs,
            sample_duration_secs,
            temp_folder,
        })
    }
}

/// Validated acquisition settings. Built once at startup and passed by
/// reference to everything that needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Bits per sample, always a non-zero multiple of 8.
    pub sample_bits: u32,
    /// Seconds between sample starts.
    pub interval_secs: f64,
    /// Seconds per capture window.
    pub sample_duration_secs: u64,
    /// Directory receiving the `.bin`/`.csv` pairs.
    pub temp_folder: PathBuf,
}

impl Config {
    /// Bytes read from the device per sample.
    pub fn sample_bytes(&self) -> usize {
        (self.sample_bits / 8) as usize
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn sample_duration(&self) -> Duration {
        Duration::from_secs(self.sample_duration_secs)
    }

    /// Part of every file stem that follows the timestamp, e.g. `trng_s16_i1`.
    ///
    /// Whole intervals print without a fractional part (`i1`), others as a
    /// plain decimal (`i0.5`).
    pub fn stem_suffix(&self) -> String {
        format!("trng_s{}_i{}", self.sample_bits, self.interval_secs)
    }
}

fn required<'a>(key: &str, value: &'a Option<String>) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AcquisitionError::Configuration(format!("{key} is not set"))),
    }
}

fn parse_sample_bits(raw: &str) -> Result<u32> {
    let bits: u32 = raw.parse().map_err(|_| {
        AcquisitionError::Configuration(format!("{SAMPLE_VALUE} must be an integer, got {raw:?}"))
    })?;
    if bits == 0 || bits % 8 != 0 {
        return Err(AcquisitionError::Configuration(format!(
            "{SAMPLE_VALUE} must be a positive multiple of 8, got {bits}"
        )));
    }
    Ok(bits)
}

fn parse_interval(raw: &str) -> Result<f64> {
    let secs: f64 = raw.parse().map_err(|_| {
        AcquisitionError::Configuration(format!("{INTERVAL_VALUE} must be a number, got {raw:?}"))
    })?;
    // from_secs_f64 panics on values it cannot represent
    if !secs.is_finite() || secs <= 0.0 || secs > u32::MAX as f64 {
        return Err(AcquisitionError::Configuration(format!(
            "{INTERVAL_VALUE} must be a positive number of seconds, got {raw}"
        )));
    }
    Ok(secs)
}

fn parse_positive_secs(key: &str, raw: &str) -> Result<u64> {
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(AcquisitionError::Configuration(format!(
            "{key} must be a positive integer, got {raw:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(pairs: &[(&str, &str)]) -> ConfigArgs {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigArgs::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn env_file_fills_unset_variables_only() {
        // The only test in this binary that touches the process environment
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(ENV_FILE);
        std::fs::write(
            &path,
            "SAMPLE_VALUE=2048\nINTERVAL_VALUE=1\nSAMPLE_DURATION=3600\nTEMP_FOLDER=data/tmp\n",
        )
        .unwrap();
        std::env::remove_var(SAMPLE_VALUE);
        std::env::remove_var(SAMPLE_DURATION);
        std::env::remove_var(TEMP_FOLDER);
        std::env::set_var(INTERVAL_VALUE, "5");

        assert!(load_env_file(&path).unwrap());
        let config = ConfigArgs::from_lookup(|key| std::env::var(key).ok())
            .resolve()
            .unwrap();
        assert_eq!(config.sample_bits, 2048);
        assert_eq!(config.sample_duration_secs, 3600);
        assert_eq!(config.temp_folder, PathBuf::from("data/tmp"));
        // Already exported, so the file does not win
        assert_eq!(config.interval(), Duration::from_secs(5));

        assert!(!load_env_file(&tmp.path().join("absent.env")).unwrap());
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            (SAMPLE_VALUE, "2048"),
            (INTERVAL_VALUE, "1"),
            (SAMPLE_DURATION, "3600"),
            (TEMP_FOLDER, "data/tmp"),
        ]
    }

    #[test]
    fn resolves_complete_configuration() {
        let config = args(&complete()).resolve().unwrap();
        assert_eq!(config.sample_bits, 2048);
        assert_eq!(config.sample_bytes(), 256);
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert_eq!(config.sample_duration(), Duration::from_secs(3600));
        assert_eq!(config.temp_folder, PathBuf::from("data/tmp"));
        assert_eq!(config.stem_suffix(), "trng_s2048_i1");
    }

    #[test]
    fn fractional_interval_is_kept_in_stem() {
        let mut pairs = complete();
        pairs[1] = (INTERVAL_VALUE, "0.5");
        let config = args(&pairs).resolve().unwrap();
        assert_eq!(config.interval(), Duration::from_millis(500));
        assert_eq!(config.stem_suffix(), "trng_s2048_i0.5");
    }

    #[test]
    fn every_option_is_required() {
        for missing in [SAMPLE_VALUE, INTERVAL_VALUE, SAMPLE_DURATION, TEMP_FOLDER] {
            let pairs: Vec<_> = complete().into_iter().filter(|(k, _)| *k != missing).collect();
            match args(&pairs).resolve() {
                Err(AcquisitionError::Configuration(msg)) => assert!(msg.contains(missing)),
                other => panic!("expected configuration error for {missing}, got {other:?}"),
            }
        }
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = complete();
        pairs[3] = (TEMP_FOLDER, "   ");
        assert!(matches!(
            args(&pairs).resolve(),
            Err(AcquisitionError::Configuration(_))
        ));
    }

    #[test]
    fn sample_bits_must_be_byte_aligned() {
        for bad in ["12", "0", "-8", "eight"] {
            let mut pairs = complete();
            pairs[0] = (SAMPLE_VALUE, bad);
            assert!(
                matches!(args(&pairs).resolve(), Err(AcquisitionError::Configuration(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn interval_and_duration_must_be_positive() {
        for (key, bad) in [
            (INTERVAL_VALUE, "0"),
            (INTERVAL_VALUE, "-1"),
            (INTERVAL_VALUE, "NaN"),
            (SAMPLE_DURATION, "0"),
            (SAMPLE_DURATION, "1.5"),
        ] {
            let pairs: Vec<_> = complete()
                .into_iter()
                .map(|(k, v)| if k == key { (k, bad) } else { (k, v) })
                .collect();
            assert!(
                matches!(args(&pairs).resolve(), Err(AcquisitionError::Configuration(_))),
                "{key}={bad} should be rejected"
            );
        }
    }
}
