//! Append-only output files.
//!
//! Each write opens its file in append mode and closes it again; nothing is
//! cached between samples, so a window's files only ever grow.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::debug;

use crate::errors::Result;
use crate::sampler::Sample;

/// Row timestamp, e.g. `20240102T03:04:05`.
const ROW_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H:%M:%S";

pub const BINARY_EXTENSION: &str = "bin";
pub const TABLE_EXTENSION: &str = "csv";

/// Append raw sample bytes to `path`, creating it if needed.
pub fn append_binary(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)
}

/// Append one `timestamp,count` row to `path`, creating it if needed.
pub fn append_row(path: &Path, timestamp: &DateTime<Local>, count: u32) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(format_row(timestamp, count).as_bytes())
}

/// Header-less CSV line terminated with `\r\n`, the usual CSV record separator.
pub fn format_row(timestamp: &DateTime<Local>, count: u32) -> String {
    format!("{},{count}\r\n", timestamp.format(ROW_TIMESTAMP_FORMAT))
}

/// Output directory holding one `.bin`/`.csv` pair per capture window.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    dir: PathBuf,
}

impl CaptureSink {
    /// Bind to `dir`, creating it and any missing parents.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!("Output directory ready: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn binary_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{BINARY_EXTENSION}"))
    }

    pub fn table_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.{TABLE_EXTENSION}"))
    }

    /// Persist one sample under `stem`: the row first, then the raw bytes.
    pub fn write(&self, stem: &str, timestamp: &DateTime<Local>, sample: &Sample) -> Result<()> {
        append_row(&self.table_path(stem), timestamp, sample.ones())?;
        append_binary(&self.binary_path(stem), sample.bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn at(secs: i64) -> DateTime<Local> {
        Local.with_ymd_and_hms(2023, 7, 12, 16, 35, 12).unwrap() + TimeDelta::seconds(secs)
    }

    #[test]
    fn row_format_has_second_resolution() {
        assert_eq!(format_row(&at(0), 4093), "20230712T16:35:12,4093\r\n");
    }

    #[test]
    fn create_builds_missing_parents_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        CaptureSink::create(&nested).unwrap();
        let sink = CaptureSink::create(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(sink.dir(), nested.as_path());
    }

    #[test]
    fn paths_share_the_stem() {
        let sink = CaptureSink {
            dir: PathBuf::from("out"),
        };
        assert_eq!(
            sink.binary_path("20230712T163512_trng_s16_i1"),
            PathBuf::from("out/20230712T163512_trng_s16_i1.bin")
        );
        assert_eq!(
            sink.table_path("20230712T163512_trng_s16_i1"),
            PathBuf::from("out/20230712T163512_trng_s16_i1.csv")
        );
    }

    #[test]
    fn writes_only_append() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = CaptureSink::create(tmp.path()).unwrap();
        let samples = [
            Sample::new(vec![0x00, 0x01]),
            Sample::new(vec![0xFF, 0xFF]),
            Sample::new(vec![0x0F, 0x00]),
        ];
        for (i, sample) in samples.iter().enumerate() {
            sink.write("stem", &at(i as i64), sample).unwrap();
        }

        let bin = fs::read(sink.binary_path("stem")).unwrap();
        assert_eq!(bin, vec![0x00, 0x01, 0xFF, 0xFF, 0x0F, 0x00]);

        let csv = fs::read(sink.table_path("stem")).unwrap();
        assert_eq!(
            csv,
            b"20230712T16:35:12,1\r\n20230712T16:35:13,16\r\n20230712T16:35:14,4\r\n".to_vec()
        );
    }

    #[test]
    fn append_to_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gone").join("x.bin");
        assert!(append_binary(&path, &[1, 2, 3]).is_err());
    }
}
