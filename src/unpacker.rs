//! Archive → directory
//!
//! The archive is read once, top to bottom. Each record is written as soon as
//! the decoder closes it: missing parent directories are created and any
//! existing file is overwritten. A record that cannot be written is reported
//! and skipped; the run continues.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::archive::{Record, RelativePath};
use crate::decoder::{CorruptRecord, Decoder, Expectation};
use crate::error::{Error, Result};
use crate::verify::{verify_all, VerificationReport};

/// A record that did not end up on disk
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnpackFailure {
    #[error("unsafe path rejected: {path}")]
    UnsafePath { path: String },

    #[error("corrupt body for {path}: {reason}")]
    CorruptBody { path: RelativePath, reason: String },

    #[error("cannot write {path}: {reason}")]
    WriteFailed { path: RelativePath, reason: String },
}

/// Outcome of the reconstruction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    /// File-name headers seen
    pub discovered: usize,
    /// Paths written, in stream order (a duplicate path appears once per write)
    pub written: Vec<RelativePath>,
    pub failures: Vec<UnpackFailure>,
    /// Verification queue for [`Unpacker::verify`]
    pub expectations: Vec<Expectation>,
}

impl UnpackReport {
    pub fn errors(&self) -> usize {
        self.failures.len()
    }
}

/// Rebuilds archived files under a destination directory
#[derive(Debug, Clone)]
pub struct Unpacker {
    dest: PathBuf,
}

impl Unpacker {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Unpack the archive file at `archive`
    ///
    /// # Errors
    /// Fails if the archive is missing or unreadable, or the destination
    /// cannot be created.
    pub fn unpack_file(&self, archive: &Path) -> Result<UnpackReport> {
        if !archive.is_file() {
            return Err(Error::ArchiveMissing { path: archive.to_path_buf() });
        }
        let file = fs::File::open(archive).map_err(|source| Error::ArchiveRead {
            path: archive.to_path_buf(),
            source,
        })?;
        self.unpack_reader(BufReader::new(file), archive)
    }

    /// Unpack an archive from any buffered reader. `origin` names the source
    /// in error messages.
    ///
    /// # Errors
    /// Fails if reading fails or the destination cannot be created.
    pub fn unpack_reader<R: BufRead>(&self, mut reader: R, origin: &Path) -> Result<UnpackReport> {
        fs::create_dir_all(&self.dest).map_err(|source| Error::Destination {
            path: self.dest.clone(),
            source,
        })?;

        let mut report = UnpackReport::default();
        let mut decoder = Decoder::new();
        let mut raw = Vec::new();

        loop {
            raw.clear();
            let n = reader.read_until(b'\n', &mut raw).map_err(|source| Error::ArchiveRead {
                path: origin.to_path_buf(),
                source,
            })?;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);
            if let Some(decoded) = decoder.feed_line(&line) {
                self.store(decoded, &mut report);
            }
        }

        let (last, summary) = decoder.finish();
        if let Some(decoded) = last {
            self.store(decoded, &mut report);
        }

        report.discovered = summary.discovered;
        report.expectations = summary.expectations;
        report.failures.extend(
            summary
                .rejected
                .into_iter()
                .map(|path| UnpackFailure::UnsafePath { path }),
        );
        Ok(report)
    }

    /// Re-hash every queued file under the destination
    pub fn verify(&self, expectations: &[Expectation]) -> VerificationReport {
        verify_all(&self.dest, expectations)
    }

    fn store(
        &self,
        decoded: std::result::Result<Record, CorruptRecord>,
        report: &mut UnpackReport,
    ) {
        let record = match decoded {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %e.path, reason = %e.reason, "corrupt record");
                report.failures.push(UnpackFailure::CorruptBody {
                    path: e.path,
                    reason: e.reason,
                });
                return;
            }
        };

        match self.write_record(&record) {
            Ok(full_path) => {
                debug!(path = %full_path.display(), bytes = record.content.len(), "wrote");
                info!(path = %record.path, "restored");
                report.written.push(record.path);
            }
            Err(failure) => {
                warn!(path = %record.path, error = %failure, "not restored");
                report.failures.push(failure);
            }
        }
    }

    /// Write one record under the destination without following symlinks.
    ///
    /// Parent directories are created one level at a time; a symlink met on
    /// the way, or sitting at the file's own name, refuses the record.
    fn write_record(&self, record: &Record) -> std::result::Result<PathBuf, UnpackFailure> {
        let unsafe_path = || UnpackFailure::UnsafePath {
            path: record.path.to_string(),
        };
        let write_failed = |e: io::Error| UnpackFailure::WriteFailed {
            path: record.path.clone(),
            reason: e.to_string(),
        };

        let root = fs::canonicalize(&self.dest).map_err(write_failed)?;
        let mut segments: Vec<&str> = record.path.as_str().split('/').collect();
        let file_name = segments.pop().ok_or_else(unsafe_path)?;

        let mut dir = self.dest.clone();
        for segment in segments {
            dir.push(segment);
            match fs::symlink_metadata(&dir) {
                Ok(meta) if meta.file_type().is_symlink() => return Err(unsafe_path()),
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    fs::create_dir(&dir).map_err(write_failed)?;
                }
                Err(e) => return Err(write_failed(e)),
            }
        }

        let parent = fs::canonicalize(&dir).map_err(write_failed)?;
        if !parent.starts_with(&root) {
            return Err(unsafe_path());
        }

        let full_path = dir.join(file_name);
        if let Ok(meta) = fs::symlink_metadata(&full_path) {
            if meta.file_type().is_symlink() {
                return Err(unsafe_path());
            }
        }
        fs::write(&full_path, &record.content).map_err(write_failed)?;
        Ok(full_path)
    }
}
