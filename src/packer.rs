//! Directory → archive
//!
//! The packer takes candidate paths in the order discovery produced them and
//! appends one record per readable file. A file that cannot be read is left
//! out and counted; it never aborts the run. Each record is rendered in memory
//! and appended with a single write, so an interrupted run leaves only whole
//! records behind.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::archive::{BodyEncoding, Record, RelativePath};
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::hash::{hash_reader, Digest};

/// One record that made it into the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedEntry {
    pub path: RelativePath,
    pub digest: Digest,
    pub size: usize,
    pub encoding: BodyEncoding,
}

/// A candidate that was left out of the archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFailure {
    pub source: PathBuf,
    pub reason: String,
}

/// Outcome of a packing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    pub entries: Vec<PackedEntry>,
    pub failures: Vec<PackFailure>,
}

impl PackReport {
    /// Files written to the archive
    pub fn written(&self) -> usize {
        self.entries.len()
    }

    /// Candidates skipped because of an error
    pub fn errors(&self) -> usize {
        self.failures.len()
    }
}

/// Packs files under a project root into an archive
#[derive(Debug, Clone)]
pub struct Packer {
    root: PathBuf,
    encoder: Encoder,
}

impl Packer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            encoder: Encoder::new(),
        }
    }

    /// Use a custom encoder (e.g. with marker escaping disabled)
    pub fn with_encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pack `candidates` into a freshly created archive at `output`.
    ///
    /// A pre-existing file at `output` is deleted first. A candidate that is
    /// the output file itself is skipped.
    ///
    /// # Errors
    /// Fails if the root is not a directory or the archive cannot be written.
    pub fn pack_to_file<I, P>(&self, candidates: I, output: &Path) -> Result<PackReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.check_root()?;

        let write_err = |source| Error::ArchiveWrite {
            path: output.to_path_buf(),
            source,
        };

        if output.exists() {
            fs::remove_file(output).map_err(write_err)?;
            info!(path = %output.display(), "removed previous archive");
        }

        let file = fs::File::create(output).map_err(write_err)?;
        let output_id = fs::canonicalize(output).ok();
        let candidates = candidates.into_iter().filter(|candidate| {
            let candidate: &Path = candidate.as_ref();
            let is_output = output_id.is_some() && fs::canonicalize(candidate).ok() == output_id;
            if is_output {
                info!(path = %candidate.display(), "skipping the archive being written");
            }
            !is_output
        });

        let mut writer = BufWriter::new(file);
        let report = self.pack_into(candidates, &mut writer).map_err(write_err)?;
        writer.flush().map_err(write_err)?;
        Ok(report)
    }

    /// Pack `candidates` into any writer
    ///
    /// # Errors
    /// Fails if the root is not a directory or `writer` fails.
    pub fn pack_to_writer<I, P, W>(&self, candidates: I, writer: &mut W) -> Result<PackReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        W: Write,
    {
        self.check_root()?;
        self.pack_into(candidates, writer).map_err(|source| Error::ArchiveWrite {
            path: PathBuf::from("<writer>"),
            source,
        })
    }

    fn check_root(&self) -> Result<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(Error::SourceDirMissing { path: self.root.clone() })
        }
    }

    fn pack_into<I, P, W>(&self, candidates: I, writer: &mut W) -> std::io::Result<PackReport>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
        W: Write,
    {
        let mut report = PackReport::default();

        for candidate in candidates {
            let candidate: &Path = candidate.as_ref();
            match self.load(candidate) {
                Ok((record, entry)) => {
                    self.encoder.encode_to_writer(&record, writer)?;
                    info!(
                        path = %entry.path,
                        size = entry.size,
                        encoding = %entry.encoding,
                        "packed"
                    );
                    report.entries.push(entry);
                }
                Err(reason) => {
                    warn!(path = %candidate.display(), error = %reason, "skipped");
                    report.failures.push(PackFailure {
                        source: candidate.to_path_buf(),
                        reason,
                    });
                }
            }
        }

        Ok(report)
    }

    /// Read a candidate once and hash exactly the bytes that get embedded
    fn load(&self, candidate: &Path) -> std::result::Result<(Record, PackedEntry), String> {
        let path = RelativePath::from_root(&self.root, candidate).map_err(|e| e.to_string())?;
        let content = fs::read(candidate).map_err(|e| format!("cannot read file: {e}"))?;
        let digest = hash_reader(content.as_slice()).map_err(|e| format!("cannot hash file: {e}"))?;

        let entry = PackedEntry {
            path: path.clone(),
            digest,
            size: content.len(),
            encoding: self.encoder.body_encoding(&content),
        };
        Ok((Record::new(path, digest.to_hex(), content), entry))
    }
}
