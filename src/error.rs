//! Run-level errors
//!
//! Only directory-level preconditions end a run. Per-file problems are
//! collected in the pack, unpack and verification reports instead.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("source directory not found: {}", path.display())]
    SourceDirMissing { path: PathBuf },

    #[error("archive not found: {}", path.display())]
    ArchiveMissing { path: PathBuf },

    #[error("cannot read archive {}: {source}", path.display())]
    ArchiveRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write archive {}: {source}", path.display())]
    ArchiveWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot prepare destination {}: {source}", path.display())]
    Destination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot back up {} to {}: {source}", from.display(), to.display())]
    Backup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid legacy config {}: {source}", path.display())]
    LegacyConfig {
        path: PathBuf,
        #[source]
        source: ::config::ConfigError,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
