//! SHA-256 content hashing
//!
//! Digests are computed over raw bytes, streamed in fixed-size chunks so memory
//! use does not depend on file size. No text decoding or line-ending
//! normalization happens here.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// Size of chunks for streaming hash computation
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Error type for file hashing
#[derive(Debug, Error)]
pub enum HashError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A SHA-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest {
    bytes: [u8; 32],
}

impl Digest {
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Lowercase hex, 64 characters
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Compute the digest of a byte slice
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self::from_output(&Sha256::digest(data))
    }

    fn from_output(output: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(output);
        Self::from_bytes(bytes)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hash everything `reader` yields
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(Digest::from_output(&hasher.finalize()))
}

/// Hash a file in binary mode
///
/// # Errors
/// Returns [`HashError::Unreadable`] if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<Digest, HashError> {
    let unreadable = |source| HashError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(unreadable)?;
    hash_reader(file).map_err(unreadable)
}
