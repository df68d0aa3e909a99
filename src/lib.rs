//! # emx-txtpack
//!
//! Pack a project directory into one plain-text archive that survives
//! copy/paste, then rebuild the directory and verify every file by SHA-256.
//!
//! ## Archive Format
//!
//! Each file becomes one record:
//!
//! ```text
//!
//! // ==========================================
//! // 文件: pages/index.js
//! // SHA256: 3a0f...c9e1
//! // ==========================================
//!
//! console.log(1)
//! ```
//!
//! The same marker line opens and closes a header. A record's body runs until
//! the next record's marker or the end of the stream.
//!
//! ## Marker Escaping
//!
//! A file whose content contains the marker line as a full line would be read
//! back as a record boundary. Such bodies are base64-encoded and announced
//! with one extra header line:
//!
//! ```text
//! // 编码: base64
//! ```
//!
//! The hash always covers the original file bytes, never the encoded body.
//!
//! ## Verification
//!
//! Unpacking reports per-file results (`Matched`, `HashMismatch`, `Missing`,
//! `Unreadable`) instead of a single verdict. A bad file never stops the
//! others from being restored.

pub mod archive;
pub mod backup;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod hash;
pub mod packer;
pub mod unpacker;
pub mod verify;

#[cfg(feature = "walkdir")]
pub mod discovery;

#[cfg(feature = "cli")]
pub mod cli;

pub use archive::{BodyEncoding, PathError, Record, RelativePath};
pub use backup::prepare_destination;
pub use config::Config;
pub use decoder::{CorruptRecord, DecodeSummary, Decoder, Expectation};
#[cfg(feature = "walkdir")]
pub use discovery::Discovery;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use hash::{hash_file, Digest, HashError};
pub use packer::{PackFailure, PackReport, PackedEntry, Packer};
pub use unpacker::{UnpackFailure, UnpackReport, Unpacker};
pub use verify::{Outcome, Verification, VerificationReport};
