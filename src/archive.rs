//! Archive data structures and format literals

use std::fmt;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

// Archive format constants
pub const MARKER: &str = "// ==========================================";
pub const FILE_TAG: &str = "// 文件: ";
pub const HASH_TAG: &str = "// SHA256: ";
pub const ENCODING_TAG: &str = "// 编码: ";
pub const BASE64_ENCODING: &str = "base64";

/// Width of wrapped base64 body lines
pub const BASE64_LINE_WIDTH: usize = 76;

/// Returns true if `line` is the structural marker line.
///
/// Surrounding whitespace, including the line terminator, is ignored.
pub fn is_marker_line(line: &str) -> bool {
    line.trim() == MARKER
}

/// Check if text contains a line that would be read as a marker
pub fn contains_marker_line(text: &str) -> bool {
    text.lines().any(is_marker_line)
}

/// Strip a trailing `\n` or `\r\n` from a line.
pub(crate) fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// How a record body is stored in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    /// Verbatim (lossy) UTF-8 text
    Text,
    /// Base64, wrapped at [`BASE64_LINE_WIDTH`] columns
    Base64,
}

impl BodyEncoding {
    /// Detect the encoding a body needs.
    ///
    /// Content with a line equal to the marker would be read back as a record
    /// boundary, so it is escaped when `escape_markers` is set. Everything else
    /// is stored as text, including invalid UTF-8 (which is decoded lossily).
    pub fn detect(data: &[u8], escape_markers: bool) -> Self {
        if escape_markers && contains_marker_line(&String::from_utf8_lossy(data)) {
            BodyEncoding::Base64
        } else {
            BodyEncoding::Text
        }
    }

    /// Parse the value of an encoding header line
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            BASE64_ENCODING => Some(BodyEncoding::Base64),
            "text" => Some(BodyEncoding::Text),
            _ => None,
        }
    }
}

impl fmt::Display for BodyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BodyEncoding::Text => f.write_str("text"),
            BodyEncoding::Base64 => f.write_str(BASE64_ENCODING),
        }
    }
}

/// Error type for relative path validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,

    #[error("absolute path not allowed: {path}")]
    Absolute { path: String },

    #[error("parent directory reference not allowed: {path}")]
    ParentDir { path: String },

    #[error("path prefix not allowed: {path}")]
    Prefix { path: String },

    #[error("path {} is not under {}", path.display(), root.display())]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8 { path: PathBuf },
}

/// A slash-separated path that cannot escape the directory it is joined to
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath(String);

impl RelativePath {
    /// Parse a path as found in an archive header.
    ///
    /// Both `/` and `\` are treated as separators. `.` and empty segments are
    /// dropped; `..` segments, absolute paths and drive prefixes are rejected.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        let trimmed = input.trim();
        if trimmed.starts_with('/') || trimmed.starts_with('\\') {
            return Err(PathError::Absolute { path: trimmed.to_string() });
        }
        Self::from_segments(trimmed, trimmed.split(['/', '\\']))
    }

    /// Build the relative path of `path` under `root`.
    ///
    /// Each component is kept whole, so a name such as `a\b.js` stays a single
    /// segment on platforms where it is a legal file name.
    pub fn from_root(root: &Path, path: &Path) -> Result<Self, PathError> {
        let outside = || PathError::OutsideRoot {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        };
        let relative = path.strip_prefix(root).map_err(|_| outside())?;

        let mut names = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => {
                    let name = name
                        .to_str()
                        .ok_or_else(|| PathError::NonUtf8 { path: path.to_path_buf() })?;
                    names.push(name);
                }
                Component::CurDir => continue,
                _ => return Err(outside()),
            }
        }

        Self::from_segments(&relative.to_string_lossy(), names)
    }

    fn from_segments<'a, I>(original: &str, segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut kept = Vec::new();
        for segment in segments {
            match segment {
                "" | "." => continue,
                ".." => return Err(PathError::ParentDir { path: original.to_string() }),
                s if kept.is_empty() && has_drive_prefix(s) => {
                    return Err(PathError::Prefix { path: original.to_string() })
                }
                s => kept.push(s),
            }
        }

        if kept.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self(kept.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join this path onto `root`, one segment at a time
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(self.0.split('/'));
        path
    }
}

/// `C:`, `c:foo` and the like: a Windows drive in front of the path
fn has_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single file in an archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Path of the file relative to the project root
    pub path: RelativePath,
    /// Hex digest recorded in the header, if one was present
    pub digest: Option<String>,
    /// Raw file bytes
    pub content: Vec<u8>,
}

impl Record {
    pub fn new(path: RelativePath, digest: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            digest: Some(digest.into()),
            content: content.into(),
        }
    }
}
