//! Post-reconstruction integrity check

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::archive::RelativePath;
use crate::decoder::Expectation;
use crate::hash::hash_file;

/// Verification outcome for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    HashMismatch { expected: String, actual: String },
    Missing,
    /// The file exists but could not be read for hashing
    Unreadable { reason: String },
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Matched)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Matched => write!(f, "hash matched"),
            Outcome::HashMismatch { expected, actual } => {
                write!(f, "hash mismatch (expected {expected}, actual {actual})")
            }
            Outcome::Missing => write!(f, "file not found"),
            Outcome::Unreadable { reason } => write!(f, "unreadable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub path: RelativePath,
    pub outcome: Outcome,
}

/// Per-file results, in the order the archive listed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub results: Vec<Verification>,
}

impl VerificationReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn matched(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_match()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.matched()
    }

    pub fn failures(&self) -> impl Iterator<Item = &Verification> {
        self.results.iter().filter(|r| !r.outcome.is_match())
    }

    pub fn outcome(&self, path: &str) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|r| r.path.as_str() == path)
            .map(|r| &r.outcome)
    }
}

/// Check one file under `root` against its expected digest
pub fn verify_file(root: &Path, expectation: &Expectation) -> Outcome {
    let full_path = expectation.path.to_path(root);
    if !full_path.is_file() {
        return Outcome::Missing;
    }

    match hash_file(&full_path) {
        Ok(actual) => {
            let actual = actual.to_hex();
            // Case-sensitive: the archive always records lowercase hex
            if actual == expectation.expected {
                Outcome::Matched
            } else {
                Outcome::HashMismatch {
                    expected: expectation.expected.clone(),
                    actual,
                }
            }
        }
        Err(e) => Outcome::Unreadable { reason: e.to_string() },
    }
}

/// Verify every expectation; mismatches are reported, never raised
pub fn verify_all(root: &Path, expectations: &[Expectation]) -> VerificationReport {
    let results = expectations
        .iter()
        .map(|expectation| {
            let outcome = verify_file(root, expectation);
            if outcome.is_match() {
                info!(path = %expectation.path, "verified");
            } else {
                warn!(path = %expectation.path, outcome = %outcome, "verification failed");
            }
            Verification {
                path: expectation.path.clone(),
                outcome,
            }
        })
        .collect();

    VerificationReport { results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Digest;
    use std::fs;
    use tempfile::TempDir;

    fn expect(path: &str, content: &[u8]) -> Expectation {
        Expectation {
            path: RelativePath::parse(path).unwrap(),
            expected: Digest::of(content).to_hex(),
        }
    }

    #[test]
    fn test_verify_matched_mismatch_missing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("pages")).unwrap();
        fs::write(dir.path().join("pages/index.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join("app.json"), "{ }").unwrap();

        let expectations = vec![
            expect("pages/index.js", b"console.log(1)"),
            expect("app.json", b"{}"),
            expect("gone.wxml", b"<view/>"),
        ];
        let report = verify_all(dir.path(), &expectations);

        assert_eq!(report.total(), 3);
        assert_eq!(report.matched(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.outcome("pages/index.js"), Some(&Outcome::Matched));
        assert_eq!(
            report.outcome("app.json"),
            Some(&Outcome::HashMismatch {
                expected: Digest::of(b"{}").to_hex(),
                actual: Digest::of(b"{ }").to_hex(),
            })
        );
        assert_eq!(report.outcome("gone.wxml"), Some(&Outcome::Missing));
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "a").unwrap();

        let expectation = Expectation {
            path: RelativePath::parse("a.js").unwrap(),
            expected: Digest::of(b"a").to_hex().to_uppercase(),
        };
        assert!(matches!(verify_file(dir.path(), &expectation), Outcome::HashMismatch { .. }));
    }

    #[test]
    fn test_verify_directory_is_missing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a.js")).unwrap();

        assert_eq!(verify_file(dir.path(), &expect("a.js", b"")), Outcome::Missing);
    }

    #[test]
    fn test_verify_keeps_stream_order() {
        let dir = TempDir::new().unwrap();
        let expectations = vec![expect("z.js", b""), expect("a.js", b"")];
        let report = verify_all(dir.path(), &expectations);

        let order: Vec<_> = report.results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(order, vec!["z.js", "a.js"]);
        assert_eq!(report.failures().count(), 2);
    }
}
