//! Configuration file defaults
//!
//! Both tools read `txtpack.toml` (or a path given on the command line).
//! Every key is optional; a missing file means built-in defaults. Positional
//! command-line arguments override what the file says.
//!
//! When the TOML file is missing, a `config.ini` in the same directory is
//! read instead. Its `[DEFAULT]` section holds `TARGET_DIR`, `OUTPUT_FILE`,
//! `FILE_TYPES` and `EXCLUDE_DIRS` (space separated), `SOURCE_FILE`,
//! `OUTPUT_DIR` and `BACKUP` (`yes` enables it). Keys are matched without
//! regard to case.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "txtpack.toml";

/// INI file used when the TOML file is absent
pub const LEGACY_CONFIG_FILE: &str = "config.ini";

type IniSections = HashMap<String, HashMap<String, String>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub encode: EncodeConfig,
    pub decode: DecodeConfig,
}

/// Packing defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    pub target_dir: PathBuf,
    pub output_file: PathBuf,
    pub file_types: Vec<String>,
    pub exclude_dirs: Vec<String>,
    /// Base64-escape bodies that contain the marker line
    pub escape_marker_lines: bool,
}

/// Unpacking defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    pub source_file: PathBuf,
    pub output_dir: PathBuf,
    pub backup: bool,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            output_file: PathBuf::from("encoded_project.txt"),
            file_types: ["wxml", "js", "wxss", "wxs", "json"].map(String::from).to_vec(),
            exclude_dirs: ["node_modules", "dist", "build", ".git", "unpackage"]
                .map(String::from)
                .to_vec(),
            escape_marker_lines: true,
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            source_file: PathBuf::from("encoded_project.txt"),
            output_dir: PathBuf::from("decoded_project"),
            backup: true,
        }
    }
}

impl Config {
    /// Load `path`. When it does not exist, a `config.ini` beside it is
    /// read instead, and failing that the defaults are used.
    ///
    /// # Errors
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let legacy = path.with_file_name(LEGACY_CONFIG_FILE);
            if legacy.is_file() {
                info!(path = %legacy.display(), "reading legacy config");
                return Self::load_legacy(&legacy);
            }
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load an INI file with the `[DEFAULT]` keys of the original tools
    ///
    /// # Errors
    /// Fails if the file cannot be read or is not valid INI.
    pub fn load_legacy(path: &Path) -> Result<Self> {
        let sections = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Ini))
            .build()
            .and_then(|settings| settings.try_deserialize::<IniSections>())
            .map_err(|source| Error::LegacyConfig {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_ini(&sections))
    }

    fn from_ini(sections: &IniSections) -> Self {
        let mut config = Self::default();
        let Some(defaults) = sections
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("default"))
            .map(|(_, keys)| keys)
        else {
            return config;
        };

        let get = |key: &str| {
            defaults
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.trim())
        };
        let words = |v: &str| v.split_whitespace().map(String::from).collect::<Vec<_>>();

        let encode = &mut config.encode;
        if let Some(v) = get("TARGET_DIR") {
            encode.target_dir = PathBuf::from(v);
        }
        if let Some(v) = get("OUTPUT_FILE") {
            encode.output_file = PathBuf::from(v);
        }
        if let Some(v) = get("FILE_TYPES") {
            encode.file_types = words(v);
        }
        if let Some(v) = get("EXCLUDE_DIRS") {
            encode.exclude_dirs = words(v);
        }

        let decode = &mut config.decode;
        if let Some(v) = get("SOURCE_FILE") {
            decode.source_file = PathBuf::from(v);
        }
        if let Some(v) = get("OUTPUT_DIR") {
            decode.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("BACKUP") {
            decode.backup = v.eq_ignore_ascii_case("yes");
        }
        config
    }
}
