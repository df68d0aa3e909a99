//! Source file discovery
//!
//! Files are matched by extension and grouped in the order the extensions are
//! listed, then by path within a group. Excluded directories are relative to
//! the root and are pruned from the walk.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension filter plus excluded directories
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    extensions: Vec<String>,
    exclude_dirs: Vec<PathBuf>,
}

impl Discovery {
    pub fn new<E, S, X, P>(extensions: E, exclude_dirs: X) -> Self
    where
        E: IntoIterator<Item = S>,
        S: AsRef<str>,
        X: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.');
            if !ext.is_empty() && !normalized.iter().any(|e| e == ext) {
                normalized.push(ext.to_string());
            }
        }

        Self {
            extensions: normalized,
            exclude_dirs: exclude_dirs.into_iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Walk `root` and return matching files
    pub fn discover(&self, root: &Path) -> Vec<PathBuf> {
        let excluded: Vec<PathBuf> = self.exclude_dirs.iter().map(|d| root.join(d)).collect();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let skip = entry.depth() > 0
                    && entry.file_type().is_dir()
                    && excluded.iter().any(|d| entry.path() == d);
                if skip {
                    debug!(path = %entry.path().display(), "excluded");
                }
                !skip
            });

        let mut groups: Vec<Vec<PathBuf>> = vec![Vec::new(); self.extensions.len()];
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "cannot walk entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) else {
                continue;
            };
            if let Some(index) = self.extensions.iter().position(|e| e == ext) {
                groups[index].push(entry.into_path());
            }
        }

        groups.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, name: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, name).unwrap();
    }

    fn relative(root: &Path, paths: Vec<PathBuf>) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_discover_groups_by_extension_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let names = ["app.json", "app.js", "pages/index/index.wxml", "pages/index/index.js"];
        for name in names.into_iter().chain(["README.md"]) {
            touch(root, name);
        }

        let discovery = Discovery::new(["wxml", "js", "json"], Vec::<PathBuf>::new());
        let found = relative(root, discovery.discover(root));

        assert_eq!(
            found,
            vec!["pages/index/index.wxml", "app.js", "pages/index/index.js", "app.json"]
        );
    }

    #[test]
    fn test_discover_prunes_excluded_dirs() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for name in ["index.js", "node_modules/lib/a.js", "dist/b.js", "src/node_modules/c.js"] {
            touch(root, name);
        }

        let discovery = Discovery::new(["js"], ["node_modules", "dist"]);
        let found = relative(root, discovery.discover(root));

        // Exclusions are relative to the root, not matched by name anywhere
        assert_eq!(found, vec!["index.js", "src/node_modules/c.js"]);
    }

    #[test]
    fn test_discover_nested_exclusion() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "a/b/skip.js");
        touch(root, "a/keep.js");

        let discovery = Discovery::new(["js"], ["a/b"]);
        assert_eq!(relative(root, discovery.discover(root)), vec!["a/keep.js"]);
    }

    #[test]
    fn test_extensions_are_normalized() {
        let discovery = Discovery::new([".js", "js", " wxss ", ""], Vec::<PathBuf>::new());
        assert_eq!(discovery.extensions(), &["js".to_string(), "wxss".to_string()]);
    }

    #[test]
    fn test_directories_with_matching_names_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("weird.js")).unwrap();
        touch(root, "weird.js/inner.json");

        let discovery = Discovery::new(["js", "json"], Vec::<PathBuf>::new());
        assert_eq!(relative(root, discovery.discover(root)), vec!["weird.js/inner.json"]);
    }
}
