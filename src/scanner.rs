use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern, glob_with};

use crate::error::FileError;

/// Expands a file pattern into the files that currently exist.
///
/// Implementations must be deterministic: the same pattern always yields the
/// same list in the same order. An empty list means nothing matched.
pub trait FileScanner {
    fn initialize_for_file(&self, pattern: &str) -> Result<Vec<Utf8PathBuf>, FileError>;
}

const OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Scans the real file system below `root`.
///
/// Relative patterns are resolved against `root` and matches are reported
/// relative to it, so they can be used as root-relative build paths.
#[derive(Debug, Clone)]
pub struct GlobScanner {
    root: Utf8PathBuf,
}

impl GlobScanner {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl FileScanner for GlobScanner {
    fn initialize_for_file(&self, pattern: &str) -> Result<Vec<Utf8PathBuf>, FileError> {
        let absolute = pattern.starts_with('/');
        let full = if absolute {
            Utf8PathBuf::from(pattern)
        } else {
            self.root.join(pattern)
        };

        let mut paths = Vec::new();
        for path in glob_with(full.as_str(), OPTIONS)? {
            let path = Utf8PathBuf::try_from(path?)?;
            let path = match path.strip_prefix(&self.root) {
                Ok(relative) if !absolute => relative.to_path_buf(),
                _ => path,
            };
            paths.push(path);
        }

        paths.sort();
        tracing::trace!(pattern, matches = paths.len(), "scanned");
        Ok(paths)
    }
}

/// A fixed set of known paths, matched without touching the disk.
///
/// Inserting a file also makes its ancestor directories known, the same way a
/// directory listing would.
#[derive(Debug, Clone, Default)]
pub struct MemoryScanner {
    paths: BTreeSet<Utf8PathBuf>,
}

impl MemoryScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Utf8Path>) {
        let path = path.as_ref();
        for ancestor in path.ancestors() {
            if ancestor.as_str().is_empty() {
                break;
            }
            self.paths.insert(ancestor.to_path_buf());
        }
    }

    pub fn with<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Utf8Path>,
    {
        let mut scanner = Self::new();
        for path in paths {
            scanner.insert(path);
        }
        scanner
    }
}

impl FileScanner for MemoryScanner {
    fn initialize_for_file(&self, pattern: &str) -> Result<Vec<Utf8PathBuf>, FileError> {
        let matcher = Pattern::new(pattern)?;
        Ok(self
            .paths
            .iter()
            .filter(|path| matcher.matches_with(path.as_str(), OPTIONS))
            .cloned()
            .collect())
    }
}
