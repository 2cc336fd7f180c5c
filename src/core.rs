use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::RepographError;
use crate::resource::Origin;
use crate::utils::{has_path_prefix, join_path, strip_path_prefix};

/// Process-wide build layout shared by every node.
///
/// All directories are relative to `root_dir`, which is the directory the
/// downstream executor runs in. Paths produced by the graph are relative to it
/// as well.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Environment {
    /// Directory the build is rooted at.
    pub root_dir: String,
    /// Mirror of the source tree for generated sources (e.g. unpacked third-party code).
    pub source_dir: String,
    /// Generated files.
    pub genfile_dir: String,
    /// Object files.
    pub object_dir: String,
    /// Packaged outputs.
    pub pkgfile_dir: String,
    /// Name of the file declaring targets in each directory.
    pub build_file_name: String,
    /// Default for targets that don't set `strict_file_mode` themselves.
    pub strict_file_mode: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            root_dir: ".".into(),
            source_dir: ".gen-src".into(),
            genfile_dir: ".gen-files".into(),
            object_dir: ".gen-obj".into(),
            pkgfile_dir: ".gen-pkg".into(),
            build_file_name: crate::target::DEFAULT_BUILD_FILE.into(),
            strict_file_mode: true,
        }
    }
}

impl Environment {
    /// Reads a layout; missing keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, RepographError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Tags a root-relative path with the area it lives in.
    pub fn classify(&self, path: &str) -> Origin {
        if path.starts_with('/') {
            Origin::Absolute
        } else if has_path_prefix(path, &self.genfile_dir) {
            Origin::Generated
        } else if has_path_prefix(path, &self.object_dir) {
            Origin::Object
        } else {
            Origin::Source
        }
    }

    /// Removes a leading generated, source or object root from `path`.
    pub fn strip_special_dirs(&self, path: &str) -> String {
        for dir in [&self.genfile_dir, &self.source_dir, &self.object_dir] {
            if dir.is_empty() {
                continue;
            }
            if let Some(stripped) = strip_path_prefix(path, dir) {
                return stripped.into_string();
            }
        }
        path.to_string()
    }

    /// The roots whose paths are written verbatim in build files rather than
    /// joined to the declaring directory.
    pub(crate) fn absolute_prefixes(&self) -> [&str; 3] {
        [&self.genfile_dir, &self.source_dir, &self.object_dir]
    }

    pub(crate) fn build_file_in(&self, dir: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(join_path(dir, &self.build_file_name))
    }
}
