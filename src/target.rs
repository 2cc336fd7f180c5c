use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use camino::{Utf8Path, Utf8PathBuf};

use crate::utils::{join_path, normalize};

pub(crate) const DEFAULT_BUILD_FILE: &str = "BUILD";

/// Identity of a single target, e.g. `//common/log:log`.
///
/// Every field is derived from the full path by plain string arithmetic, so two
/// values built from equivalent inputs compare equal. Identity is the full
/// path alone.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    full_path: String,
    build_file: Utf8PathBuf,
    dir: String,
    local_path: String,
}

impl TargetInfo {
    /// Parses `//dir:name`. The leading `//` is optional, and `//dir` alone
    /// names the target `//dir:<last component of dir>`.
    pub fn new(full_path: &str) -> Self {
        let path = full_path.trim_start_matches("//");
        let (dir, local) = match path.rsplit_once(':') {
            Some((dir, local)) => (normalize(dir), local.to_string()),
            None => {
                let dir = normalize(path);
                let local = Utf8Path::new(&dir).file_name().unwrap_or("").to_string();
                (dir, local)
            }
        };

        Self::from_parts(dir, local, DEFAULT_BUILD_FILE)
    }

    /// Resolves a dependency string as written inside `build_file`.
    ///
    /// * `//dir:name` is absolute,
    /// * `:name` and a bare `name` are siblings in the same directory,
    /// * anything else is a path relative to the build file's directory.
    ///
    /// The result's build file carries the same file name as `build_file`.
    pub fn from_relative(relative_path: &str, build_file: impl AsRef<Utf8Path>) -> Self {
        let build_file = build_file.as_ref();
        let file_name = build_file.file_name().unwrap_or(DEFAULT_BUILD_FILE);

        let target = if relative_path.starts_with("//") {
            Self::new(relative_path)
        } else {
            let base = build_file.parent().map(Utf8Path::as_str).unwrap_or_default();
            if let Some(local) = relative_path.strip_prefix(':') {
                Self::from_parts(normalize(base), local.to_string(), file_name)
            } else if !relative_path.contains(['/', ':']) {
                Self::from_parts(normalize(base), relative_path.to_string(), file_name)
            } else {
                Self::new(&join_path(base, relative_path))
            }
        };

        target.with_build_file_name(file_name)
    }

    fn from_parts(dir: String, local_path: String, file_name: &str) -> Self {
        Self {
            full_path: format!("//{dir}:{local_path}"),
            build_file: Utf8PathBuf::from(join_path(&dir, file_name)),
            dir,
            local_path,
        }
    }

    /// The same target, declared in a build file called `file_name`.
    pub fn with_build_file_name(mut self, file_name: &str) -> Self {
        self.build_file = Utf8PathBuf::from(join_path(&self.dir, file_name));
        self
    }

    fn build_file_name(&self) -> &str {
        self.build_file.file_name().unwrap_or(DEFAULT_BUILD_FILE)
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn build_file(&self) -> &Utf8Path {
        &self.build_file
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn local_path(&self) -> &str {
        &self.local_path
    }

    /// Same directory and build file, different local name.
    pub fn parallel_target(&self, local_path: &str) -> Self {
        Self::from_parts(self.dir.clone(), local_path.to_string(), self.build_file_name())
    }

    /// Same local name and build file name, moved to `dir`.
    pub fn relocated(&self, dir: &str) -> Self {
        Self::from_parts(normalize(dir), self.local_path.clone(), self.build_file_name())
    }

    /// Slash form usable inside make variable and rule names.
    pub fn make_path(&self) -> String {
        join_path(&self.dir, &self.local_path)
    }
}

impl PartialEq for TargetInfo {
    fn eq(&self, other: &Self) -> bool {
        self.full_path == other.full_path
    }
}

impl Eq for TargetInfo {}

impl Hash for TargetInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full_path.hash(state);
    }
}

impl PartialOrd for TargetInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TargetInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.full_path.cmp(&other.full_path)
    }
}

impl fmt::Display for TargetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_path() {
        let t = TargetInfo::new("//common/log:log");
        assert_eq!(t.full_path(), "//common/log:log");
        assert_eq!(t.dir(), "common/log");
        assert_eq!(t.local_path(), "log");
        assert_eq!(t.build_file().as_str(), "common/log/BUILD");
        assert_eq!(t.make_path(), "common/log/log");
    }

    #[test]
    fn test_implicit_name() {
        assert_eq!(TargetInfo::new("//common/log"), TargetInfo::new("//common/log:log"));
    }

    #[test]
    fn test_top_level() {
        let t = TargetInfo::new("//:all");
        assert_eq!(t.dir(), "");
        assert_eq!(t.full_path(), "//:all");
        assert_eq!(t.build_file().as_str(), "BUILD");
        assert_eq!(t.make_path(), "all");
    }

    #[test]
    fn test_relative_forms_agree() {
        let file = "common/strings/BUILD";
        let expected = TargetInfo::new("//common/strings:strutil");

        assert_eq!(TargetInfo::from_relative(":strutil", file), expected);
        assert_eq!(TargetInfo::from_relative("strutil", file), expected);
        assert_eq!(TargetInfo::from_relative("//common/strings:strutil", file), expected);
        assert_eq!(TargetInfo::from_relative("../strings:strutil", file), expected);
    }

    #[test]
    fn test_relative_subdir() {
        let t = TargetInfo::from_relative("sub/dir", "a/BUILD");
        assert_eq!(t.full_path(), "//a/sub/dir:dir");

        let t = TargetInfo::from_relative("sub:x", "a/BUILD");
        assert_eq!(t.full_path(), "//a/sub:x");
    }

    #[test]
    fn test_parallel_target() {
        let t = TargetInfo::new("//a/b:bin");
        let p = t.parallel_target("bin.0");
        assert_eq!(p.full_path(), "//a/b:bin.0");
        assert_eq!(p.dir(), t.dir());
        assert_eq!(p.build_file(), t.build_file());
    }

    #[test]
    fn test_build_file_name_follows_declaring_file() {
        let file = "a/BUILD.json";

        let local = TargetInfo::from_relative(":x", file);
        assert_eq!(local.build_file().as_str(), "a/BUILD.json");

        let absolute = TargetInfo::from_relative("//b:y", file);
        assert_eq!(absolute.build_file().as_str(), "b/BUILD.json");

        let relative = TargetInfo::from_relative("sub:z", file);
        assert_eq!(relative.build_file().as_str(), "a/sub/BUILD.json");

        let parallel = local.parallel_target("x.0");
        assert_eq!(parallel.build_file().as_str(), "a/BUILD.json");
        assert_eq!(local.relocated("c/d").build_file().as_str(), "c/d/BUILD.json");

        // The build file does not take part in identity.
        assert_eq!(local, TargetInfo::new("//a:x"));
    }
}
