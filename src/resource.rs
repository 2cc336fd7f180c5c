use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;

use crate::utils::join_path;

/// Which root a [`Resource`] path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Source,
    Generated,
    Object,
    Absolute,
}

/// A file known to the build, addressed relative to the build root.
///
/// Two resources are the same file when their paths match, whatever their
/// origin tags say.
#[derive(Debug, Clone)]
pub struct Resource {
    path: Utf8PathBuf,
    origin: Origin,
}

impl Resource {
    pub fn from_root_path(path: impl Into<Utf8PathBuf>, origin: Origin) -> Self {
        Self {
            path: path.into(),
            origin,
        }
    }

    pub fn from_local_path(dir: &str, file: &str, origin: Origin) -> Self {
        Self::from_root_path(join_path(dir, file), origin)
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn basename(&self) -> &str {
        self.path.file_name().unwrap_or("")
    }

    pub fn dirname(&self) -> &Utf8Path {
        self.path.parent().unwrap_or(Utf8Path::new(""))
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Resource {}

impl Hash for Resource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl PartialOrd for Resource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Resource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.path.cmp(&other.path)
    }
}

/// Insertion-ordered, duplicate-free list of resources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFileSet {
    files: IndexSet<Resource>,
}

impl ResourceFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if a resource with the same path was already present.
    pub fn add(&mut self, resource: Resource) -> bool {
        self.files.insert(resource)
    }

    pub fn contains(&self, path: impl AsRef<Utf8Path>) -> bool {
        self.files.iter().any(|file| file.path == path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.files.iter()
    }

    pub fn files(&self) -> &IndexSet<Resource> {
        &self.files
    }

    pub fn paths(&self) -> Vec<&str> {
        self.files.iter().map(|file| file.path.as_str()).collect()
    }
}

impl Extend<Resource> for ResourceFileSet {
    fn extend<T: IntoIterator<Item = Resource>>(&mut self, iter: T) {
        self.files.extend(iter);
    }
}

impl FromIterator<Resource> for ResourceFileSet {
    fn from_iter<T: IntoIterator<Item = Resource>>(iter: T) -> Self {
        Self {
            files: IndexSet::from_iter(iter),
        }
    }
}

impl<'a> IntoIterator for &'a ResourceFileSet {
    type Item = &'a Resource;
    type IntoIter = indexmap::set::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_keeps_first_insertion() {
        let mut set = ResourceFileSet::new();
        assert!(set.add(Resource::from_root_path("b.o", Origin::Object)));
        assert!(set.add(Resource::from_root_path("a.o", Origin::Object)));
        assert!(!set.add(Resource::from_root_path("b.o", Origin::Generated)));

        assert_eq!(set.paths(), vec!["b.o", "a.o"]);
        assert_eq!(set.iter().next().unwrap().origin(), Origin::Object);
    }

    #[test]
    fn test_local_path() {
        let res = Resource::from_local_path(".gen-obj/a", "x.o", Origin::Object);
        assert_eq!(res.path().as_str(), ".gen-obj/a/x.o");
        assert_eq!(res.basename(), "x.o");
        assert_eq!(res.dirname().as_str(), ".gen-obj/a");
    }
}
