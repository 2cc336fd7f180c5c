//! Build files: ordered lists of raw target records.
//!
//! A build file is JSON of the following shape:
//!
//! ```json
//! [
//!   { "cc_library": { "name": "strutil", "cc_sources": ["strutil.cc"] } },
//!   { "cc_binary":  { "name": "tool", "dependencies": [":strutil"] } }
//! ]
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde_json::{Map, Value};

use crate::error::BuildFileError;
use crate::rewrite::DependencyRewriter;
use crate::target::TargetInfo;

/// One raw record of a build file, `{ "<kind>": { ...fields } }`.
#[derive(Debug, Clone)]
pub struct BuildFileNode {
    object: Map<String, Value>,
}

impl BuildFileNode {
    pub fn new(object: Map<String, Value>) -> Self {
        Self { object }
    }

    pub fn object(&self) -> &Map<String, Value> {
        &self.object
    }

    /// The kind name and its field object.
    pub(crate) fn kind(
        &self,
        file: &Utf8Path,
    ) -> Result<(&str, &Map<String, Value>), BuildFileError> {
        let mut iter = self.object.iter();
        match (iter.next(), iter.next()) {
            (Some((kind, Value::Object(fields))), None) => Ok((kind.as_str(), fields)),
            _ => Err(BuildFileError::AmbiguousKind {
                file: file.to_path_buf(),
                found: Value::Object(self.object.clone()).to_string(),
            }),
        }
    }
}

/// A parsed build file together with the state nodes in it share.
pub struct BuildFile {
    filename: Utf8PathBuf,
    nodes: Vec<BuildFileNode>,
    name_counter: HashMap<String, usize>,
    base_deps: BTreeSet<String>,
    registered_keys: HashMap<String, String>,
    rewriters: Vec<Arc<dyn DependencyRewriter>>,
}

impl BuildFile {
    pub fn new(filename: impl Into<Utf8PathBuf>) -> Self {
        Self {
            filename: filename.into(),
            nodes: Vec::new(),
            name_counter: HashMap::new(),
            base_deps: BTreeSet::new(),
            registered_keys: HashMap::new(),
            rewriters: Vec::new(),
        }
    }

    pub fn filename(&self) -> &Utf8Path {
        &self.filename
    }

    /// Appends every record of `input`, in document order.
    pub fn parse(&mut self, input: &str) -> Result<(), BuildFileError> {
        let root: Value = serde_json::from_str(input).map_err(|source| BuildFileError::Syntax {
            file: self.filename.clone(),
            source,
        })?;

        let Value::Array(items) = root else {
            return Err(BuildFileError::NotAList {
                file: self.filename.clone(),
                found: root.to_string(),
            });
        };

        for item in items {
            match item {
                Value::Object(object) => self.nodes.push(BuildFileNode::new(object)),
                other => {
                    return Err(BuildFileError::NotARecord {
                        file: self.filename.clone(),
                        found: other.to_string(),
                    });
                }
            }
        }

        tracing::debug!(file = %self.filename, nodes = self.nodes.len(), "parsed build file");
        Ok(())
    }

    pub fn nodes(&self) -> &[BuildFileNode] {
        &self.nodes
    }

    /// `base.0`, `base.1`, ... on consecutive calls with the same base.
    pub fn next_name(&mut self, base: &str) -> String {
        let counter = self.name_counter.entry(base.to_string()).or_default();
        let name = format!("{base}.{counter}");
        *counter += 1;
        name
    }

    /// Resolves a dependency string as written in this file.
    ///
    /// Rewriters are offered the target newest first; the first one to claim
    /// it wins.
    pub fn compute_target_info(&self, dependency: &str) -> TargetInfo {
        let mut target = TargetInfo::from_relative(dependency, &self.filename);
        tracing::trace!(
            dependency,
            file = %self.filename,
            rewriters = self.rewriters.len(),
            "computing target info"
        );

        for rewriter in self.rewriters.iter().rev() {
            if rewriter.rewrite_dependency(&mut target) {
                break;
            }
        }

        target
    }

    /// Inherits base dependencies and the rewriter chain of an enclosing file.
    pub fn merge_parent(&mut self, parent: &BuildFile) {
        self.base_deps.extend(parent.base_deps.iter().cloned());
        self.rewriters.extend(parent.rewriters.iter().cloned());
    }

    /// Imports registered keys from a file this one depends on. Keys already
    /// present are kept.
    pub fn merge_dependency(&mut self, dependency: &BuildFile) {
        for (key, value) in &dependency.registered_keys {
            self.registered_keys
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    pub fn add_rewriter(&mut self, rewriter: Arc<dyn DependencyRewriter>) {
        self.rewriters.push(rewriter);
    }

    pub fn add_base_dependency(&mut self, dependency: impl Into<String>) {
        self.base_deps.insert(dependency.into());
    }

    pub fn base_dependencies(&self) -> &BTreeSet<String> {
        &self.base_deps
    }

    pub fn register_key(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.registered_keys.insert(key.into(), value.into());
    }

    pub fn get_key(&self, key: &str) -> Option<&str> {
        self.registered_keys.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for BuildFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildFile")
            .field("filename", &self.filename)
            .field("nodes", &self.nodes.len())
            .field("base_deps", &self.base_deps)
            .field("rewriters", &self.rewriters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::PrefixRewriter;

    #[test]
    fn test_parse_keeps_order() {
        let mut file = BuildFile::new("a/BUILD");
        file.parse(r#"[ { "cc_library": { "name": "x" } }, { "gen_sh": { "name": "y" } } ]"#)
            .unwrap();

        let kinds: Vec<_> = file
            .nodes()
            .iter()
            .map(|node| node.kind(file.filename()).unwrap().0)
            .collect();
        assert_eq!(kinds, vec!["cc_library", "gen_sh"]);
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        let mut file = BuildFile::new("a/BUILD");
        assert!(matches!(
            file.parse(r#"{ "cc_library": {} }"#),
            Err(BuildFileError::NotAList { .. })
        ));
        assert!(matches!(
            file.parse(r#"[ "cc_library" ]"#),
            Err(BuildFileError::NotARecord { .. })
        ));
        assert!(matches!(
            file.parse(r#"[ { "cc_library": { "name": "x" }, ]"#),
            Err(BuildFileError::Syntax { .. })
        ));
    }

    #[test]
    fn test_record_needs_one_kind() {
        let mut file = BuildFile::new("a/BUILD");
        file.parse(r#"[ { "a": {}, "b": {} } ]"#).unwrap();
        assert!(file.nodes()[0].kind(file.filename()).is_err());
    }

    #[test]
    fn test_next_name() {
        let mut file = BuildFile::new("a/BUILD");
        let names: Vec<_> = (0..4).map(|_| file.next_name("bin")).collect();
        assert_eq!(names, vec!["bin.0", "bin.1", "bin.2", "bin.3"]);
        assert_eq!(file.next_name("other"), "other.0");
        assert_eq!(file.next_name("bin"), "bin.4");
    }

    #[test]
    fn test_compute_target_info_newest_rewriter_wins() {
        let mut file = BuildFile::new("app/BUILD");
        file.add_rewriter(Arc::new(PrefixRewriter::new("ext", "old/ext")));
        file.add_rewriter(Arc::new(PrefixRewriter::new("ext", "new/ext")));

        assert_eq!(file.compute_target_info("//ext/zlib:z").full_path(), "//new/ext/zlib:z");
        assert_eq!(file.compute_target_info(":local").full_path(), "//app:local");
    }

    #[test]
    fn test_merge_parent_accumulates() {
        let mut root = BuildFile::new("BUILD");
        root.add_base_dependency("//base:base");
        root.add_rewriter(Arc::new(PrefixRewriter::new("ext", "third_party")));

        let mut child = BuildFile::new("a/BUILD");
        child.add_rewriter(Arc::new(PrefixRewriter::new("ext", "a/vendored")));
        child.merge_parent(&root);

        assert!(child.base_dependencies().contains("//base:base"));
        // The parent's rewriter is appended, so it is now the newest.
        assert_eq!(child.compute_target_info("//ext:z").full_path(), "//third_party:z");
    }

    #[test]
    fn test_merge_dependency_first_write_wins() {
        let mut file = BuildFile::new("a/BUILD");
        file.register_key("proto_version", "3");
        file.add_rewriter(Arc::new(PrefixRewriter::new("x", "y")));

        let mut dep = BuildFile::new("b/BUILD");
        dep.register_key("proto_version", "2");
        dep.register_key("go_root", "go");
        dep.add_base_dependency("//c:c");

        file.merge_dependency(&dep);
        assert_eq!(file.get_key("proto_version"), Some("3"));
        assert_eq!(file.get_key("go_root"), Some("go"));
        assert_eq!(file.get_key("missing"), None);
        assert!(file.base_dependencies().is_empty());
    }
}
