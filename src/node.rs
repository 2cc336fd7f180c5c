//! The in-memory form of a parsed target.
//!
//! A [`Node`] pairs the state every target has ([`NodeInfo`]) with a
//! [`NodeKind`], the capability set of one target kind such as `cc_library`.
//! Kinds decide what a node contributes to each [`Category`] and which edges
//! the collection engine follows; the engine itself lives in
//! [`crate::graph`].

mod variable;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use indexmap::IndexSet;
use petgraph::graph::NodeIndex;
use serde_json::{Map, Value};

use crate::buildfile::BuildFile;
use crate::category::{Category, Language};
use crate::component::ComponentHelper;
use crate::core::Environment;
use crate::error::NodeError;
use crate::reader::BuildFileNodeReader;
use crate::resource::{Origin, Resource, ResourceFileSet};
use crate::scanner::FileScanner;
use crate::target::TargetInfo;
use crate::utils::{join_path, num_path_components};

pub use variable::{MakeVariable, escape};

/// Everything a kind may touch while parsing one record.
pub struct ParseContext<'a> {
    /// The file the record comes from.
    pub file: &'a mut BuildFile,
    pub scanner: &'a dyn FileScanner,
}

/// Capabilities of one target kind.
///
/// Every method has a default, so a kind only overrides what it contributes.
/// `node` is the shared state of the node the kind belongs to.
#[allow(unused_variables)]
pub trait NodeKind: Send + Sync {
    /// The kind name used in build files.
    fn name(&self) -> &'static str;

    /// Reads kind specific fields. Common fields are already parsed.
    fn parse(
        &mut self,
        node: &mut NodeInfo,
        ctx: &mut ParseContext<'_>,
        reader: &BuildFileNodeReader<'_>,
    ) -> Result<(), NodeError> {
        Ok(())
    }

    /// Whether the edge to `child` is followed for `category`.
    fn include_child_dependency(&self, category: Category, lang: Language, child: &Node) -> bool {
        true
    }

    /// Whether this node takes part in `category` at all.
    fn should_include(&self, category: Category, lang: Language) -> bool {
        true
    }

    /// `false` makes this node a barrier: it appears in the closure but its
    /// own dependencies don't.
    fn include_dependencies(&self, category: Category, lang: Language) -> bool {
        true
    }

    /// Import path rewrite this node applies to its directory subtree.
    fn path_rewrite(&self, node: &NodeInfo) -> Option<ComponentHelper> {
        None
    }

    fn local_env_variables(
        &self,
        node: &NodeInfo,
        lang: Language,
        env: &mut BTreeMap<String, String>,
    ) {
    }
    fn local_dependency_files(
        &self,
        node: &NodeInfo,
        lang: Language,
        files: &mut ResourceFileSet,
    ) {
    }
    fn local_object_files(&self, node: &NodeInfo, lang: Language, files: &mut ResourceFileSet) {}
    fn local_object_roots(&self, node: &NodeInfo, lang: Language, dirs: &mut ResourceFileSet) {}
    fn local_system_dependencies(
        &self,
        node: &NodeInfo,
        lang: Language,
        deps: &mut IndexSet<String>,
    ) {
    }
    fn local_final_outputs(&self, node: &NodeInfo, lang: Language, outputs: &mut ResourceFileSet) {}
    fn local_binaries(&self, node: &NodeInfo, lang: Language, outputs: &mut ResourceFileSet) {}
    fn local_tests(&self, node: &NodeInfo, lang: Language, targets: &mut IndexSet<String>) {}
    fn local_link_flags(&self, node: &NodeInfo, lang: Language, flags: &mut IndexSet<String>) {}
    fn local_compile_flags(&self, node: &NodeInfo, lang: Language, flags: &mut IndexSet<String>) {}
    fn local_include_dirs(&self, node: &NodeInfo, lang: Language, dirs: &mut IndexSet<String>) {}
}

/// State shared by every kind of node.
pub struct NodeInfo {
    target: TargetInfo,
    environment: Arc<Environment>,

    gen_dir: String,
    src_dir: String,
    obj_dir: String,
    package_dir: String,
    relative_root_dir: String,
    relative_gen_dir: String,
    relative_src_dir: String,
    relative_obj_dir: String,

    dep_targets: Vec<TargetInfo>,
    pub(crate) dependencies: Vec<NodeIndex>,
    pre_parse: Vec<TargetInfo>,
    required_parents: Vec<TargetInfo>,
    subnodes: Vec<Node>,

    env_variables: BTreeMap<String, String>,
    licenses: BTreeSet<String>,
    make_variables: BTreeMap<String, MakeVariable>,
    pub(crate) component_helpers: Vec<ComponentHelper>,
    strict_file_mode: bool,
}

impl NodeInfo {
    pub fn new(target: TargetInfo, environment: Arc<Environment>) -> Self {
        let dir = target.dir();
        let relative_root_dir = "../".repeat(num_path_components(dir));
        let rooted = |base: &str| join_path(&relative_root_dir, &join_path(base, dir));

        Self {
            gen_dir: join_path(&environment.genfile_dir, dir),
            src_dir: join_path(&environment.source_dir, dir),
            obj_dir: join_path(&environment.object_dir, dir),
            package_dir: join_path(&environment.pkgfile_dir, dir),
            relative_gen_dir: rooted(&environment.genfile_dir),
            relative_src_dir: rooted(&environment.source_dir),
            relative_obj_dir: rooted(&environment.object_dir),
            relative_root_dir,
            strict_file_mode: environment.strict_file_mode,
            target,
            environment,
            dep_targets: Vec::new(),
            dependencies: Vec::new(),
            pre_parse: Vec::new(),
            required_parents: Vec::new(),
            subnodes: Vec::new(),
            env_variables: BTreeMap::new(),
            licenses: BTreeSet::new(),
            make_variables: BTreeMap::new(),
            component_helpers: Vec::new(),
        }
    }

    pub fn target(&self) -> &TargetInfo {
        &self.target
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn shared_environment(&self) -> Arc<Environment> {
        Arc::clone(&self.environment)
    }

    pub fn gen_dir(&self) -> &str {
        &self.gen_dir
    }

    pub fn src_dir(&self) -> &str {
        &self.src_dir
    }

    pub fn obj_dir(&self) -> &str {
        &self.obj_dir
    }

    pub fn package_dir(&self) -> &str {
        &self.package_dir
    }

    /// `../` repeated once per component of the target directory.
    pub fn relative_root_dir(&self) -> &str {
        &self.relative_root_dir
    }

    pub fn relative_gen_dir(&self) -> &str {
        &self.relative_gen_dir
    }

    pub fn relative_src_dir(&self) -> &str {
        &self.relative_src_dir
    }

    pub fn relative_obj_dir(&self) -> &str {
        &self.relative_obj_dir
    }

    pub fn strict_file_mode(&self) -> bool {
        self.strict_file_mode
    }

    /// Declared dependencies, unresolved.
    pub fn dep_targets(&self) -> &[TargetInfo] {
        &self.dep_targets
    }

    /// Declared dependencies as graph indices; empty until the graph is
    /// finished.
    pub fn dependencies(&self) -> &[NodeIndex] {
        &self.dependencies
    }

    pub fn env_variables(&self) -> &BTreeMap<String, String> {
        &self.env_variables
    }

    pub fn licenses(&self) -> &BTreeSet<String> {
        &self.licenses
    }

    pub fn add_dependency_target(&mut self, target: TargetInfo) {
        self.dep_targets.push(target);
    }

    pub fn add_pre_parse(&mut self, target: TargetInfo) {
        self.pre_parse.push(target);
    }

    /// Targets that must be parsed before this one.
    pub fn pre_parse(&self) -> &[TargetInfo] {
        &self.pre_parse
    }

    pub fn add_required_parent(&mut self, parent: TargetInfo) {
        self.required_parents.push(parent);
    }

    /// Targets that synthesized this node.
    pub fn required_parents(&self) -> &[TargetInfo] {
        &self.required_parents
    }

    pub fn copy_dependencies(&mut self, other: &NodeInfo) {
        self.dep_targets.extend(other.dep_targets.iter().cloned());
        self.dependencies.extend(other.dependencies.iter().copied());
    }

    /// A fresh sibling target name, e.g. `//a:bin.0` for `//a:bin`.
    pub fn next_target_name(&self, file: &mut BuildFile) -> TargetInfo {
        self.target
            .parallel_target(&file.next_name(self.target.local_path()))
    }

    /// Takes ownership of a synthesized child and depends on it.
    pub fn add_subnode(&mut self, mut node: Node) {
        self.add_dependency_target(node.target().clone());
        node.info.add_required_parent(self.target.clone());
        self.subnodes.push(node);
    }

    pub fn subnodes(&self) -> &[Node] {
        &self.subnodes
    }

    /// Hands every synthesized descendant over to the caller, parents before
    /// their own children.
    pub fn extract_subnodes(&mut self) -> Vec<Node> {
        let mut nodes = Vec::new();
        for mut node in std::mem::take(&mut self.subnodes) {
            let nested = node.info.extract_subnodes();
            nodes.push(node);
            nodes.extend(nested);
        }
        nodes
    }

    /// Stamp file marking that a step of this node has run.
    pub fn touchfile(&self, suffix: &str) -> Resource {
        Resource::from_local_path(
            &self.obj_dir,
            &format!(".{}{}.dummy", self.target.local_path(), suffix),
            Origin::Object,
        )
    }

    pub fn strip_special_dirs(&self, path: &str) -> String {
        self.environment.strip_special_dirs(path)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.make_variables.contains_key(name)
    }

    pub fn variable(&self, name: &str) -> Option<&MakeVariable> {
        self.make_variables.get(name)
    }

    pub fn variables(&self) -> impl Iterator<Item = &MakeVariable> {
        self.make_variables.values()
    }

    /// The variable `name`, created on first use as `name.<make path>`.
    pub fn mutable_variable(&mut self, name: &str) -> &mut MakeVariable {
        let make_path = self.target.make_path();
        self.make_variables
            .entry(name.to_string())
            .or_insert_with(|| MakeVariable::new(format!("{name}.{make_path}")))
    }

    /// Sets `var_name` to `true_value` when `condition_name` is `1` and to
    /// `false_value` otherwise. Equal values collapse to a plain assignment,
    /// and an empty plain value creates nothing.
    pub fn add_conditional_variable(
        &mut self,
        var_name: &str,
        condition_name: &str,
        true_value: &str,
        false_value: &str,
    ) {
        if true_value == false_value {
            if !true_value.is_empty() {
                self.mutable_variable(var_name).set_value(escape(true_value));
            }
        } else {
            self.mutable_variable(var_name).set_condition(
                condition_name,
                escape(true_value),
                escape(false_value),
            );
        }
    }

    pub fn component_helpers(&self) -> &[ComponentHelper] {
        &self.component_helpers
    }

    /// The most specific helper covering `path`.
    pub fn component_helper(&self, path: &str) -> Option<&ComponentHelper> {
        self.component_helpers
            .iter()
            .find(|helper| helper.covers_path(&self.environment, path))
    }

    pub fn component_helper_preferring<'a>(
        &'a self,
        preferred: Option<&'a ComponentHelper>,
        path: &str,
    ) -> Option<&'a ComponentHelper> {
        match preferred {
            Some(helper) if helper.covers_path(&self.environment, path) => Some(helper),
            _ => self.component_helper(path),
        }
    }

    /// A reader for `fields` with this node's directory variables and roots
    /// registered.
    pub fn new_build_reader<'r>(
        &self,
        fields: &'r Map<String, Value>,
        scanner: &'r dyn FileScanner,
        environment: &'r Environment,
    ) -> BuildFileNodeReader<'r> {
        let join_root = |path: &str| join_path("$(ROOT_DIR)", path);

        let mut reader = BuildFileNodeReader::new(fields, scanner);
        reader.set_replace_variable(false, "GEN_DIR", &self.gen_dir);
        reader.set_replace_variable(true, "GEN_DIR", &join_root(&self.gen_dir));
        reader.set_replace_variable(false, "OBJ_DIR", &self.obj_dir);
        reader.set_replace_variable(true, "OBJ_DIR", &join_root(&self.obj_dir));
        reader.set_replace_variable(false, "SRC_DIR", self.target.dir());
        reader.set_replace_variable(true, "SRC_DIR", ".");
        reader.set_replace_variable(false, "GEN_SRC_DIR", &self.src_dir);
        reader.set_replace_variable(true, "GEN_SRC_DIR", &join_root(&self.src_dir));
        for prefix in environment.absolute_prefixes() {
            reader.add_file_abs_prefix(prefix);
        }
        reader.set_environment(environment);
        reader.set_strict_file_mode(self.strict_file_mode);
        reader.set_error_path(self.target.full_path());
        reader.set_file_path(self.target.dir());
        reader
    }
}

/// A target of some kind.
pub struct Node {
    info: NodeInfo,
    kind: Box<dyn NodeKind>,
}

impl Node {
    pub fn new(target: TargetInfo, environment: Arc<Environment>, kind: Box<dyn NodeKind>) -> Self {
        Self {
            info: NodeInfo::new(target, environment),
            kind,
        }
    }

    pub fn target(&self) -> &TargetInfo {
        self.info.target()
    }

    pub fn info(&self) -> &NodeInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut NodeInfo {
        &mut self.info
    }

    pub fn kind(&self) -> &dyn NodeKind {
        self.kind.as_ref()
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Reads the fields every node understands, then hands over to the kind.
    pub fn parse(
        &mut self,
        ctx: &mut ParseContext<'_>,
        fields: &Map<String, Value>,
    ) -> Result<(), NodeError> {
        let environment = Arc::clone(&self.info.environment);
        let scanner = ctx.scanner;

        let mut reader = self.info.new_build_reader(fields, scanner, &environment);
        if let Some(strict) = reader.parse_bool_field("strict_file_mode")? {
            self.info.strict_file_mode = strict;
            reader.set_strict_file_mode(strict);
        }

        for dependency in reader.parse_repeated_string("dependencies", false)? {
            let target = ctx.file.compute_target_info(&dependency);
            self.info.dep_targets.push(target);
        }

        self.info.env_variables = reader.parse_key_value_strings("env")?;
        self.info.licenses = reader
            .parse_repeated_string("licenses", false)?
            .into_iter()
            .collect();

        self.kind.parse(&mut self.info, ctx, &reader)
    }

    /// Runs only the kind specific parse, reading from a reader set up by
    /// another node. Used for nodes synthesized out of a parent's record.
    pub fn parse_kind(
        &mut self,
        ctx: &mut ParseContext<'_>,
        reader: &BuildFileNodeReader<'_>,
    ) -> Result<(), NodeError> {
        self.kind.parse(&mut self.info, ctx, reader)
    }

    pub(crate) fn set_component_helpers(&mut self, helpers: Vec<ComponentHelper>) {
        self.info.component_helpers = helpers;
    }

    pub fn include_child_dependency(
        &self,
        category: Category,
        lang: Language,
        child: &Node,
    ) -> bool {
        self.kind.include_child_dependency(category, lang, child)
    }

    pub fn should_include(&self, category: Category, lang: Language) -> bool {
        self.kind.should_include(category, lang)
    }

    pub fn include_dependencies(&self, category: Category, lang: Language) -> bool {
        self.kind.include_dependencies(category, lang)
    }

    pub fn path_rewrite(&self) -> Option<ComponentHelper> {
        self.kind.path_rewrite(&self.info)
    }

    pub fn local_env_variables(&self, lang: Language, env: &mut BTreeMap<String, String>) {
        env.extend(
            self.info
                .env_variables
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        self.kind.local_env_variables(&self.info, lang, env);
    }

    pub fn local_dependency_files(&self, lang: Language, files: &mut ResourceFileSet) {
        self.kind.local_dependency_files(&self.info, lang, files);
    }

    pub fn local_object_files(&self, lang: Language, files: &mut ResourceFileSet) {
        self.kind.local_object_files(&self.info, lang, files);
    }

    pub fn local_object_roots(&self, lang: Language, dirs: &mut ResourceFileSet) {
        self.kind.local_object_roots(&self.info, lang, dirs);
    }

    pub fn local_system_dependencies(&self, lang: Language, deps: &mut IndexSet<String>) {
        self.kind.local_system_dependencies(&self.info, lang, deps);
    }

    pub fn local_final_outputs(&self, lang: Language, outputs: &mut ResourceFileSet) {
        self.kind.local_final_outputs(&self.info, lang, outputs);
    }

    pub fn local_binaries(&self, lang: Language, outputs: &mut ResourceFileSet) {
        self.kind.local_binaries(&self.info, lang, outputs);
    }

    pub fn local_tests(&self, lang: Language, targets: &mut IndexSet<String>) {
        self.kind.local_tests(&self.info, lang, targets);
    }

    pub fn local_link_flags(&self, lang: Language, flags: &mut IndexSet<String>) {
        self.kind.local_link_flags(&self.info, lang, flags);
    }

    pub fn local_compile_flags(&self, lang: Language, flags: &mut IndexSet<String>) {
        self.kind.local_compile_flags(&self.info, lang, flags);
    }

    pub fn local_include_dirs(&self, lang: Language, dirs: &mut IndexSet<String>) {
        self.kind.local_include_dirs(&self.info, lang, dirs);
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind.name())
            .field("target", &self.info.target)
            .field("dep_targets", &self.info.dep_targets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::MemoryScanner;

    struct Plain;

    impl NodeKind for Plain {
        fn name(&self) -> &'static str {
            "plain"
        }
    }

    fn node(path: &str) -> Node {
        Node::new(
            TargetInfo::new(path),
            Arc::new(Environment::default()),
            Box::new(Plain),
        )
    }

    #[test]
    fn test_directories() {
        let n = node("//a/b:c");
        let info = n.info();
        assert_eq!(info.gen_dir(), ".gen-files/a/b");
        assert_eq!(info.obj_dir(), ".gen-obj/a/b");
        assert_eq!(info.src_dir(), ".gen-src/a/b");
        assert_eq!(info.package_dir(), ".gen-pkg/a/b");
        assert_eq!(info.relative_root_dir(), "../../");
        assert_eq!(info.relative_gen_dir(), "../../.gen-files/a/b");
    }

    #[test]
    fn test_common_fields() {
        let fields: Map<String, Value> = serde_json::from_str(
            r#"{
                "name": "c",
                "dependencies": [":d", "//x:y"],
                "env": { "OUT": "$(GEN_DIR)/o" },
                "licenses": ["MIT", "BSD"],
                "strict_file_mode": false
            }"#,
        )
        .unwrap();

        let mut file = BuildFile::new("a/b/BUILD");
        let scanner = MemoryScanner::new();
        let mut ctx = ParseContext {
            file: &mut file,
            scanner: &scanner,
        };

        let mut n = node("//a/b:c");
        n.parse(&mut ctx, &fields).unwrap();

        let deps: Vec<_> = n.info().dep_targets().iter().map(TargetInfo::full_path).collect();
        assert_eq!(deps, vec!["//a/b:d", "//x:y"]);
        assert_eq!(n.info().env_variables()["OUT"], ".gen-files/a/b/o");
        assert!(n.info().licenses().contains("MIT"));
        assert!(!n.info().strict_file_mode());
    }

    #[test]
    fn test_subnodes() {
        let mut file = BuildFile::new("a/BUILD");
        let mut parent = node("//a:bin");

        let name = parent.info().next_target_name(&mut file);
        assert_eq!(name.full_path(), "//a:bin.0");

        let mut child = node(name.full_path());
        let grandchild = node("//a:bin.1");
        child.info_mut().add_subnode(grandchild);
        parent.info_mut().add_subnode(child);

        assert_eq!(parent.info().dep_targets(), &[TargetInfo::new("//a:bin.0")]);

        let extracted = parent.info_mut().extract_subnodes();
        let names: Vec<_> = extracted.iter().map(|n| n.target().full_path()).collect();
        assert_eq!(names, vec!["//a:bin.0", "//a:bin.1"]);
        assert_eq!(extracted[0].info().required_parents(), &[TargetInfo::new("//a:bin")]);
        assert!(parent.info().subnodes().is_empty());
    }

    #[test]
    fn test_variables() {
        let mut n = node("//a:lib");
        n.info_mut().add_conditional_variable("cflags", "DEBUG", "-g", "-O2");
        n.info_mut().add_conditional_variable("empty", "DEBUG", "", "");
        n.info_mut().add_conditional_variable("plain", "DEBUG", "$x", "$x");

        assert!(n.info().has_variable("cflags"));
        assert!(!n.info().has_variable("empty"));
        assert_eq!(n.info().variable("cflags").unwrap().name(), "cflags.a/lib");
        assert_eq!(n.info().variable("plain").unwrap().value(), Some("$$x"));
    }

    #[test]
    fn test_touchfile() {
        let n = node("//a:lib");
        assert_eq!(n.info().touchfile(".gen").path().as_str(), ".gen-obj/a/.lib.gen.dummy");
    }
}
