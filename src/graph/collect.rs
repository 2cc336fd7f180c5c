//! Per-category dependency closures.
//!
//! A closure lists every dependency that contributes to one category, each
//! node after its own contributing dependencies. Accessors append the node's
//! own contribution last, so the result is always prerequisites first.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use indexmap::IndexSet;
use petgraph::graph::NodeIndex;

use super::{BuildGraph, NodeRef};
use crate::category::{Category, Language};
use crate::component::ComponentHelper;
use crate::node::Node;
use crate::resource::ResourceFileSet;
use crate::utils::{has_path_prefix, num_path_components};

impl BuildGraph {
    /// Appends the `category` closure of `index` to `out`.
    ///
    /// Nodes already in `out` are treated as seen and never added again. A
    /// dependency is visited when the parent lets the edge through and the
    /// dependency takes part in the category; its own dependencies are only
    /// walked when it isn't a barrier for the category.
    pub fn collect_all_dependencies(
        &self,
        index: NodeIndex,
        category: Category,
        lang: Language,
        out: &mut Vec<NodeIndex>,
    ) {
        let mut seen: HashSet<NodeIndex> = out.iter().copied().collect();
        self.collect_into(index, category, lang, &mut seen, out);
    }

    fn collect_into(
        &self,
        index: NodeIndex,
        category: Category,
        lang: Language,
        seen: &mut HashSet<NodeIndex>,
        out: &mut Vec<NodeIndex>,
    ) {
        let parent = &self.graph[index];
        for &child_index in parent.info().dependencies() {
            let child = &self.graph[child_index];
            if parent.include_child_dependency(category, lang, child)
                && child.should_include(category, lang)
                && seen.insert(child_index)
            {
                if child.include_dependencies(category, lang) {
                    self.collect_into(child_index, category, lang, seen, out);
                }
                out.push(child_index);
            }
        }
    }
}

macro_rules! category_accessors {
    ($(
        $(#[$meta:meta])*
        $all:ident / $input:ident => $local:ident($category:ident) -> $out:ty;
    )*) => {
        $(
            /// Contributions of the dependency closure only.
            pub fn $input(&self, lang: Language) -> $out {
                let mut out = <$out>::default();
                for node in self.closure(Category::$category, lang) {
                    node.$local(lang, &mut out);
                }
                out
            }

            $(#[$meta])*
            pub fn $all(&self, lang: Language) -> $out {
                let mut out = self.$input(lang);
                self.node().$local(lang, &mut out);
                out
            }
        )*
    };
}

impl<'g> NodeRef<'g> {
    /// The `category` closure of this node.
    pub fn all_dependencies(&self, category: Category, lang: Language) -> Vec<NodeRef<'g>> {
        self.closure_indices(category, lang)
            .into_iter()
            .map(|index| self.graph.node(index))
            .collect()
    }

    fn closure_indices(&self, category: Category, lang: Language) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        self.graph
            .collect_all_dependencies(self.index, category, lang, &mut out);
        out
    }

    fn closure(
        &self,
        category: Category,
        lang: Language,
    ) -> impl Iterator<Item = &'g Node> + use<'g> {
        let graph = self.graph;
        self.closure_indices(category, lang)
            .into_iter()
            .map(move |index| &graph.graph[index])
    }

    pub fn input_env_variables(&self, lang: Language) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        for node in self.closure(Category::EnvVariables, lang) {
            node.local_env_variables(lang, &mut env);
        }
        env
    }

    /// Environment for running this node; later entries win, so the node's
    /// own values override its dependencies'.
    pub fn env_variables(&self, lang: Language) -> BTreeMap<String, String> {
        let mut env = self.input_env_variables(lang);
        self.node().local_env_variables(lang, &mut env);
        env
    }

    /// Dependency files of the closure, along with the binaries it builds.
    pub fn input_dependency_files(&self, lang: Language) -> ResourceFileSet {
        let mut files = ResourceFileSet::new();
        for node in self.closure(Category::DependencyFiles, lang) {
            node.local_dependency_files(lang, &mut files);
            node.local_binaries(lang, &mut files);
        }
        files
    }

    pub fn dependency_files(&self, lang: Language) -> ResourceFileSet {
        let mut files = self.input_dependency_files(lang);
        self.node().local_dependency_files(lang, &mut files);
        files
    }

    /// Object roots follow the object file closure.
    pub fn input_object_roots(&self, lang: Language) -> ResourceFileSet {
        let mut dirs = ResourceFileSet::new();
        for node in self.closure(Category::ObjectFiles, lang) {
            node.local_object_roots(lang, &mut dirs);
        }
        dirs
    }

    pub fn object_roots(&self, lang: Language) -> ResourceFileSet {
        let mut dirs = self.input_object_roots(lang);
        self.node().local_object_roots(lang, &mut dirs);
        dirs
    }

    category_accessors! {
        object_files / input_object_files
            => local_object_files(ObjectFiles) -> ResourceFileSet;
        system_dependencies / input_system_dependencies
            => local_system_dependencies(SystemDependencies) -> IndexSet<String>;
        final_outputs / input_final_outputs
            => local_final_outputs(FinalOutputs) -> ResourceFileSet;
        binaries / input_binaries
            => local_binaries(Binaries) -> ResourceFileSet;
        /// Test targets to run for this node.
        tests / input_tests
            => local_tests(Tests) -> IndexSet<String>;
        link_flags / input_link_flags
            => local_link_flags(LinkFlags) -> IndexSet<String>;
        compile_flags / input_compile_flags
            => local_compile_flags(CompileFlags) -> IndexSet<String>;
    }

    /// Only this node's own binaries, nothing from dependencies.
    pub fn top_test_binaries(&self, lang: Language) -> ResourceFileSet {
        let mut outputs = ResourceFileSet::new();
        self.node().local_binaries(lang, &mut outputs);
        outputs
    }

    /// Include directories of the closure followed by the workspace, source
    /// and generated roots.
    pub fn input_include_dirs(&self, lang: Language) -> IndexSet<String> {
        let mut dirs = IndexSet::new();
        for node in self.closure(Category::IncludeDirs, lang) {
            node.local_include_dirs(lang, &mut dirs);
        }

        let environment = self.node().info().environment();
        dirs.insert(environment.root_dir.clone());
        dirs.insert(environment.source_dir.clone());
        dirs.insert(environment.genfile_dir.clone());
        dirs
    }

    pub fn include_dirs(&self, lang: Language) -> IndexSet<String> {
        let mut dirs = self.input_include_dirs(lang);
        self.node().local_include_dirs(lang, &mut dirs);
        dirs
    }

    /// Licenses of this node and everything it reaches, regardless of
    /// category; barriers and edge filters do not apply.
    pub fn licenses(&self) -> BTreeSet<String> {
        let mut licenses = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack = vec![self.index];

        while let Some(index) = stack.pop() {
            if !visited.insert(index) {
                continue;
            }
            let node = &self.graph.graph[index];
            licenses.extend(node.info().licenses().iter().cloned());
            stack.extend(node.info().dependencies().iter().copied());
        }

        licenses
    }

    /// Path rewrites of ancestor directories found in the include-directory
    /// closure, deepest first, then the catch-all.
    pub(crate) fn init_component_helpers(&self) -> Vec<ComponentHelper> {
        let dir = self.target().dir();
        let mut by_depth = BTreeMap::new();

        for dependency in self.closure(Category::IncludeDirs, Language::Any) {
            let dependency_dir = dependency.target().dir();
            if !has_path_prefix(dir, dependency_dir) {
                continue;
            }
            if let Some(helper) = dependency.path_rewrite() {
                by_depth.insert(num_path_components(dependency_dir), helper);
            }
        }

        let mut helpers: Vec<_> = by_depth.into_values().rev().collect();
        helpers.push(ComponentHelper::catch_all());
        helpers
    }
}
