//! Reading a workspace from disk.
//!
//! Starting from a set of root targets, the [`Loader`] reads every build file
//! those targets reach, directly or through dependencies, and hands the
//! result over as a [`Workspace`].
//!
//! Build files are read a frontier at a time: all files discovered in one
//! round are read from disk in parallel, then parsed one by one, shallowest
//! first, so that every file sees the rewriters and base dependencies of the
//! build files in the directories above it.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::io;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use petgraph::Graph;
use petgraph::algo::tarjan_scc;
use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::buildfile::BuildFile;
use crate::core::Environment;
use crate::error::RepographError;
use crate::graph::{BuildGraph, GraphBuilder};
use crate::kinds::KindRegistry;
use crate::scanner::GlobScanner;
use crate::target::TargetInfo;
use crate::utils::num_path_components;

/// Loads build files below `root`.
///
/// ```rust,no_run
/// use repograph::{Environment, Loader, TargetInfo};
///
/// let workspace = Loader::new(".", Environment::default())
///     .load(&[TargetInfo::new("//app:main")])
///     .unwrap();
///
/// for node in workspace.graph().order() {
///     println!("{}", node.target());
/// }
/// ```
pub struct Loader {
    root: Utf8PathBuf,
    environment: Arc<Environment>,
    registry: KindRegistry,
}

impl Loader {
    pub fn new(root: impl Into<Utf8PathBuf>, environment: Environment) -> Self {
        Self {
            root: root.into(),
            environment: Arc::new(environment),
            registry: KindRegistry::default(),
        }
    }

    /// Replaces the set of known kinds.
    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn load(&self, roots: &[TargetInfo]) -> Result<Workspace, RepographError> {
        let _span = tracing::info_span!("load", root = %self.root).entered();

        let scanner = GlobScanner::new(self.root.clone());
        let mut builder =
            GraphBuilder::with_registry(Arc::clone(&self.environment), self.registry.clone());

        let mut files: BTreeMap<Utf8PathBuf, BuildFile> = BTreeMap::new();
        let mut probed: HashSet<Utf8PathBuf> = HashSet::new();
        let mut file_deps: BTreeMap<Utf8PathBuf, IndexSet<Utf8PathBuf>> = BTreeMap::new();

        let mut frontier: BTreeSet<Utf8PathBuf> = roots
            .iter()
            .map(|target| self.environment.build_file_in(target.dir()))
            .collect();

        while !frontier.is_empty() {
            // Ancestors are optional; the files that were asked for are not.
            let mut wanted: BTreeMap<Utf8PathBuf, bool> = BTreeMap::new();
            for path in &frontier {
                for ancestor in self.ancestors(path) {
                    if probed.insert(ancestor.clone()) {
                        wanted.entry(ancestor).or_insert(false);
                    }
                }
                probed.insert(path.clone());
                wanted.insert(path.clone(), true);
            }

            let mut texts: Vec<_> = wanted
                .into_iter()
                .collect::<Vec<_>>()
                .into_par_iter()
                .map(|(path, required)| {
                    let text = fs::read_to_string(self.root.join(&path));
                    (path, required, text)
                })
                .collect();
            texts.sort_by_key(|(path, ..)| num_path_components(path.as_str()));

            let mut next = BTreeSet::new();
            for (path, required, text) in texts {
                let text = match text {
                    Ok(text) => text,
                    Err(err) if !required && err.kind() == io::ErrorKind::NotFound => continue,
                    Err(err) => return Err(RepographError::Read(path, err)),
                };

                let mut file = BuildFile::new(path.clone());
                if let Some(parent) = self.nearest_parent(&path, &files) {
                    file.merge_parent(parent);
                }
                file.parse(&text)?;

                let added = builder.add_build_file(&mut file, &scanner)?;
                for target in &added {
                    let Some(node) = builder.node(target) else {
                        continue;
                    };
                    let info = node.info();
                    for dependency in info.dep_targets().iter().chain(info.pre_parse()) {
                        let dependency_file = self.environment.build_file_in(dependency.dir());
                        if dependency_file == path {
                            continue;
                        }
                        if !files.contains_key(&dependency_file) {
                            next.insert(dependency_file.clone());
                        }
                        file_deps
                            .entry(path.clone())
                            .or_default()
                            .insert(dependency_file);
                    }
                }

                tracing::debug!(file = %path, targets = added.len(), "loaded build file");
                files.insert(path, file);
            }

            next.retain(|path| !files.contains_key(path));
            frontier = next;
        }

        merge_dependencies(&mut files, &file_deps);

        let graph = builder.finish()?;
        tracing::info!(files = files.len(), targets = graph.len(), "workspace loaded");
        Ok(Workspace { graph, files })
    }

    /// Build files of the directories above `path`, nearest first.
    fn ancestors(&self, path: &Utf8Path) -> Vec<Utf8PathBuf> {
        let Some(dir) = path.parent() else {
            return Vec::new();
        };
        dir.ancestors()
            .skip(1)
            .map(|ancestor| self.environment.build_file_in(ancestor.as_str()))
            .collect()
    }

    fn nearest_parent<'a>(
        &self,
        path: &Utf8Path,
        files: &'a BTreeMap<Utf8PathBuf, BuildFile>,
    ) -> Option<&'a BuildFile> {
        self.ancestors(path)
            .into_iter()
            .find_map(|ancestor| files.get(&ancestor))
    }
}

/// Imports registered keys along the build-file dependency relation.
///
/// Files are visited dependencies first, so a key travels down a whole chain
/// before the file at its top merges it. Files depending on each other are
/// merged once per member of the cycle.
fn merge_dependencies(
    files: &mut BTreeMap<Utf8PathBuf, BuildFile>,
    file_deps: &BTreeMap<Utf8PathBuf, IndexSet<Utf8PathBuf>>,
) {
    let mut graph: Graph<Utf8PathBuf, ()> = Graph::new();
    let index: HashMap<Utf8PathBuf, _> = files
        .keys()
        .map(|path| (path.clone(), graph.add_node(path.clone())))
        .collect();

    for (path, dependencies) in file_deps {
        for dependency in dependencies {
            if let (Some(&from), Some(&to)) = (index.get(path), index.get(dependency)) {
                graph.add_edge(from, to, ());
            }
        }
    }

    // Tarjan yields components sinks first.
    for component in tarjan_scc(&graph) {
        for _ in 0..component.len() {
            for &node in &component {
                let path = &graph[node];
                let Some(dependencies) = file_deps.get(path) else {
                    continue;
                };
                let Some(mut file) = files.remove(path) else {
                    continue;
                };
                for dependency in dependencies {
                    if let Some(dependency) = files.get(dependency) {
                        file.merge_dependency(dependency);
                    }
                }
                files.insert(path.clone(), file);
            }
        }
    }
}

/// Everything one load produced.
#[derive(Debug)]
pub struct Workspace {
    graph: BuildGraph,
    files: BTreeMap<Utf8PathBuf, BuildFile>,
}

impl Workspace {
    pub fn graph(&self) -> &BuildGraph {
        &self.graph
    }

    /// A loaded build file, by its root-relative path.
    pub fn build_file(&self, path: impl AsRef<Utf8Path>) -> Option<&BuildFile> {
        self.files.get(path.as_ref())
    }

    pub fn build_files(&self) -> impl Iterator<Item = &BuildFile> {
        self.files.values()
    }

    pub fn into_graph(self) -> BuildGraph {
        self.graph
    }
}
