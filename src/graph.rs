//! The target graph, in two phases.
//!
//! [`GraphBuilder`] is the write side: build files are parsed into nodes and
//! registered by target name, in any order. [`GraphBuilder::finish`] resolves
//! every declared dependency to a [`NodeIndex`], rejects cycles and hands
//! back a [`BuildGraph`], which is read-only and answers the per-category
//! dependency queries (see [`NodeRef`]).

mod collect;

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use petgraph::Graph;
use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use serde_json::Value;

use crate::buildfile::BuildFile;
use crate::component::ComponentHelper;
use crate::core::Environment;
use crate::error::{BuildFileError, GraphError, RepographError, Unresolved};
use crate::kinds::KindRegistry;
use crate::node::{Node, ParseContext};
use crate::scanner::FileScanner;
use crate::target::TargetInfo;

/// Collects nodes until the graph is complete.
pub struct GraphBuilder {
    environment: Arc<Environment>,
    registry: KindRegistry,
    graph: Graph<Node, ()>,
    index: HashMap<String, NodeIndex>,
}

impl GraphBuilder {
    /// A builder knowing the built-in kinds.
    pub fn new(environment: Arc<Environment>) -> Self {
        Self::with_registry(environment, KindRegistry::default())
    }

    pub fn with_registry(environment: Arc<Environment>, registry: KindRegistry) -> Self {
        Self {
            environment,
            registry,
            graph: Graph::new(),
            index: HashMap::new(),
        }
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn registry_mut(&mut self) -> &mut KindRegistry {
        &mut self.registry
    }

    pub fn contains(&self, target: &TargetInfo) -> bool {
        self.index.contains_key(target.full_path())
    }

    /// A registered node. Its dependencies are not resolved yet.
    pub fn node(&self, target: &TargetInfo) -> Option<&Node> {
        self.index
            .get(target.full_path())
            .map(|&index| &self.graph[index])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Registers a single node. Its subnodes are not looked at.
    pub fn add_node(&mut self, node: Node) -> Result<NodeIndex, GraphError> {
        let name = node.target().full_path().to_string();
        if self.index.contains_key(&name) {
            return Err(GraphError::Duplicate(name));
        }

        tracing::debug!(target = %name, kind = node.kind_name(), "registering node");
        let index = self.graph.add_node(node);
        self.index.insert(name, index);
        Ok(index)
    }

    /// Parses every record of `file` and registers the resulting nodes along
    /// with everything they synthesized.
    ///
    /// The file's base dependencies are added to every node except the base
    /// dependency itself. Returns the registered targets in file order.
    pub fn add_build_file(
        &mut self,
        file: &mut BuildFile,
        scanner: &dyn FileScanner,
    ) -> Result<Vec<TargetInfo>, RepographError> {
        let records = file.nodes().to_vec();
        let mut parsed = Vec::with_capacity(records.len());

        for record in &records {
            let (kind, fields) = record.kind(file.filename())?;
            let Some(name) = fields.get("name").and_then(Value::as_str) else {
                return Err(BuildFileError::MissingName {
                    file: file.filename().to_path_buf(),
                    kind: kind.to_string(),
                    found: Value::Object(fields.clone()).to_string(),
                }
                .into());
            };

            let target = TargetInfo::from_relative(&format!(":{name}"), file.filename());
            let kind = self.registry.create(kind, &target)?;
            let mut node = Node::new(target, Arc::clone(&self.environment), kind);

            let mut ctx = ParseContext {
                file: &mut *file,
                scanner,
            };
            node.parse(&mut ctx, fields)?;
            parsed.push(node);
        }

        let mut nodes = Vec::with_capacity(parsed.len());
        for mut node in parsed {
            let subnodes = node.info_mut().extract_subnodes();
            nodes.push(node);
            nodes.extend(subnodes);
        }

        let base: Vec<TargetInfo> = file
            .base_dependencies()
            .iter()
            .map(|dependency| file.compute_target_info(dependency))
            .collect();

        let mut added = Vec::with_capacity(nodes.len());
        for mut node in nodes {
            for dependency in &base {
                if dependency != node.target() && !node.info().dep_targets().contains(dependency) {
                    node.info_mut().add_dependency_target(dependency.clone());
                }
            }
            added.push(node.target().clone());
            self.add_node(node)?;
        }

        tracing::debug!(file = %file.filename(), targets = added.len(), "added build file");
        Ok(added)
    }

    /// Closes the graph.
    ///
    /// Every unresolved dependency is reported at once. After resolution each
    /// node computes its component helpers from its include-directory
    /// closure.
    pub fn finish(mut self) -> Result<BuildGraph, GraphError> {
        let mut unresolved = Vec::new();

        for index in self.graph.node_indices() {
            let node = &self.graph[index];
            let mut dependencies = Vec::with_capacity(node.info().dep_targets().len());
            for target in node.info().dep_targets() {
                match self.index.get(target.full_path()) {
                    Some(&dependency) => dependencies.push(dependency),
                    None => unresolved.push(Unresolved {
                        target: node.target().full_path().to_string(),
                        dependency: target.full_path().to_string(),
                    }),
                }
            }

            for &dependency in &dependencies {
                self.graph.add_edge(dependency, index, ());
            }
            self.graph[index].info_mut().dependencies = dependencies;
        }

        if !unresolved.is_empty() {
            return Err(GraphError::Unresolved(unresolved));
        }

        let order = toposort(&self.graph, None)
            .map_err(|cycle| GraphError::Cycle(self.graph[cycle.node_id()].target().to_string()))?;

        let mut graph = BuildGraph {
            graph: self.graph,
            index: self.index,
            order,
        };

        let helpers: Vec<_> = graph
            .graph
            .node_indices()
            .map(|index| (index, graph.node(index).init_component_helpers()))
            .collect();
        for (index, helpers) in helpers {
            graph.graph[index].set_component_helpers(helpers);
        }

        tracing::debug!(nodes = graph.len(), "graph finished");
        Ok(graph)
    }
}

/// A closed target graph.
///
/// Edges point from a dependency to its dependent. Per-node dependency order
/// is kept on the nodes themselves, as declared.
pub struct BuildGraph {
    graph: Graph<Node, ()>,
    index: HashMap<String, NodeIndex>,
    order: Vec<NodeIndex>,
}

impl BuildGraph {
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn get(&self, target: &TargetInfo) -> Option<NodeRef<'_>> {
        self.find(target.full_path())
    }

    /// Looks a node up by its `//dir:name` form.
    pub fn find(&self, full_path: &str) -> Option<NodeRef<'_>> {
        self.index.get(full_path).map(|&index| self.node(index))
    }

    /// # Panics
    ///
    /// If `index` does not belong to this graph.
    pub fn node(&self, index: NodeIndex) -> NodeRef<'_> {
        NodeRef { graph: self, index }
    }

    /// Nodes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.graph.node_indices().map(|index| self.node(index))
    }

    /// Nodes with every dependency ahead of its dependents.
    pub fn order(&self) -> impl Iterator<Item = NodeRef<'_>> {
        self.order.iter().map(|&index| self.node(index))
    }
}

impl std::fmt::Debug for BuildGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.graph.node_weights()).finish()
    }
}

/// A node together with the graph it lives in.
#[derive(Clone, Copy)]
pub struct NodeRef<'g> {
    graph: &'g BuildGraph,
    index: NodeIndex,
}

impl<'g> NodeRef<'g> {
    pub fn index(&self) -> NodeIndex {
        self.index
    }

    pub fn node(&self) -> &'g Node {
        &self.graph.graph[self.index]
    }

    /// Direct dependencies, in declaration order.
    pub fn dependencies(&self) -> impl Iterator<Item = NodeRef<'g>> + use<'g> {
        let graph = self.graph;
        self.node()
            .info()
            .dependencies()
            .iter()
            .map(move |&index| graph.node(index))
    }

    /// See [`NodeInfo::component_helper`](crate::NodeInfo::component_helper).
    pub fn component_helper(&self, path: &str) -> Option<&'g ComponentHelper> {
        self.node().info().component_helper(path)
    }

    pub fn component_helper_preferring(
        &self,
        preferred: Option<&'g ComponentHelper>,
        path: &str,
    ) -> Option<&'g ComponentHelper> {
        self.node().info().component_helper_preferring(preferred, path)
    }
}

impl Deref for NodeRef<'_> {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.graph.graph[self.index]
    }
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("NodeRef").field(&self.target().full_path()).finish()
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.graph, other.graph) && self.index == other.index
    }
}

impl Eq for NodeRef<'_> {}

#[cfg(test)]
mod tests;
