#![forbid(unsafe_code)]
//! Compiles JSON build files into a resolved target graph.
//!
//! A workspace is a tree of directories, each optionally holding a `BUILD`
//! file that declares targets:
//!
//! ```json
//! [
//!   { "cc_library": { "name": "str", "cc_sources": ["*.cc"], "cc_headers": ["str.h"] } },
//!   { "cc_binary": { "name": "tool", "cc_sources": ["main.cc"], "dependencies": [":str"] } }
//! ]
//! ```
//!
//! The [`Loader`] reads the build files reachable from a set of root targets
//! and produces a [`BuildGraph`]. For every node the graph answers what it
//! needs per [`Category`]: object files to link, include directories, flags,
//! environment and so on, always with prerequisites ahead of the things that
//! need them.
//!
//! Target kinds are pluggable through [`NodeKind`] and [`KindRegistry`].

mod buildfile;
mod category;
mod component;
mod core;
mod error;
mod graph;
mod kinds;
mod loader;
mod node;
mod reader;
mod resource;
mod rewrite;
mod scanner;
mod target;
mod utils;

pub use petgraph::graph::NodeIndex;

pub use crate::buildfile::{BuildFile, BuildFileNode};
pub use crate::category::{Category, Language};
pub use crate::component::ComponentHelper;
pub use crate::core::Environment;
pub use crate::error::*;
pub use crate::graph::{BuildGraph, GraphBuilder, NodeRef};
pub use crate::kinds::{CcBinary, CcLibrary, Config, GenShell, KindConstructor, KindRegistry};
pub use crate::loader::{Loader, Workspace};
pub use crate::node::{MakeVariable, Node, NodeInfo, NodeKind, ParseContext, escape};
pub use crate::reader::BuildFileNodeReader;
pub use crate::resource::{Origin, Resource, ResourceFileSet};
pub use crate::rewrite::{DependencyRewriter, PrefixRewriter, VarMap, VariableRewriter};
pub use crate::scanner::{FileScanner, GlobScanner, MemoryScanner};
pub use crate::target::TargetInfo;
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
