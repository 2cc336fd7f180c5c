//! Built-in target kinds and the registry that maps kind names to them.

mod cc;
mod config;
mod gen_sh;

use std::collections::BTreeMap;

use crate::error::NodeError;
use crate::node::NodeKind;
use crate::target::TargetInfo;

pub use cc::{CcBinary, CcLibrary};
pub use config::Config;
pub use gen_sh::GenShell;

/// Builds an empty kind, ready to parse a record.
pub type KindConstructor = fn() -> Box<dyn NodeKind>;

/// Kind name to constructor.
///
/// ```rust
/// use repograph::{KindRegistry, NodeKind};
///
/// struct Docs;
///
/// impl NodeKind for Docs {
///     fn name(&self) -> &'static str {
///         "docs"
///     }
/// }
///
/// let mut registry = KindRegistry::default();
/// registry.register("docs", || Box::new(Docs));
/// assert!(registry.contains("docs"));
/// ```
#[derive(Clone)]
pub struct KindRegistry {
    kinds: BTreeMap<&'static str, KindConstructor>,
}

impl KindRegistry {
    /// A registry without any kinds.
    pub fn empty() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Adds or replaces a kind.
    pub fn register(&mut self, name: &'static str, constructor: KindConstructor) {
        self.kinds.insert(name, constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn create(&self, name: &str, target: &TargetInfo) -> Result<Box<dyn NodeKind>, NodeError> {
        match self.kinds.get(name) {
            Some(constructor) => Ok(constructor()),
            None => Err(NodeError::UnknownKind {
                kind: name.to_string(),
                target: target.full_path().to_string(),
            }),
        }
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("cc_library", || Box::new(CcLibrary::default()));
        registry.register("cc_binary", || Box::new(CcBinary::binary()));
        registry.register("cc_test", || Box::new(CcBinary::test()));
        registry.register("gen_sh", || Box::new(GenShell::default()));
        registry.register("config", || Box::new(Config::default()));
        registry
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.kinds.keys()).finish()
    }
}
