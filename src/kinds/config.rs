use std::sync::Arc;

use crate::component::ComponentHelper;
use crate::error::NodeError;
use crate::node::{NodeInfo, NodeKind, ParseContext};
use crate::reader::BuildFileNodeReader;
use crate::rewrite::PrefixRewriter;
use crate::utils::join_path;

/// `config`: settings for a build file and the directories below it.
///
/// * `component` makes `//<component>/...` dependencies resolve below this
///   directory, and maps `<dir>/<component_root>/x.h` to `<component>/x.h`
///   for files.
/// * `base_dependencies` are added to every target of this file and of the
///   files below it.
/// * `keys` are free-form metadata registered on the build file.
#[derive(Debug, Default)]
pub struct Config {
    component: Option<String>,
    component_root: String,
}

impl Config {
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }
}

impl NodeKind for Config {
    fn name(&self) -> &'static str {
        "config"
    }

    fn parse(
        &mut self,
        node: &mut NodeInfo,
        ctx: &mut ParseContext<'_>,
        reader: &BuildFileNodeReader<'_>,
    ) -> Result<(), NodeError> {
        self.component = reader.parse_string_field("component", false)?;
        self.component_root = reader
            .parse_string_field("component_root", false)?
            .unwrap_or_default();

        if let Some(component) = &self.component {
            let dir = node.target().dir();
            ctx.file
                .add_rewriter(Arc::new(PrefixRewriter::new(component.clone(), dir)));
        }

        // Stored resolved, so files below this one read them the same way.
        for dependency in reader.parse_repeated_string("base_dependencies", false)? {
            let target = ctx.file.compute_target_info(&dependency);
            ctx.file.add_base_dependency(target.full_path());
        }

        for (key, value) in reader.parse_key_value_strings("keys")? {
            ctx.file.register_key(key, value);
        }

        Ok(())
    }

    fn path_rewrite(&self, node: &NodeInfo) -> Option<ComponentHelper> {
        let component = self.component.as_ref()?;
        Some(ComponentHelper::new(
            component.clone(),
            join_path(node.target().dir(), &self.component_root),
        ))
    }
}
