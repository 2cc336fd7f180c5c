use crate::category::{Category, Language};
use crate::error::NodeError;
use crate::node::{NodeInfo, NodeKind, ParseContext, escape};
use crate::reader::BuildFileNodeReader;
use crate::resource::{Origin, Resource, ResourceFileSet};

/// `gen_sh`: runs a shell command that turns `input_files` into `outs`.
///
/// The command runs from the target directory, so `build_cmd` is read in
/// root-relative mode. Outputs live below the node's generated directory.
#[derive(Debug, Default)]
pub struct GenShell {
    build_cmd: Option<String>,
    inputs: Vec<Resource>,
    outs: Vec<Resource>,
}

impl GenShell {
    pub fn build_cmd(&self) -> Option<&str> {
        self.build_cmd.as_deref()
    }

    pub fn inputs(&self) -> &[Resource] {
        &self.inputs
    }

    pub fn outs(&self) -> &[Resource] {
        &self.outs
    }
}

impl NodeKind for GenShell {
    fn name(&self) -> &'static str {
        "gen_sh"
    }

    fn parse(
        &mut self,
        node: &mut NodeInfo,
        _: &mut ParseContext<'_>,
        reader: &BuildFileNodeReader<'_>,
    ) -> Result<(), NodeError> {
        self.build_cmd = reader.parse_string_field("build_cmd", true)?;
        self.inputs = reader.parse_repeated_files("input_files", reader.strict_file_mode())?;
        self.outs = reader
            .parse_repeated_string("outs", false)?
            .iter()
            .map(|out| Resource::from_local_path(node.gen_dir(), out, Origin::Generated))
            .collect();

        if let Some(cmd) = &self.build_cmd {
            node.mutable_variable("build_cmd").set_value(escape(cmd));
        }
        Ok(())
    }

    /// Generated code is self-contained: what the generator itself depends
    /// on is not passed on to whoever compiles or links its outputs.
    fn include_dependencies(&self, category: Category, _: Language) -> bool {
        !matches!(
            category,
            Category::ObjectFiles
                | Category::LinkFlags
                | Category::SystemDependencies
                | Category::CompileFlags
                | Category::IncludeDirs
        )
    }

    fn local_dependency_files(&self, _: &NodeInfo, _: Language, files: &mut ResourceFileSet) {
        files.extend(self.outs.iter().cloned());
    }

    fn local_final_outputs(&self, _: &NodeInfo, _: Language, outputs: &mut ResourceFileSet) {
        outputs.extend(self.outs.iter().cloned());
    }
}
