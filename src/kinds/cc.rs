use indexmap::IndexSet;

use crate::category::{Category, Language};
use crate::error::NodeError;
use crate::node::{Node, NodeInfo, NodeKind, ParseContext};
use crate::reader::BuildFileNodeReader;
use crate::resource::{Origin, Resource, ResourceFileSet};
use crate::target::TargetInfo;
use crate::utils::strip_path_prefix;

const LANGUAGES: &[Language] = &[Language::C, Language::Cpp];

/// `cc_library`: sources compiled to objects, headers exported to dependents.
#[derive(Debug, Default)]
pub struct CcLibrary {
    sources: Vec<Resource>,
    headers: Vec<Resource>,
    compile_args: Vec<String>,
    linker_args: Vec<String>,
    system_dependencies: Vec<String>,
    include_dirs: Vec<String>,
    /// Needed to compile, never linked.
    compile_only: Vec<TargetInfo>,
}

impl CcLibrary {
    pub fn sources(&self) -> &[Resource] {
        &self.sources
    }

    pub fn headers(&self) -> &[Resource] {
        &self.headers
    }

    /// `.gen-obj/<dir>/<source path below dir, .o>`.
    fn object_file(node: &NodeInfo, source: &Resource) -> Resource {
        let stripped = node.strip_special_dirs(source.path().as_str());
        let relative = strip_path_prefix(&stripped, node.target().dir())
            .unwrap_or_else(|| source.basename().into())
            .with_extension("o");
        Resource::from_local_path(node.obj_dir(), relative.as_str(), Origin::Object)
    }
}

impl NodeKind for CcLibrary {
    fn name(&self) -> &'static str {
        "cc_library"
    }

    fn parse(
        &mut self,
        node: &mut NodeInfo,
        ctx: &mut ParseContext<'_>,
        reader: &BuildFileNodeReader<'_>,
    ) -> Result<(), NodeError> {
        let strict = reader.strict_file_mode();
        self.sources = reader.parse_repeated_files("cc_sources", strict)?;
        self.headers = reader.parse_repeated_files("cc_headers", strict)?;
        self.compile_args = reader.parse_repeated_string("cc_compile_args", false)?;
        self.linker_args = reader.parse_repeated_string("cc_linker_args", false)?;
        self.system_dependencies = reader.parse_repeated_string("cc_system_dependencies", false)?;
        self.include_dirs = reader.parse_repeated_string("cc_include_dirs", false)?;

        for dependency in reader.parse_repeated_string("cc_compile_only_dependencies", false)? {
            let target = ctx.file.compute_target_info(&dependency);
            node.add_dependency_target(target.clone());
            self.compile_only.push(target);
        }

        Ok(())
    }

    fn include_child_dependency(&self, category: Category, _: Language, child: &Node) -> bool {
        category.is_compile_time() || !self.compile_only.contains(child.target())
    }

    /// Headers, plus their mirror under the generated root for headers that
    /// belong to a component.
    fn local_dependency_files(&self, node: &NodeInfo, lang: Language, files: &mut ResourceFileSet) {
        if !lang.accepts(LANGUAGES) {
            return;
        }
        for header in &self.headers {
            files.add(header.clone());
            if let Some(helper) = node.component_helper(header.path().as_str())
                && !helper.is_catch_all()
            {
                let mirror = helper.rewrite_file(node.environment(), header.path().as_str());
                files.add(Resource::from_local_path(
                    &node.environment().genfile_dir,
                    &mirror,
                    Origin::Generated,
                ));
            }
        }
    }

    fn local_object_files(&self, node: &NodeInfo, lang: Language, files: &mut ResourceFileSet) {
        if lang.accepts(LANGUAGES) {
            files.extend(self.sources.iter().map(|source| Self::object_file(node, source)));
        }
    }

    fn local_object_roots(&self, node: &NodeInfo, lang: Language, dirs: &mut ResourceFileSet) {
        if lang.accepts(LANGUAGES) && !self.sources.is_empty() {
            dirs.add(Resource::from_root_path(node.obj_dir(), Origin::Object));
        }
    }

    fn local_system_dependencies(&self, _: &NodeInfo, lang: Language, deps: &mut IndexSet<String>) {
        if lang.accepts(LANGUAGES) {
            deps.extend(self.system_dependencies.iter().cloned());
        }
    }

    fn local_link_flags(&self, _: &NodeInfo, lang: Language, flags: &mut IndexSet<String>) {
        if lang.accepts(LANGUAGES) {
            flags.extend(self.linker_args.iter().cloned());
        }
    }

    fn local_compile_flags(&self, _: &NodeInfo, lang: Language, flags: &mut IndexSet<String>) {
        if lang.accepts(LANGUAGES) {
            flags.extend(self.compile_args.iter().cloned());
        }
    }

    fn local_include_dirs(&self, _: &NodeInfo, lang: Language, dirs: &mut IndexSet<String>) {
        if lang.accepts(LANGUAGES) {
            dirs.extend(self.include_dirs.iter().cloned());
        }
    }
}

/// `cc_binary` and `cc_test`.
///
/// The sources are moved into a synthesized `cc_library` named
/// `<name>.<n>`, which the binary depends on; the binary itself only links.
#[derive(Debug)]
pub struct CcBinary {
    test: bool,
}

impl CcBinary {
    pub fn binary() -> Self {
        Self { test: false }
    }

    pub fn test() -> Self {
        Self { test: true }
    }

    pub fn is_test(&self) -> bool {
        self.test
    }

    fn output(node: &NodeInfo) -> Resource {
        Resource::from_local_path(node.obj_dir(), node.target().local_path(), Origin::Object)
    }
}

impl NodeKind for CcBinary {
    fn name(&self) -> &'static str {
        if self.test { "cc_test" } else { "cc_binary" }
    }

    fn parse(
        &mut self,
        node: &mut NodeInfo,
        ctx: &mut ParseContext<'_>,
        reader: &BuildFileNodeReader<'_>,
    ) -> Result<(), NodeError> {
        let target = node.next_target_name(ctx.file);
        let mut library = Node::new(
            target,
            node.shared_environment(),
            Box::new(CcLibrary::default()),
        );
        library.info_mut().copy_dependencies(node);
        library.parse_kind(ctx, reader)?;

        tracing::trace!(
            binary = %node.target(),
            library = %library.target(),
            "synthesized library"
        );
        node.add_subnode(library);
        Ok(())
    }

    fn local_binaries(&self, node: &NodeInfo, lang: Language, outputs: &mut ResourceFileSet) {
        if lang.accepts(LANGUAGES) {
            outputs.add(Self::output(node));
        }
    }

    fn local_final_outputs(&self, node: &NodeInfo, lang: Language, outputs: &mut ResourceFileSet) {
        if lang.accepts(LANGUAGES) {
            outputs.add(Self::output(node));
        }
    }

    fn local_tests(&self, node: &NodeInfo, lang: Language, targets: &mut IndexSet<String>) {
        if self.test && lang.accepts(LANGUAGES) {
            targets.insert(node.target().full_path().to_string());
        }
    }
}
