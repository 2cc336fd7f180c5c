use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexSet;
use indoc::indoc;

use super::*;
use crate::category::{Category, Language};
use crate::error::NodeError;
use crate::kinds::KindRegistry;
use crate::node::{NodeInfo, NodeKind, ParseContext};
use crate::reader::BuildFileNodeReader;
use crate::resource::{Origin, Resource, ResourceFileSet};
use crate::scanner::MemoryScanner;

/// Contributes its own name to every category.
#[derive(Default)]
struct Probe {
    barrier: bool,
    hidden: bool,
    link_private: Vec<TargetInfo>,
}

impl NodeKind for Probe {
    fn name(&self) -> &'static str {
        "probe"
    }

    fn parse(
        &mut self,
        _: &mut NodeInfo,
        ctx: &mut ParseContext<'_>,
        reader: &BuildFileNodeReader<'_>,
    ) -> Result<(), NodeError> {
        self.barrier = reader.parse_bool_field("barrier")?.unwrap_or(false);
        self.hidden = reader.parse_bool_field("hidden")?.unwrap_or(false);
        self.link_private = reader
            .parse_repeated_string("link_private", false)?
            .iter()
            .map(|dependency| ctx.file.compute_target_info(dependency))
            .collect();
        Ok(())
    }

    fn include_child_dependency(&self, category: Category, _: Language, child: &Node) -> bool {
        category != Category::SystemDependencies || !self.link_private.contains(child.target())
    }

    fn should_include(&self, category: Category, _: Language) -> bool {
        !(self.hidden && category == Category::ObjectFiles)
    }

    fn include_dependencies(&self, _: Category, _: Language) -> bool {
        !self.barrier
    }

    fn local_object_files(&self, node: &NodeInfo, _: Language, files: &mut ResourceFileSet) {
        files.add(Resource::from_local_path(
            node.obj_dir(),
            &format!("{}.o", node.target().local_path()),
            Origin::Object,
        ));
    }

    fn local_system_dependencies(&self, node: &NodeInfo, _: Language, deps: &mut IndexSet<String>) {
        deps.insert(node.target().local_path().to_string());
    }

    fn local_include_dirs(&self, node: &NodeInfo, _: Language, dirs: &mut IndexSet<String>) {
        dirs.insert(node.gen_dir().to_string());
    }

    fn local_env_variables(
        &self,
        node: &NodeInfo,
        _: Language,
        env: &mut BTreeMap<String, String>,
    ) {
        env.insert("LAST".into(), node.target().local_path().to_string());
    }
}

fn builder() -> GraphBuilder {
    let mut registry = KindRegistry::empty();
    registry.register("probe", || Box::new(Probe::default()));
    GraphBuilder::with_registry(Arc::new(Environment::default()), registry)
}

fn build(files: &[(&str, &str)]) -> Result<BuildGraph, RepographError> {
    let scanner = MemoryScanner::new();
    let mut builder = builder();
    for (name, text) in files {
        let mut file = BuildFile::new(*name);
        file.parse(text)?;
        builder.add_build_file(&mut file, &scanner)?;
    }
    Ok(builder.finish()?)
}

fn names(nodes: &[NodeRef<'_>]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| node.target().local_path().to_string())
        .collect()
}

const DIAMOND: &str = indoc! {r#"
    [
      { "probe": { "name": "a", "dependencies": [":b", ":c"] } },
      { "probe": { "name": "b", "dependencies": [":d"] } },
      { "probe": { "name": "c", "dependencies": [":d"] } },
      { "probe": { "name": "d" } }
    ]
"#};

#[test]
fn test_diamond() {
    let graph = build(&[("x/BUILD", DIAMOND)]).unwrap();
    let a = graph.find("//x:a").unwrap();

    for category in [Category::ObjectFiles, Category::IncludeDirs, Category::Binaries] {
        assert_eq!(names(&a.all_dependencies(category, Language::Any)), vec!["d", "b", "c"]);
    }

    assert_eq!(
        a.object_files(Language::Any).paths(),
        vec![".gen-obj/x/d.o", ".gen-obj/x/b.o", ".gen-obj/x/c.o", ".gen-obj/x/a.o"]
    );
    assert_eq!(
        a.input_object_files(Language::Any).paths(),
        vec![".gen-obj/x/d.o", ".gen-obj/x/b.o", ".gen-obj/x/c.o"]
    );
}

#[test]
fn test_topological_order() {
    let graph = build(&[(
        "x/BUILD",
        indoc! {r#"
            [
              { "probe": { "name": "top", "dependencies": [":left", ":right", ":base"] } },
              { "probe": { "name": "left", "dependencies": [":mid"] } },
              { "probe": { "name": "right", "dependencies": [":mid", ":base"] } },
              { "probe": { "name": "mid", "dependencies": [":base"] } },
              { "probe": { "name": "base" } }
            ]
        "#},
    )])
    .unwrap();

    for node in graph.iter() {
        let closure = node.all_dependencies(Category::ObjectFiles, Language::Any);
        let position: BTreeMap<_, _> = closure
            .iter()
            .enumerate()
            .map(|(i, n)| (n.index(), i))
            .collect();
        assert_eq!(position.len(), closure.len(), "duplicate in closure of {}", node.target());

        for (i, member) in closure.iter().enumerate() {
            for dependency in member.dependencies() {
                if let Some(&j) = position.get(&dependency.index()) {
                    assert!(j < i, "{} listed after {}", dependency.target(), member.target());
                }
            }
        }
    }

    let order: Vec<_> = graph.order().map(|n| n.target().local_path().to_string()).collect();
    let at = |name: &str| order.iter().position(|n| n == name).unwrap();
    assert!(at("base") < at("mid"));
    assert!(at("mid") < at("left"));
    assert!(at("right") < at("top"));
}

#[test]
fn test_seeded_collection() {
    let graph = build(&[("x/BUILD", DIAMOND)]).unwrap();
    let a = graph.find("//x:a").unwrap();
    let d = graph.find("//x:d").unwrap();

    let mut out = vec![d.index()];
    graph.collect_all_dependencies(a.index(), Category::ObjectFiles, Language::Any, &mut out);
    let collected: Vec<_> = out.iter().map(|&i| graph.node(i)).collect();
    assert_eq!(names(&collected), vec!["d", "b", "c"]);
}

#[test]
fn test_deterministic() {
    let render = || {
        let graph = build(&[("x/BUILD", DIAMOND)]).unwrap();
        graph
            .iter()
            .map(|node| {
                format!(
                    "{:?} {:?} {:?}",
                    node.object_files(Language::Any).paths(),
                    node.include_dirs(Language::Any),
                    node.system_dependencies(Language::Any),
                )
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(render(), render());
}

#[test]
fn test_category_filters() {
    let graph = build(&[(
        "x/BUILD",
        indoc! {r#"
            [
              { "probe": {
                  "name": "app",
                  "dependencies": [":gen", ":private", ":aggregate"],
                  "link_private": [":private"]
              } },
              { "probe": { "name": "gen", "barrier": true, "dependencies": [":tool"] } },
              { "probe": { "name": "tool" } },
              { "probe": { "name": "private" } },
              { "probe": { "name": "aggregate", "hidden": true, "dependencies": [":leaf"] } },
              { "probe": { "name": "leaf" } }
            ]
        "#},
    )])
    .unwrap();
    let app = graph.find("//x:app").unwrap();

    // A barrier is listed, its dependencies are not.
    let includes = app.all_dependencies(Category::IncludeDirs, Language::Any);
    assert_eq!(names(&includes), vec!["gen", "private", "leaf", "aggregate"]);

    // The edge to :private is closed for system dependencies only.
    let system = app.system_dependencies(Language::Any);
    assert!(!system.contains("private"));
    assert!(app.include_dirs(Language::Any).contains(".gen-files/x"));
    assert_eq!(
        system.iter().cloned().collect::<Vec<_>>(),
        vec!["gen", "leaf", "aggregate", "app"]
    );

    // Hidden nodes are not visited, so nothing behind them is reached either.
    let objects = app.all_dependencies(Category::ObjectFiles, Language::Any);
    assert_eq!(names(&objects), vec!["gen", "private"]);
}

#[test]
fn test_env_and_licenses() {
    let graph = build(&[(
        "x/BUILD",
        indoc! {r#"
            [
              { "probe": {
                  "name": "a",
                  "dependencies": [":b"],
                  "env": { "MODE": "release" },
                  "licenses": ["MIT"]
              } },
              { "probe": {
                  "name": "b",
                  "barrier": true,
                  "dependencies": [":c"],
                  "env": { "MODE": "debug", "B": "1" }
              } },
              { "probe": { "name": "c", "licenses": ["GPL"] } }
            ]
        "#},
    )])
    .unwrap();
    let a = graph.find("//x:a").unwrap();

    let env = a.env_variables(Language::Any);
    assert_eq!(env["MODE"], "release");
    assert_eq!(env["B"], "1");
    assert_eq!(env["LAST"], "a");
    assert_eq!(a.input_env_variables(Language::Any)["MODE"], "debug");

    // Licenses ignore barriers.
    let licenses: Vec<_> = a.licenses().into_iter().collect();
    assert_eq!(licenses, vec!["GPL", "MIT"]);
}

#[test]
fn test_input_include_dirs_end_with_roots() {
    let graph = build(&[("x/BUILD", DIAMOND)]).unwrap();
    let d = graph.find("//x:d").unwrap();
    let dirs: Vec<_> = d.input_include_dirs(Language::Any).into_iter().collect();
    assert_eq!(dirs, vec![".", ".gen-src", ".gen-files"]);
}

#[test]
fn test_unresolved() {
    let err = build(&[(
        "x/BUILD",
        r#"[{ "probe": { "name": "a", "dependencies": [":b", "//y:c"] } }]"#,
    )])
    .unwrap_err();

    let RepographError::Graph(GraphError::Unresolved(missing)) = &err else {
        panic!("expected unresolved dependencies, got {err}");
    };
    let missing: Vec<_> = missing.iter().map(|m| m.dependency.as_str()).collect();
    assert_eq!(missing, vec!["//x:b", "//y:c"]);
}

#[test]
fn test_cycle() {
    let err = build(&[(
        "x/BUILD",
        indoc! {r#"
            [
              { "probe": { "name": "a", "dependencies": [":b"] } },
              { "probe": { "name": "b", "dependencies": [":a"] } }
            ]
        "#},
    )])
    .unwrap_err();
    assert!(matches!(err, RepographError::Graph(GraphError::Cycle(_))));
}

#[test]
fn test_duplicate() {
    let err = build(&[(
        "x/BUILD",
        r#"[{ "probe": { "name": "a" } }, { "probe": { "name": "a" } }]"#,
    )])
    .unwrap_err();
    assert_eq!(err.to_string(), "Duplicate target //x:a");
}

#[test]
fn test_record_errors() {
    let err = build(&[("x/BUILD", r#"[{ "rule": { "name": "a" } }]"#)]).unwrap_err();
    assert!(matches!(err, RepographError::Node(NodeError::UnknownKind { .. })));

    let err = build(&[("x/BUILD", r#"[{ "probe": { "srcs": [] } }]"#)]).unwrap_err();
    assert!(matches!(err, RepographError::BuildFile(BuildFileError::MissingName { .. })));

    let err = build(&[("x/BUILD", r#"[{ "probe": { "name": "a", "dependencies": ":b" } }]"#)])
        .unwrap_err();
    assert!(err.to_string().contains("in target //x:a"));
}
