use camino::Utf8PathBuf;
use thiserror::Error;

/// Structural problems in a build file or in one of its records.
#[derive(Debug, Error)]
pub enum BuildFileError {
    #[error(
        "BUILD file reader error\n\nIn {file}:\n {source}\n\n\
         (check for missing/spurious commas)."
    )]
    Syntax {
        file: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("In {file}: expected a list of records at the top level, got: {found}")]
    NotAList { file: Utf8PathBuf, found: String },

    #[error("In {file}: expected a record object, got: {found}")]
    NotARecord { file: Utf8PathBuf, found: String },

    #[error("In {file}: a record must name exactly one kind, got: {found}")]
    AmbiguousKind { file: Utf8PathBuf, found: String },

    #[error("In {file}: \"{kind}\" record has no \"name\" field: {found}")]
    MissingName {
        file: Utf8PathBuf,
        kind: String,
        found: String,
    },

    #[error("Expecting {expected} for key \"{key}\" in target {target}: {found}")]
    FieldType {
        target: String,
        key: String,
        expected: &'static str,
        found: String,
    },
}

/// Failures while resolving file patterns through a scanner.
#[derive(Debug, Error)]
pub enum FileError {
    #[error(
        "No matched files: {pattern} for target {target}\n\nIf this file is generated during \
         compilation, add to your BUILD rule:\n\"strict_file_mode\": false"
    )]
    NoMatch { pattern: String, target: String },

    #[error("Too many results for {key}, need 1 (got {count}): {target}")]
    TooManyMatches {
        key: String,
        target: String,
        count: usize,
    },

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Error raised while turning one record into a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    BuildFile(#[from] BuildFileError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error("Unknown kind \"{kind}\" for target {target}")]
    UnknownKind { kind: String, target: String },

    #[error("Target {0}:\n{1}")]
    Userland(String, anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub target: String,
    pub dependency: String,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Duplicate target {0}")]
    Duplicate(String),

    #[error("Unresolved dependencies:\n{}", format_unresolved(.0))]
    Unresolved(Vec<Unresolved>),

    #[error("Dependency cycle detected at target {0}")]
    Cycle(String),
}

fn format_unresolved(items: &[Unresolved]) -> String {
    items
        .iter()
        .map(|item| format!("  {} (needed by {})", item.dependency, item.target))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum RepographError {
    #[error("Couldn't read build file {0}.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error(transparent)]
    BuildFile(#[from] BuildFileError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Invalid environment configuration.\n{0}")]
    Config(#[from] serde_json::Error),
}
