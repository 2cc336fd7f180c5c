use camino::{Utf8Path, Utf8PathBuf};

/// Installs a global `tracing` subscriber reading its filter from `RUST_LOG`.
#[cfg(feature = "logging")]
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}

/// Joins two slash paths, treating an empty side as absent.
pub(crate) fn join_path(a: impl AsRef<str>, b: impl AsRef<str>) -> String {
    let (a, b) = (a.as_ref(), b.as_ref());
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ if b.starts_with('/') => b.to_string(),
        _ => format!("{}/{}", a.trim_end_matches('/'), b),
    }
}

/// Lexically normalizes `.` and `..` components; no file system access.
pub(crate) fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else if !absolute {
                    parts.push("..");
                }
            }
            _ => parts.push(part),
        }
    }

    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

pub(crate) fn num_path_components(path: &str) -> usize {
    path.split('/').filter(|part| !part.is_empty()).count()
}

/// `a/b/c` starts with `a/b` but not with `a/bc`. An empty prefix matches all.
pub(crate) fn has_path_prefix(path: &str, prefix: &str) -> bool {
    prefix.is_empty() || Utf8Path::new(path).starts_with(prefix)
}

pub(crate) fn strip_path_prefix(path: &str, prefix: &str) -> Option<Utf8PathBuf> {
    if prefix.is_empty() {
        return Some(Utf8PathBuf::from(path));
    }
    Utf8Path::new(path)
        .strip_prefix(prefix)
        .ok()
        .map(Utf8Path::to_path_buf)
}
