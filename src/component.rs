use crate::core::Environment;
use crate::utils::{has_path_prefix, join_path, strip_path_prefix};

/// Maps files under `base_dir` to the import path `component`.
///
/// A node keeps a list of helpers ordered from the most specific directory to
/// the least, always ending in a catch-all helper with an empty `base_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentHelper {
    component: String,
    base_dir: String,
}

impl ComponentHelper {
    pub fn new(component: impl Into<String>, base_dir: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            base_dir: base_dir.into(),
        }
    }

    pub fn catch_all() -> Self {
        Self::new("", "")
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn base_dir(&self) -> &str {
        &self.base_dir
    }

    pub fn is_catch_all(&self) -> bool {
        self.base_dir.is_empty()
    }

    pub fn covers_path(&self, env: &Environment, path: &str) -> bool {
        has_path_prefix(&env.strip_special_dirs(path), &self.base_dir)
    }

    /// `base_dir/x/y.h` becomes `component/x/y.h`; the generated, source and
    /// object roots are stripped first. Uncovered paths come back stripped.
    pub fn rewrite_file(&self, env: &Environment, path: &str) -> String {
        let stripped = env.strip_special_dirs(path);
        match strip_path_prefix(&stripped, &self.base_dir) {
            Some(rest) => join_path(&self.component, rest.as_str()),
            None => stripped,
        }
    }
}
