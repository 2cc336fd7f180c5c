/// One purpose-specific view of the dependency graph.
///
/// Each category is collected and filtered independently, so a node can be
/// part of the include-directory closure of a target without contributing to
/// its link line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Category {
    EnvVariables,
    DependencyFiles,
    ObjectFiles,
    SystemDependencies,
    FinalOutputs,
    Binaries,
    Tests,
    LinkFlags,
    CompileFlags,
    IncludeDirs,
}

impl Category {
    /// Categories that only matter while compiling, as opposed to linking or
    /// running.
    pub fn is_compile_time(self) -> bool {
        matches!(
            self,
            Category::CompileFlags | Category::IncludeDirs | Category::DependencyFiles
        )
    }
}

/// Language filter applied while collecting a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Language {
    /// No filter.
    #[default]
    Any,
    C,
    Cpp,
    Go,
    Java,
    Python,
}

impl Language {
    /// Whether a node written in one of `langs` should answer a query for `self`.
    pub fn accepts(self, langs: &[Language]) -> bool {
        self == Language::Any || langs.contains(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        let cc = [Language::C, Language::Cpp];
        assert!(Language::Any.accepts(&cc));
        assert!(Language::Cpp.accepts(&cc));
        assert!(!Language::Java.accepts(&cc));
    }
}
