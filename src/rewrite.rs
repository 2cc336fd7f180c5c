//! Text substitution for build-file fields and redirection of dependency
//! references across build files.

use std::collections::HashMap;

use crate::target::TargetInfo;

/// A literal token to replacement table.
///
/// Replacement is a single left-to-right pass. At every position the longest
/// matching token wins, and substituted text is never scanned again, so
/// applying the map to its own output changes nothing unless a replacement
/// value itself spells a token.
#[derive(Debug, Clone, Default)]
pub struct VarMap {
    vars: HashMap<String, String>,
    /// Tokens ordered longest first.
    order: Vec<String>,
}

impl VarMap {
    pub fn set(&mut self, token: impl Into<String>, replacement: impl Into<String>) {
        let token = token.into();
        if token.is_empty() {
            return;
        }
        if self.vars.insert(token.clone(), replacement.into()).is_none() {
            self.order.push(token);
            self.order
                .sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        }
    }

    pub fn replace(&self, input: &str) -> String {
        if self.order.is_empty() {
            return input.to_string();
        }

        let mut output = String::with_capacity(input.len());
        let mut rest = input;

        'outer: while let Some(ch) = rest.chars().next() {
            for token in &self.order {
                if rest.starts_with(token.as_str()) {
                    output.push_str(&self.vars[token]);
                    rest = &rest[token.len()..];
                    continue 'outer;
                }
            }
            output.push(ch);
            rest = &rest[ch.len_utf8()..];
        }

        output
    }
}

/// Two independent substitution tables over the same symbolic names.
///
/// `mode == false` renders a field for use inside the declaring directory,
/// `mode == true` renders it relative to the build root.
#[derive(Debug, Clone, Default)]
pub struct VariableRewriter {
    local: VarMap,
    rooted: VarMap,
}

impl VariableRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `$NAME`, `$(NAME)` and `${NAME}` for the given mode.
    pub fn set(&mut self, mode: bool, name: &str, replacement: &str) {
        let map = if mode { &mut self.rooted } else { &mut self.local };
        map.set(format!("${name}"), replacement);
        map.set(format!("$({name})"), replacement);
        map.set(format!("${{{name}}}"), replacement);
    }

    pub fn rewrite(&self, mode: bool, input: &str) -> String {
        if mode {
            self.rooted.replace(input)
        } else {
            self.local.replace(input)
        }
    }
}

/// Redirects a dependency reference while it is being resolved.
///
/// Returning `true` claims the reference and stops the rewriter chain.
pub trait DependencyRewriter: Send + Sync {
    fn rewrite_dependency(&self, target: &mut TargetInfo) -> bool;
}

/// Maps every target under `//from` onto the same relative target under `//to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixRewriter {
    from: String,
    to: String,
}

impl PrefixRewriter {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into().trim_matches('/').to_string(),
            to: to.into().trim_matches('/').to_string(),
        }
    }
}

impl DependencyRewriter for PrefixRewriter {
    fn rewrite_dependency(&self, target: &mut TargetInfo) -> bool {
        let Some(rest) = crate::utils::strip_path_prefix(target.dir(), &self.from) else {
            return false;
        };

        let dir = crate::utils::join_path(&self.to, rest.as_str());
        let rewritten = target.relocated(&dir);
        tracing::debug!(from = %target, to = %rewritten, "rewrote dependency");
        *target = rewritten;

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewriter() -> VariableRewriter {
        let mut vars = VariableRewriter::new();
        vars.set(false, "GEN_DIR", ".gen-files/a");
        vars.set(true, "GEN_DIR", "$(ROOT_DIR)/.gen-files/a");
        vars.set(false, "GEN_SRC_DIR", ".gen-src/a");
        vars
    }

    #[test]
    fn test_all_token_forms() {
        let vars = rewriter();
        assert_eq!(vars.rewrite(false, "$GEN_DIR/x.h"), ".gen-files/a/x.h");
        assert_eq!(vars.rewrite(false, "$(GEN_DIR)/x.h"), ".gen-files/a/x.h");
        assert_eq!(vars.rewrite(false, "${GEN_DIR}/x.h"), ".gen-files/a/x.h");
        assert_eq!(vars.rewrite(false, "-I$(GEN_SRC_DIR)"), "-I.gen-src/a");
    }

    #[test]
    fn test_modes_are_independent() {
        let vars = rewriter();
        assert_eq!(vars.rewrite(true, "$(GEN_DIR)"), "$(ROOT_DIR)/.gen-files/a");
        // Not registered for the rooted mode.
        assert_eq!(vars.rewrite(true, "$(GEN_SRC_DIR)"), "$(GEN_SRC_DIR)");
    }

    #[test]
    fn test_rooted_rewrite_is_idempotent() {
        let vars = rewriter();
        let once = vars.rewrite(true, "cp x $(GEN_DIR)/y");
        assert_eq!(vars.rewrite(true, &once), once);
    }

    #[test]
    fn test_unknown_tokens_untouched() {
        let vars = rewriter();
        assert_eq!(vars.rewrite(false, "$(OTHER) $ ünï"), "$(OTHER) $ ünï");
    }

    #[test]
    fn test_prefix_rewriter() {
        let rw = PrefixRewriter::new("github.com/foo", "third_party/foo");

        let mut t = TargetInfo::new("//github.com/foo/bar:baz");
        assert!(rw.rewrite_dependency(&mut t));
        assert_eq!(t.full_path(), "//third_party/foo/bar:baz");

        let mut t = TargetInfo::from_relative("//github.com/foo:y", "app/BUILD.json");
        assert!(rw.rewrite_dependency(&mut t));
        assert_eq!(t.full_path(), "//third_party/foo:y");
        assert_eq!(t.build_file().as_str(), "third_party/foo/BUILD.json");

        let mut t = TargetInfo::new("//github.com/foobar:x");
        assert!(!rw.rewrite_dependency(&mut t));
        assert_eq!(t.full_path(), "//github.com/foobar:x");
    }
}
