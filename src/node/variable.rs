use std::collections::BTreeMap;

/// Escapes text for use as a make variable value.
pub fn escape(value: &str) -> String {
    value.replace('$', "$$").replace('\n', "\\n")
}

/// A make-style variable owned by one node, optionally switched on a
/// condition variable (`ifeq ($(COND),1)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MakeVariable {
    name: String,
    /// condition => (value if set, value otherwise); "" is unconditional.
    conditions: BTreeMap<String, (String, String)>,
}

impl MakeVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            conditions: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `$(name)`, or nothing for an unnamed variable.
    pub fn ref_name(&self) -> String {
        if self.name.is_empty() {
            String::new()
        } else {
            format!("$({})", self.name)
        }
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.set_condition("", value, "");
    }

    pub fn set_condition(
        &mut self,
        condition: impl Into<String>,
        if_value: impl Into<String>,
        else_value: impl Into<String>,
    ) {
        self.conditions
            .insert(condition.into(), (if_value.into(), else_value.into()));
    }

    pub fn value(&self) -> Option<&str> {
        self.conditions.get("").map(|(value, _)| value.as_str())
    }

    /// Renders the assignment in make syntax.
    pub fn render(&self) -> String {
        if self.name.is_empty() {
            return String::new();
        }

        let name = &self.name;
        let mut out = format!("{name} := {}\n", self.value().unwrap_or(""));
        for (condition, (if_value, else_value)) in &self.conditions {
            if condition.is_empty() {
                continue;
            }
            out.push_str(&format!("ifeq ($({condition}),1)\n\t{name} := {if_value}"));
            if !else_value.is_empty() {
                out.push_str(&format!("\nelse\n\t{name} := {else_value}"));
            }
            out.push_str("\nendif\n");
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_plain() {
        let mut var = MakeVariable::new("cc_flags.a/b");
        var.set_value("-O2");
        assert_eq!(var.ref_name(), "$(cc_flags.a/b)");
        assert_eq!(var.render(), "cc_flags.a/b := -O2\n\n");
    }

    #[test]
    fn test_render_conditional() {
        let mut var = MakeVariable::new("v");
        var.set_condition("DEBUG", "-g", "-O2");
        assert_eq!(
            var.render(),
            "v := \nifeq ($(DEBUG),1)\n\tv := -g\nelse\n\tv := -O2\nendif\n\n"
        );
    }

    #[test]
    fn test_unnamed() {
        let var = MakeVariable::default();
        assert_eq!(var.ref_name(), "");
        assert_eq!(var.render(), "");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("$HOME"), "$$HOME");
    }
}
