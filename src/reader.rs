use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::core::Environment;
use crate::error::{BuildFileError, FileError, NodeError};
use crate::resource::{Origin, Resource};
use crate::rewrite::VariableRewriter;
use crate::scanner::FileScanner;
use crate::utils::join_path;

/// Descends `a.b.c` through nested objects. Missing keys and non-object
/// intermediates read as absent.
fn get_value<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    match current {
        Value::Null => None,
        value => Some(value),
    }
}

fn describe(value: &Value) -> String {
    const MAX: usize = 200;
    let text = value.to_string();
    match text.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text,
    }
}

/// Reads typed fields out of one record's field object.
///
/// String values pass through a [`VariableRewriter`] on the way out; file
/// patterns are expanded with a [`FileScanner`].
pub struct BuildFileNodeReader<'a> {
    fields: &'a Map<String, Value>,
    scanner: &'a dyn FileScanner,
    vars: VariableRewriter,
    abs_prefix: Vec<String>,
    strict_file_mode: bool,
    error_path: String,
    file_path: String,
    environment: Option<&'a Environment>,
}

impl<'a> BuildFileNodeReader<'a> {
    pub fn new(fields: &'a Map<String, Value>, scanner: &'a dyn FileScanner) -> Self {
        Self {
            fields,
            scanner,
            vars: VariableRewriter::new(),
            abs_prefix: Vec::new(),
            strict_file_mode: true,
            error_path: String::new(),
            file_path: String::new(),
            environment: None,
        }
    }

    pub fn set_replace_variable(&mut self, mode: bool, original: &str, replace: &str) {
        self.vars.set(mode, original, replace);
    }

    pub fn add_file_abs_prefix(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        if !prefix.is_empty() {
            self.abs_prefix.push(prefix);
        }
    }

    pub fn set_strict_file_mode(&mut self, strict: bool) {
        self.strict_file_mode = strict;
    }

    pub fn strict_file_mode(&self) -> bool {
        self.strict_file_mode
    }

    /// Target name used in error messages.
    pub fn set_error_path(&mut self, path: impl Into<String>) {
        self.error_path = path.into();
    }

    /// Directory relative file patterns are joined to.
    pub fn set_file_path(&mut self, path: impl Into<String>) {
        self.file_path = path.into();
    }

    /// Layout used to tag matched files with their origin. Without one every
    /// relative match counts as a source file.
    pub fn set_environment(&mut self, environment: &'a Environment) {
        self.environment = Some(environment);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        self.fields
    }

    pub fn rewrite_single_string(&self, mode: bool, input: &str) -> String {
        self.vars.rewrite(mode, input)
    }

    fn type_error(&self, key: &str, expected: &'static str, found: &Value) -> BuildFileError {
        BuildFileError::FieldType {
            target: self.error_path.clone(),
            key: key.to_string(),
            expected,
            found: describe(found),
        }
    }

    pub fn parse_repeated_string(
        &self,
        key: &str,
        mode: bool,
    ) -> Result<Vec<String>, BuildFileError> {
        let Some(value) = get_value(self.fields, key) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(self.type_error(key, "array", value));
        };

        items
            .iter()
            .map(|item| match item {
                Value::String(text) => {
                    let output = self.rewrite_single_string(mode, text);
                    tracing::trace!(key, mode, input = %text, %output, "parsed string");
                    Ok(output)
                }
                other => Err(self.type_error(key, "string items", other)),
            })
            .collect()
    }

    /// A flat `{ "NAME": "value" }` object, values rewritten in local mode.
    pub fn parse_key_value_strings(
        &self,
        key: &str,
    ) -> Result<BTreeMap<String, String>, BuildFileError> {
        let Some(value) = get_value(self.fields, key) else {
            return Ok(BTreeMap::new());
        };
        let Value::Object(list) = value else {
            return Err(self.type_error(key, "object", value));
        };

        let mut output = BTreeMap::new();
        for (name, value) in list {
            let Value::String(text) = value else {
                return Err(self.type_error(&format!("{key}.{name}"), "string", value));
            };
            output.insert(name.clone(), self.rewrite_single_string(false, text));
        }
        Ok(output)
    }

    pub fn parse_string_field(
        &self,
        key: &str,
        mode: bool,
    ) -> Result<Option<String>, BuildFileError> {
        match get_value(self.fields, key) {
            None => Ok(None),
            Some(Value::String(text)) => Ok(Some(self.rewrite_single_string(mode, text))),
            Some(other) => Err(self.type_error(key, "string", other)),
        }
    }

    pub fn parse_bool_field(&self, key: &str) -> Result<Option<bool>, BuildFileError> {
        match get_value(self.fields, key) {
            None => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(other) => Err(self.type_error(key, "boolean", other)),
        }
    }

    pub fn parse_repeated_files(
        &self,
        key: &str,
        strict: bool,
    ) -> Result<Vec<Resource>, NodeError> {
        let patterns = self.parse_repeated_string(key, false)?;
        Ok(self.parse_files_from_strings(&patterns, strict)?)
    }

    /// Expands every pattern through the scanner.
    ///
    /// Patterns under one of the absolute prefixes are taken verbatim, the
    /// rest are joined to the declaring directory. A pattern without matches
    /// is an error in strict mode; otherwise it names a file that some other
    /// step will generate.
    pub fn parse_files_from_strings(
        &self,
        input: &[String],
        strict: bool,
    ) -> Result<Vec<Resource>, FileError> {
        let mut output = Vec::new();

        for file in input {
            let is_absolute = file.starts_with('/')
                || self
                    .abs_prefix
                    .iter()
                    .any(|prefix| crate::utils::has_path_prefix(file, prefix));
            let pattern = if is_absolute {
                file.clone()
            } else {
                join_path(&self.file_path, file)
            };

            let matches = self.scanner.initialize_for_file(&pattern)?;
            if matches.is_empty() {
                if strict {
                    return Err(FileError::NoMatch {
                        pattern: file.clone(),
                        target: self.error_path.clone(),
                    });
                }
                tracing::debug!(
                    %pattern,
                    target = %self.error_path,
                    "no match, assuming generated"
                );
                output.push(Resource::from_root_path(pattern, Origin::Generated));
            } else {
                output.extend(matches.into_iter().map(|path| {
                    let origin = match self.environment {
                        Some(env) => env.classify(path.as_str()),
                        None if path.as_str().starts_with('/') => Origin::Absolute,
                        None => Origin::Source,
                    };
                    Resource::from_root_path(path, origin)
                }));
            }
        }

        Ok(output)
    }

    pub fn parse_single_file(&self, key: &str, strict: bool) -> Result<Vec<Resource>, NodeError> {
        match self.parse_string_field(key, false)? {
            Some(file) => Ok(self.parse_files_from_strings(&[file], strict)?),
            None => Ok(Vec::new()),
        }
    }

    /// A field that must expand to at most one path.
    pub fn parse_single_directory(&self, key: &str) -> Result<Option<Resource>, NodeError> {
        let mut dirs = self.parse_single_file(key, self.strict_file_mode)?;
        if dirs.len() > 1 {
            return Err(FileError::TooManyMatches {
                key: key.to_string(),
                target: self.error_path.clone(),
                count: dirs.len(),
            }
            .into());
        }
        Ok(dirs.pop())
    }
}
