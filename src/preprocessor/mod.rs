// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Text preprocessor
//!
//! Line-oriented directive language applied to pipeline documents
//! before YAML parsing. Directive lines start with `#!` and are
//! consumed; their effects (conditional inclusion, variable binding,
//! temp-directory allocation, inline inclusion) apply to the
//! following lines. Everything else is emitted with `${VAR}`
//! references expanded.

mod functions;

pub use functions::Function;

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::errors::{DerrickError, DerrickResult};

/// A host-side temporary directory bound to a document variable.
///
/// Entries are appended by `TEMP_DIR`/`TEMP_DIR_IF_EMPTY` and consumed
/// twice: substituted into the document text, and replayed at cleanup
/// time as synthetic `TempDirCleanUp` steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempDirectory {
    /// Variable name the directory is bound to
    pub variable: String,
    /// Host path of the allocated directory
    pub path: PathBuf,
}

/// Result of preprocessing one document
#[derive(Debug, Clone)]
pub struct Preprocessed {
    /// Document text with directives consumed and variables expanded
    pub text: String,
    /// Temp directories allocated while processing
    pub temp_dirs: Vec<TempDirectory>,
}

/// Variable mapping used during preprocessing.
///
/// The ambient (process) environment wins over `SET` bindings on
/// conflict; `TEMP_DIR` bindings override unconditionally because the
/// freshly allocated path must be visible to subsequent lines.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    values: HashMap<String, String>,
    ambient: HashSet<String>,
}

impl Environment {
    pub fn new(ambient: HashMap<String, String>) -> Self {
        let names = ambient.keys().cloned().collect();
        Self {
            values: ambient,
            ambient: names,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_unset_or_empty(&self, name: &str) -> bool {
        self.get(name).map_or(true, str::is_empty)
    }

    /// Bind `name` unless the ambient environment already defines it.
    pub fn set(&mut self, name: &str, value: &str) {
        if !self.ambient.contains(name) {
            self.values.insert(name.to_string(), value.to_string());
        }
    }

    /// Bind `name` unconditionally.
    pub fn bind(&mut self, name: &str, value: &str) {
        self.values.insert(name.to_string(), value.to_string());
    }
}

/// Per-document preprocessing state.
///
/// Created for one document and discarded after its text is emitted;
/// temp-directory entries escape via [`Preprocessed`].
pub(crate) struct Context {
    pub env: Environment,
    pub conditions: Vec<bool>,
    pub temp_dirs: Vec<TempDirectory>,
    pub base_dir: PathBuf,
}

impl Context {
    fn new(ambient: HashMap<String, String>, base_dir: &Path) -> Self {
        Self {
            env: Environment::new(ambient),
            conditions: Vec::new(),
            temp_dirs: Vec::new(),
            base_dir: base_dir.to_path_buf(),
        }
    }

    /// Lines are emitted only while every conditional frame is true.
    pub fn emitting(&self) -> bool {
        self.conditions.iter().all(|frame| *frame)
    }
}

/// The preprocessor: a registry of directive functions plus the
/// line-processing loop.
pub struct Preprocessor {
    functions: BTreeMap<&'static str, Function>,
}

impl Preprocessor {
    /// Create a preprocessor with the built-in function registry.
    pub fn new() -> Self {
        Self {
            functions: functions::builtins(),
        }
    }

    /// Registered functions in name order, for the `statements` verb.
    pub fn functions(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    /// Preprocess one document.
    ///
    /// `base_dir` anchors relative `INCLUDE` and `EXISTS` paths.
    pub fn process(
        &self,
        text: &str,
        ambient: HashMap<String, String>,
        base_dir: &Path,
    ) -> DerrickResult<Preprocessed> {
        let mut ctx = Context::new(ambient, base_dir);
        let mut lines = Vec::new();
        self.process_into(text, &mut ctx, &mut lines)?;
        if !ctx.conditions.is_empty() {
            return Err(DerrickError::UnbalancedConditional);
        }
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(Preprocessed {
            text: out,
            temp_dirs: ctx.temp_dirs,
        })
    }

    /// Process `text` line by line into `out`, sharing `ctx` so that
    /// `INCLUDE` composes with the surrounding state.
    pub(crate) fn process_into(
        &self,
        text: &str,
        ctx: &mut Context,
        out: &mut Vec<String>,
    ) -> DerrickResult<()> {
        for line in text.lines() {
            match parse_directive(line)? {
                Some((name, args)) => self.apply(name, &args, ctx, out)?,
                None => {
                    if ctx.emitting() {
                        out.push(substitute(line, &ctx.env)?);
                    }
                }
            }
        }
        Ok(())
    }

    fn apply(
        &self,
        name: &str,
        args: &[String],
        ctx: &mut Context,
        out: &mut Vec<String>,
    ) -> DerrickResult<()> {
        match self.functions.get(name) {
            // Conditional functions always run so nesting stays balanced
            // inside suppressed regions.
            Some(f) if f.conditional || ctx.emitting() => f.apply(self, args, ctx, out),
            Some(_) => Ok(()),
            None if ctx.emitting() => Err(DerrickError::UnknownDirective {
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a directive line into function name and raw arguments.
///
/// Returns `Ok(None)` for ordinary text lines.
fn parse_directive(line: &str) -> DerrickResult<Option<(&str, Vec<String>)>> {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix("#!") else {
        return Ok(None);
    };
    let mut parts = rest.split_whitespace();
    let Some(name) = parts.next() else {
        return Err(DerrickError::MalformedDirective {
            directive: line.trim().to_string(),
        });
    };
    if !name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        || !name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(DerrickError::MalformedDirective {
            directive: line.trim().to_string(),
        });
    }
    Ok(Some((name, parts.map(String::from).collect())))
}

fn variable_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid variable pattern")
    })
}

/// Expand every `${VAR}` reference in `text` against `env`.
///
/// A single left-to-right pass; inserted text is not re-expanded, so
/// the expansion is idempotent over text without further references.
pub(crate) fn substitute(text: &str, env: &Environment) -> DerrickResult<String> {
    let pattern = variable_pattern();
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for caps in pattern.captures_iter(text) {
        let whole = caps.get(0).expect("match group");
        let name = &caps[1];
        let value = env
            .get(name)
            .ok_or_else(|| DerrickError::UnresolvedVariable {
                name: name.to_string(),
            })?;
        result.push_str(&text[last..whole.start()]);
        result.push_str(value);
        last = whole.end();
    }
    result.push_str(&text[last..]);
    Ok(result)
}

/// Parse a literal `${NAME}` token into `NAME`.
pub(crate) fn variable_name(token: &str) -> Option<&str> {
    let inner = token.strip_prefix("${")?.strip_suffix('}')?;
    let valid = inner.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && inner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(text: &str, vars: &[(&str, &str)]) -> DerrickResult<Preprocessed> {
        let ambient = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Preprocessor::new().process(text, ambient, Path::new("."))
    }

    #[test]
    fn test_plain_text_passes_through() {
        let out = process("a\nb\n", &[]).unwrap();
        assert_eq!(out.text, "a\nb\n");
        assert!(out.temp_dirs.is_empty());
    }

    #[test]
    fn test_substitution() {
        let out = process("image: ${IMG}\n", &[("IMG", "alpine")]).unwrap();
        assert_eq!(out.text, "image: alpine\n");
    }

    #[test]
    fn test_unresolved_variable() {
        let err = process("image: ${MISSING}\n", &[]).unwrap_err();
        assert!(matches!(err, DerrickError::UnresolvedVariable { name } if name == "MISSING"));
    }

    #[test]
    fn test_substitution_is_single_pass() {
        let out = process("x: ${A}\n", &[("A", "${B}"), ("B", "never")]).unwrap();
        assert_eq!(out.text, "x: ${B}\n");
    }

    #[test]
    fn test_if_defined() {
        let text = "#! IF DEFINED FLAG\nyes\n#! END_IF\nalways\n";
        let out = process(text, &[("FLAG", "1")]).unwrap();
        assert_eq!(out.text, "yes\nalways\n");
        let out = process(text, &[]).unwrap();
        assert_eq!(out.text, "always\n");
    }

    #[test]
    fn test_if_not_with_else() {
        let text = "#! IF_NOT DEFINED FLAG\nunset\n#! ELSE\nset\n#! END_IF\n";
        let out = process(text, &[]).unwrap();
        assert_eq!(out.text, "unset\n");
        let out = process(text, &[("FLAG", "x")]).unwrap();
        assert_eq!(out.text, "set\n");
    }

    #[test]
    fn test_nested_conditionals() {
        let text = "#! IF DEFINED A\n#! IF DEFINED B\nboth\n#! END_IF\nouter\n#! END_IF\n";
        let out = process(text, &[("A", "1"), ("B", "1")]).unwrap();
        assert_eq!(out.text, "both\nouter\n");
        let out = process(text, &[("A", "1")]).unwrap();
        assert_eq!(out.text, "outer\n");
        // Inner predicate must not be evaluated inside a dead region.
        let out = process(text, &[]).unwrap();
        assert_eq!(out.text, "");
    }

    #[test]
    fn test_suppressed_lines_are_not_expanded() {
        let text = "#! IF DEFINED FLAG\n${UNDEFINED}\n#! END_IF\n";
        assert!(process(text, &[]).is_ok());
    }

    #[test]
    fn test_unbalanced_conditional() {
        let err = process("#! IF DEFINED A\n", &[]).unwrap_err();
        assert!(matches!(err, DerrickError::UnbalancedConditional));
        let err = process("#! END_IF\n", &[]).unwrap_err();
        assert!(matches!(err, DerrickError::UnbalancedConditional));
    }

    #[test]
    fn test_equals_and_empty_predicates() {
        let text = "#! IF EQUALS ${MODE} release\nrelease\n#! END_IF\n";
        let out = process(text, &[("MODE", "release")]).unwrap();
        assert_eq!(out.text, "release\n");

        let text = "#! IF EMPTY MODE\nempty\n#! END_IF\n";
        let out = process(text, &[("MODE", "")]).unwrap();
        assert_eq!(out.text, "empty\n");
        let out = process(text, &[("MODE", "x")]).unwrap();
        assert_eq!(out.text, "");
    }

    #[test]
    fn test_unknown_predicate() {
        let err = process("#! IF BOGUS X\n#! END_IF\n", &[]).unwrap_err();
        assert!(matches!(err, DerrickError::UnknownPredicate { name } if name == "BOGUS"));
    }

    #[test]
    fn test_unknown_directive() {
        let err = process("#! FROBNICATE\n", &[]).unwrap_err();
        assert!(matches!(err, DerrickError::UnknownDirective { name } if name == "FROBNICATE"));
    }

    #[test]
    fn test_set_binds_and_ambient_wins() {
        let out = process("#! SET NAME web\nname: ${NAME}\n", &[]).unwrap();
        assert_eq!(out.text, "name: web\n");
        let out = process("#! SET NAME web\nname: ${NAME}\n", &[("NAME", "db")]).unwrap();
        assert_eq!(out.text, "name: db\n");
    }

    #[test]
    fn test_echo() {
        let out = process("#! SET WHO world\n#! ECHO hello ${WHO}\n", &[]).unwrap();
        assert_eq!(out.text, "hello world\n");
    }

    #[test]
    fn test_temp_dir_binds_and_registers() {
        let out = process("#! TEMP_DIR ${SCRATCH}\npath: ${SCRATCH}\n", &[]).unwrap();
        assert_eq!(out.temp_dirs.len(), 1);
        let entry = &out.temp_dirs[0];
        assert_eq!(entry.variable, "SCRATCH");
        assert!(entry.path.is_dir());
        assert!(out.text.contains(&format!("path: {}", entry.path.display())));
        std::fs::remove_dir_all(&entry.path).unwrap();
    }

    #[test]
    fn test_temp_dir_if_empty_respects_existing_binding() {
        let out = process(
            "#! TEMP_DIR_IF_EMPTY ${SCRATCH}\npath: ${SCRATCH}\n",
            &[("SCRATCH", "/data/fixed")],
        )
        .unwrap();
        assert!(out.temp_dirs.is_empty());
        assert_eq!(out.text, "path: /data/fixed\n");

        let out = process("#! TEMP_DIR_IF_EMPTY ${SCRATCH}\n", &[("SCRATCH", "")]).unwrap();
        assert_eq!(out.temp_dirs.len(), 1);
        std::fs::remove_dir_all(&out.temp_dirs[0].path).unwrap();
    }

    #[test]
    fn test_temp_dir_requires_variable_token() {
        let err = process("#! TEMP_DIR SCRATCH\n", &[]).unwrap_err();
        assert!(matches!(err, DerrickError::MalformedDirective { .. }));
    }

    #[test]
    fn test_include() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part.yml"), "included: true\n").unwrap();
        let pre = Preprocessor::new();
        let out = pre
            .process("#! INCLUDE part.yml\nafter: 1\n", HashMap::new(), dir.path())
            .unwrap();
        assert_eq!(out.text, "included: true\nafter: 1\n");
    }

    #[test]
    fn test_include_inside_dead_region_is_skipped() {
        let pre = Preprocessor::new();
        let out = pre
            .process(
                "#! IF DEFINED FLAG\n#! INCLUDE missing.yml\n#! END_IF\n",
                HashMap::new(),
                Path::new("."),
            )
            .unwrap();
        assert_eq!(out.text, "");
    }

    #[test]
    fn test_idempotent_on_directive_free_text() {
        let text = "version: \"2.0\"\nsteps:\n  a:\n    image: alpine\n";
        let once = process(text, &[]).unwrap();
        let twice = process(&once.text, &[]).unwrap();
        assert_eq!(once.text, twice.text);
    }

    #[test]
    fn test_directive_with_leading_whitespace() {
        let out = process("  #! SET X 1\nx: ${X}\n", &[]).unwrap();
        assert_eq!(out.text, "x: 1\n");
    }

    #[test]
    fn test_statements_listing_covers_builtins() {
        let pre = Preprocessor::new();
        let names: Vec<&str> = pre.functions().map(|f| f.name()).collect();
        for expected in [
            "ECHO", "ELSE", "END_IF", "IF", "IF_NOT", "INCLUDE", "SET", "TEMP_DIR",
            "TEMP_DIR_IF_EMPTY",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        for f in pre.functions() {
            assert!(!f.usage().is_empty());
        }
    }
}
