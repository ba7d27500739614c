// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 derrick contributors

//! Built-in preprocessor functions
//!
//! Each function is a registry entry carrying an apply function and a
//! usage description; the `preprocessor statements` verb enumerates
//! the registry.

use std::collections::BTreeMap;
use std::path::Path;

use super::{substitute, variable_name, Context, Preprocessor, TempDirectory};
use crate::errors::{DerrickError, DerrickResult};

type ApplyFn = fn(&Preprocessor, &[String], &mut Context, &mut Vec<String>) -> DerrickResult<()>;

/// A registered preprocessor function.
pub struct Function {
    name: &'static str,
    usage: &'static str,
    /// Conditional functions run even inside suppressed regions to
    /// keep the nesting balanced.
    pub(crate) conditional: bool,
    apply: ApplyFn,
}

impl Function {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn usage(&self) -> &'static str {
        self.usage
    }

    pub(crate) fn apply(
        &self,
        preprocessor: &Preprocessor,
        args: &[String],
        ctx: &mut Context,
        out: &mut Vec<String>,
    ) -> DerrickResult<()> {
        (self.apply)(preprocessor, args, ctx, out)
    }
}

/// The built-in registry, keyed by function name.
pub(crate) fn builtins() -> BTreeMap<&'static str, Function> {
    let functions = [
        Function {
            name: "IF",
            usage: "IF <predicate>\n  Emit the following lines only while <predicate> holds.\n  Predicates: DEFINED <var>, EMPTY <var>, EQUALS <a> <b>, EXISTS <path>.",
            conditional: true,
            apply: apply_if,
        },
        Function {
            name: "IF_NOT",
            usage: "IF_NOT <predicate>\n  Emit the following lines only while <predicate> does not hold.",
            conditional: true,
            apply: apply_if_not,
        },
        Function {
            name: "ELSE",
            usage: "ELSE\n  Flip the innermost open conditional.",
            conditional: true,
            apply: apply_else,
        },
        Function {
            name: "END_IF",
            usage: "END_IF\n  Close the innermost open conditional.",
            conditional: true,
            apply: apply_end_if,
        },
        Function {
            name: "SET",
            usage: "SET <var> <value>\n  Bind <var> for the rest of the document. Bindings from the\n  process environment take precedence.",
            conditional: false,
            apply: apply_set,
        },
        Function {
            name: "TEMP_DIR",
            usage: "TEMP_DIR ${<var>}\n  Allocate a fresh host temp directory, bind <var> to its path and\n  register it for clean-up.",
            conditional: false,
            apply: apply_temp_dir,
        },
        Function {
            name: "TEMP_DIR_IF_EMPTY",
            usage: "TEMP_DIR_IF_EMPTY ${<var>}\n  Like TEMP_DIR, but only when <var> is unset or empty.",
            conditional: false,
            apply: apply_temp_dir_if_empty,
        },
        Function {
            name: "INCLUDE",
            usage: "INCLUDE <path>\n  Substitute the referenced file's preprocessed content inline.",
            conditional: false,
            apply: apply_include,
        },
        Function {
            name: "ECHO",
            usage: "ECHO <text>\n  Emit <text> verbatim to the output stream.",
            conditional: false,
            apply: apply_echo,
        },
    ];
    functions.into_iter().map(|f| (f.name, f)).collect()
}

fn malformed(name: &str, args: &[String]) -> DerrickError {
    let mut directive = format!("#! {name}");
    for arg in args {
        directive.push(' ');
        directive.push_str(arg);
    }
    DerrickError::MalformedDirective { directive }
}

fn evaluate_predicate(args: &[String], ctx: &Context) -> DerrickResult<bool> {
    let Some((name, rest)) = args.split_first() else {
        return Err(malformed("IF", args));
    };
    match (name.as_str(), rest) {
        ("DEFINED", [var]) => Ok(ctx.env.is_defined(var)),
        ("EMPTY", [var]) => Ok(ctx.env.is_unset_or_empty(var)),
        ("EQUALS", [a, b]) => {
            Ok(substitute(a, &ctx.env)? == substitute(b, &ctx.env)?)
        }
        ("EXISTS", [path]) => {
            let path = substitute(path, &ctx.env)?;
            let path = Path::new(&path);
            let resolved = if path.is_absolute() {
                path.to_path_buf()
            } else {
                ctx.base_dir.join(path)
            };
            Ok(resolved.exists())
        }
        ("DEFINED" | "EMPTY" | "EQUALS" | "EXISTS", _) => Err(malformed(name, rest)),
        _ => Err(DerrickError::UnknownPredicate {
            name: name.to_string(),
        }),
    }
}

fn apply_if(
    _pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    _out: &mut Vec<String>,
) -> DerrickResult<()> {
    // Inside a dead region the predicate is not evaluated; the frame
    // only tracks nesting.
    let value = if ctx.emitting() {
        evaluate_predicate(args, ctx)?
    } else {
        false
    };
    ctx.conditions.push(value);
    Ok(())
}

fn apply_if_not(
    pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    out: &mut Vec<String>,
) -> DerrickResult<()> {
    let emitting = ctx.emitting();
    apply_if(pre, args, ctx, out)?;
    if emitting {
        if let Some(frame) = ctx.conditions.last_mut() {
            *frame = !*frame;
        }
    }
    Ok(())
}

fn apply_else(
    _pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    _out: &mut Vec<String>,
) -> DerrickResult<()> {
    if !args.is_empty() {
        return Err(malformed("ELSE", args));
    }
    match ctx.conditions.last_mut() {
        Some(frame) => {
            *frame = !*frame;
            Ok(())
        }
        None => Err(DerrickError::UnbalancedConditional),
    }
}

fn apply_end_if(
    _pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    _out: &mut Vec<String>,
) -> DerrickResult<()> {
    if !args.is_empty() {
        return Err(malformed("END_IF", args));
    }
    ctx.conditions
        .pop()
        .map(|_| ())
        .ok_or(DerrickError::UnbalancedConditional)
}

fn apply_set(
    _pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    _out: &mut Vec<String>,
) -> DerrickResult<()> {
    let Some((name, rest)) = args.split_first() else {
        return Err(malformed("SET", args));
    };
    let value = substitute(&rest.join(" "), &ctx.env)?;
    ctx.env.set(name, &value);
    Ok(())
}

fn allocate_temp_dir(name: &str, ctx: &mut Context) -> DerrickResult<()> {
    let dir = tempfile::Builder::new()
        .prefix("derrick-")
        .tempdir()
        .map_err(|e| DerrickError::TempDirAllocation {
            message: e.to_string(),
        })?;
    let path = dir.into_path();
    ctx.env.bind(name, &path.to_string_lossy());
    ctx.temp_dirs.push(TempDirectory {
        variable: name.to_string(),
        path,
    });
    Ok(())
}

fn apply_temp_dir(
    _pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    _out: &mut Vec<String>,
) -> DerrickResult<()> {
    match args {
        [token] => {
            let name = variable_name(token)
                .ok_or_else(|| malformed("TEMP_DIR", args))?
                .to_string();
            allocate_temp_dir(&name, ctx)
        }
        _ => Err(malformed("TEMP_DIR", args)),
    }
}

fn apply_temp_dir_if_empty(
    _pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    _out: &mut Vec<String>,
) -> DerrickResult<()> {
    match args {
        [token] => {
            let name = variable_name(token)
                .ok_or_else(|| malformed("TEMP_DIR_IF_EMPTY", args))?
                .to_string();
            if ctx.env.is_unset_or_empty(&name) {
                allocate_temp_dir(&name, ctx)?;
            }
            Ok(())
        }
        _ => Err(malformed("TEMP_DIR_IF_EMPTY", args)),
    }
}

fn apply_include(
    pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    out: &mut Vec<String>,
) -> DerrickResult<()> {
    let [path] = args else {
        return Err(malformed("INCLUDE", args));
    };
    let path = substitute(path, &ctx.env)?;
    let path = Path::new(&path);
    let resolved = if path.is_absolute() {
        path.to_path_buf()
    } else {
        ctx.base_dir.join(path)
    };
    let text = std::fs::read_to_string(&resolved).map_err(|e| DerrickError::FileRead {
        path: resolved.clone(),
        error: e.to_string(),
    })?;
    pre.process_into(&text, ctx, out)
}

fn apply_echo(
    _pre: &Preprocessor,
    args: &[String],
    ctx: &mut Context,
    out: &mut Vec<String>,
) -> DerrickResult<()> {
    out.push(substitute(&args.join(" "), &ctx.env)?);
    Ok(())
}
