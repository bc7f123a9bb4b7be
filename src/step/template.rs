// src/step/template.rs

//! Rendering of command templates.
//!
//! Templates see two maps, `inputs` and `outputs`, holding the paths exactly
//! as declared (relative to the process's base directory):
//!
//! ```text
//! sort {{ inputs.raw }} -o {{ outputs.sorted }}
//! ```
//!
//! Referencing an undeclared name is an error rather than an empty string.

use std::collections::BTreeMap;

use minijinja::{context, Environment, UndefinedBehavior};

use crate::errors::{PipedagError, Result};
use crate::types::CommandTemplate;

fn build_env() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env
}

/// Render the template text against the declared inputs and outputs.
pub fn render(
    source: &str,
    inputs: &BTreeMap<String, String>,
    outputs: &BTreeMap<String, String>,
) -> Result<String> {
    build_env()
        .render_str(source, context! { inputs => inputs, outputs => outputs })
        .map_err(|e| PipedagError::Template(e.to_string()))
}

/// Render `template` and turn it into an argument vector.
///
/// A shell template becomes `bash -c <rendered>`; a command-line template is
/// split with shell quoting rules.
pub fn render_command(
    template: &CommandTemplate,
    inputs: &BTreeMap<String, String>,
    outputs: &BTreeMap<String, String>,
) -> Result<Vec<String>> {
    let rendered = render(template.source(), inputs, outputs)?;

    let argv = match template {
        CommandTemplate::Shell(_) => vec!["bash".to_string(), "-c".to_string(), rendered],
        CommandTemplate::CommandLine(_) => shlex::split(&rendered).ok_or_else(|| {
            PipedagError::Template(format!("unbalanced quoting in command line: {rendered}"))
        })?,
    };

    if argv.is_empty() || argv[0].is_empty() {
        return Err(PipedagError::Template("empty command line".to_string()));
    }
    Ok(argv)
}
