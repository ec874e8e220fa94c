//! Environment variable interpolation for config files.
//!
//! Supported forms:
//! - `$VAR` or `${VAR}` - substitute, error if unset
//! - `${VAR:-default}` - default when VAR is unset or empty
//! - `${VAR-default}` - default only when VAR is unset
//! - `$$` - literal `$`

use regex::{Captures, Regex};
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<escape>\$\$)
        |
        \$\{
            (?P<braced>[A-Za-z_][A-Za-z0-9_]*)
            (?:(?P<op>:?-)(?P<default>[^}]*))?
        \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("env var pattern is a valid regex")
});

/// Outcome of interpolating a config text.
#[derive(Debug)]
pub struct InterpolationResult {
    pub text: String,
    /// One message per unresolved or rejected variable.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate against the process environment.
pub fn interpolate(input: &str) -> InterpolationResult {
    interpolate_with(input, |name| std::env::var(name).ok())
}

/// Interpolate against an arbitrary variable lookup.
///
/// Every problem is collected so a config with several missing variables
/// reports all of them in one pass.
pub fn interpolate_with<F>(input: &str, lookup: F) -> InterpolationResult
where
    F: Fn(&str) -> Option<String>,
{
    let mut errors = Vec::new();

    let text = ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            if caps.name("escape").is_some() {
                return "$".to_string();
            }
            let original = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let Some(name) = caps.name("braced").or_else(|| caps.name("bare")) else {
                return original.to_string();
            };
            let name = name.as_str();
            let op = caps.name("op").map(|m| m.as_str());
            let default = caps.name("default").map(|m| m.as_str());

            match lookup(name) {
                Some(value) if value.contains(['\n', '\r']) => {
                    errors.push(format!(
                        "environment variable '{name}' contains newlines, which is not allowed"
                    ));
                    original.to_string()
                }
                Some(value) if value.is_empty() && op == Some(":-") => {
                    default.unwrap_or_default().to_string()
                }
                Some(value) => value,
                None => match default {
                    Some(default) => default.to_string(),
                    None => {
                        errors.push(format!("environment variable '{name}' is not set"));
                        original.to_string()
                    }
                },
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}
