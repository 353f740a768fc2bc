//! Placeholder templates
//!
//! Templates are YAML text with `{{ key }}` placeholders resolved through
//! [`CanonicalConfig`]. A placeholder that makes up a whole plain scalar is
//! emitted as a typed YAML scalar: names are always quoted strings, so a
//! name such as `12345` or `a #b` survives parsing intact. Placeholders
//! embedded in longer text are substituted verbatim. Rendering is plain
//! substitution: no I/O, no clock, no randomness.

use cfunc_resource::{ResourceDocument, Value};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::ConfigurationError;
use crate::reconcile::CanonicalConfig;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("invalid placeholder regex")
});

/// Line text allowed before a placeholder that is a whole scalar: indent,
/// sequence dashes and an optional `key: `
static SCALAR_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:-\s+)*(?:[A-Za-z0-9_.\-/]+:\s+)?$").expect("invalid scalar prefix regex")
});

fn is_whole_scalar(text: &str, start: usize, end: usize) -> bool {
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    let line_end = text[end..].find('\n').map_or(text.len(), |i| end + i);
    SCALAR_PREFIX.is_match(&text[line_start..start]) && text[end..line_end].trim().is_empty()
}

fn scalar_text(value: &Value) -> Result<String, ConfigurationError> {
    match value {
        Value::String(s) => {
            serde_json::to_string(s).map_err(|err| ConfigurationError::InvalidTemplate {
                message: err.to_string(),
            })
        }
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(ConfigurationError::InvalidTemplate {
            message: format!("placeholder resolved to a non-scalar {other:?}"),
        }),
    }
}

/// Substitute every placeholder in `text`
///
/// # Errors
/// Returns [`ConfigurationError::UnresolvedReference`] for the first unknown
/// key, or [`ConfigurationError::InvalidTemplate`] for a `{{` that does not
/// open a well-formed placeholder
pub fn render_text(text: &str, config: &CanonicalConfig) -> Result<String, ConfigurationError> {
    let mut failure = None;
    let rendered = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let key = &caps[1];
        let Some(whole) = caps.get(0) else {
            return String::new();
        };
        let resolved = if is_whole_scalar(text, whole.start(), whole.end()) {
            config
                .lookup_scalar(key)
                .map(|value| scalar_text(&value))
                .transpose()
        } else {
            Ok(config.lookup(key))
        };
        match resolved {
            Ok(Some(value)) => value,
            Ok(None) => {
                failure.get_or_insert_with(|| ConfigurationError::unresolved(key.to_string()));
                String::new()
            }
            Err(err) => {
                failure.get_or_insert(err);
                String::new()
            }
        }
    });
    if let Some(err) = failure {
        return Err(err);
    }

    let stray = PLACEHOLDER
        .split(text)
        .find(|literal| literal.contains("{{") || literal.contains("}}"));
    if let Some(literal) = stray {
        return Err(ConfigurationError::InvalidTemplate {
            message: format!("malformed placeholder near '{}'", literal.trim()),
        });
    }

    Ok(rendered.into_owned())
}

/// Render a template to a YAML value
///
/// # Errors
/// Returns error on unresolved references or YAML that does not parse
pub fn render_value(text: &str, config: &CanonicalConfig) -> Result<Value, ConfigurationError> {
    let rendered = render_text(text, config)?;
    serde_yaml::from_str(&rendered).map_err(|err| ConfigurationError::InvalidTemplate {
        message: err.to_string(),
    })
}

/// Render a template to a resource document
///
/// # Errors
/// Returns error on unresolved references, or if the result is not a
/// single YAML mapping
pub fn render_document(
    text: &str,
    config: &CanonicalConfig,
) -> Result<ResourceDocument, ConfigurationError> {
    let value = render_value(text, config)?;
    ResourceDocument::from_value(value).map_err(|err| ConfigurationError::InvalidTemplate {
        message: err.to_string(),
    })
}

/// Placeholder keys referenced by a template, in order of appearance
#[must_use]
pub fn references(text: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}
