//! `{{var}}` prompt templates.
//!
//! `{{config.a.b}}` is resolved once at load time from the effective config
//! tree; any other `{{name}}` is a runtime variable filled per call.
//! `\{{` produces a literal `{{`.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    /// `\{{`, kept distinct so config resolution can pass it through untouched.
    EscapedOpen,
    Var(&'a str),
}

fn tokenize(template: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while !rest.is_empty() {
        let escape = rest.find("\\{{");
        let open = rest.find("{{");

        match (escape, open) {
            (Some(e), Some(o)) if e < o => {
                push_text(&mut segments, &rest[..e]);
                segments.push(Segment::EscapedOpen);
                rest = &rest[e + 3..];
            }
            (_, Some(o)) => {
                push_text(&mut segments, &rest[..o]);
                let after = &rest[o + 2..];
                let close = after.find("}}").with_context(|| {
                    format!("Unclosed template variable: {{{{{}", after.trim())
                })?;
                segments.push(Segment::Var(after[..close].trim()));
                rest = &after[close + 2..];
            }
            (_, None) => {
                push_text(&mut segments, rest);
                rest = "";
            }
        }
    }

    Ok(segments)
}

fn push_text<'a>(segments: &mut Vec<Segment<'a>>, text: &'a str) {
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
}

/// Resolve `{{config.*}}` variables from the TOML value tree.
/// Runtime variables and escapes are left as-is.
pub fn resolve_config_vars(template: &str, toml_value: &toml::Value) -> Result<String> {
    let mut result = String::with_capacity(template.len());

    for segment in tokenize(template)? {
        match segment {
            Segment::Text(text) => result.push_str(text),
            Segment::EscapedOpen => result.push_str("\\{{"),
            Segment::Var(name) => match name.strip_prefix("config.") {
                Some(path) => {
                    let value = lookup_toml_path(toml_value, path)
                        .with_context(|| format!("Config variable not found: {{{{{name}}}}}"))?;
                    result.push_str(&toml_value_to_string(value));
                }
                None => {
                    result.push_str("{{");
                    result.push_str(name);
                    result.push_str("}}");
                }
            },
        }
    }

    Ok(result)
}

/// Fill runtime `{{var}}` placeholders and unescape `\{{`.
/// Unknown variables are left in place so they show up when debugging a prompt.
pub fn resolve_runtime_vars(template: &str, vars: &HashMap<&str, String>) -> String {
    let Ok(segments) = tokenize(template) else {
        // Load-time validation rejects malformed templates.
        return template.to_string();
    };

    let mut result = String::with_capacity(template.len());
    for segment in segments {
        match segment {
            Segment::Text(text) => result.push_str(text),
            Segment::EscapedOpen => result.push_str("{{"),
            Segment::Var(name) => match vars.get(name) {
                Some(value) => result.push_str(value),
                None => {
                    result.push_str("{{");
                    result.push_str(name);
                    result.push_str("}}");
                }
            },
        }
    }
    result
}

/// Validate that every `{{...}}` is either a resolvable `config.*` path or in the
/// allowed runtime set.
pub fn validate_template(
    template: &str,
    toml_value: &toml::Value,
    allowed_runtime: &[&str],
) -> Result<()> {
    for segment in tokenize(template)? {
        let Segment::Var(name) = segment else {
            continue;
        };

        if let Some(path) = name.strip_prefix("config.") {
            lookup_toml_path(toml_value, path)
                .with_context(|| format!("Config variable not found: {{{{{name}}}}}"))?;
        } else if !allowed_runtime.contains(&name) {
            bail!(
                "Unknown template variable: {{{{{}}}}}. Allowed runtime vars: {:?}",
                name,
                allowed_runtime
            );
        }
    }

    Ok(())
}

/// Walk the TOML value tree by dotted path (e.g., "identity.region").
fn lookup_toml_path<'a>(value: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// Convert a TOML value to its string representation for template substitution.
fn toml_value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Integer(i) => i.to_string(),
        toml::Value::Float(f) => f.to_string(),
        toml::Value::Boolean(b) => b.to_string(),
        toml::Value::Array(arr) => arr
            .iter()
            .map(toml_value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        toml::Value::Table(_) => "[table]".to_string(),
        toml::Value::Datetime(dt) => dt.to_string(),
    }
}
