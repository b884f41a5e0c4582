//! Binding resolution for `{{ ... }}` template expressions
//!
//! Step parameters may reference earlier outputs with spans like
//! `{{ steps['script-step'].outputs.result }}`. Spans are property paths
//! evaluated against a root object whose `steps` key is the execution
//! context, deliberately weaker than the script sandbox (no operators, no
//! calls). Resolution is pure: same template + same context → same value.
//!
//! A string that is exactly one span keeps the resolved value's type; mixed
//! text stringifies each span in place. Missing paths resolve to null; the
//! step implementation downstream decides whether an empty binding matters.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::context::ExecutionContext;

static TEMPLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").unwrap());

/// Resolve a single value. Non-strings pass through unchanged.
pub fn resolve(value: &serde_json::Value, ctx: &ExecutionContext) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => resolve_str(s, &root_object(ctx)),
        other => other.clone(),
    }
}

/// Resolve every string found anywhere inside a value tree.
pub fn resolve_deep(value: &serde_json::Value, ctx: &ExecutionContext) -> serde_json::Value {
    let root = root_object(ctx);
    resolve_deep_inner(value, &root)
}

/// Resolve a template string against the context.
pub fn resolve_template(template: &str, ctx: &ExecutionContext) -> serde_json::Value {
    resolve_str(template, &root_object(ctx))
}

fn root_object(ctx: &ExecutionContext) -> serde_json::Value {
    serde_json::json!({ "steps": ctx.steps_value() })
}

fn resolve_deep_inner(value: &serde_json::Value, root: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => resolve_str(s, root),
        serde_json::Value::Array(items) => serde_json::Value::Array(
            items.iter().map(|v| resolve_deep_inner(v, root)).collect(),
        ),
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_deep_inner(v, root)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_str(template: &str, root: &serde_json::Value) -> serde_json::Value {
    // A lone span keeps the native type of whatever it resolves to.
    if let Some(captures) = TEMPLATE_RE.captures(template) {
        let full = captures.get(0).map(|m| (m.start(), m.end()));
        if full == Some((0, template.len())) {
            let path = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            return lookup_path(path, root).unwrap_or(serde_json::Value::Null);
        }
    } else {
        return serde_json::Value::String(template.to_string());
    }

    let replaced = TEMPLATE_RE.replace_all(template, |captures: &Captures| {
        let path = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        lookup_path(path, root)
            .map(|v| stringify(&v))
            .unwrap_or_default()
    });
    serde_json::Value::String(replaced.into_owned())
}

#[derive(Debug, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

/// Evaluate a property path (`steps['id'].outputs.result`, `steps.0.fields`)
/// against the root object. Any malformed or missing segment yields None.
fn lookup_path(path: &str, root: &serde_json::Value) -> Option<serde_json::Value> {
    let segments = parse_path(path)?;
    let mut current = root;
    for segment in &segments {
        current = match segment {
            PathSegment::Key(key) => match current {
                serde_json::Value::Object(map) => map.get(key)?,
                serde_json::Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            },
            PathSegment::Index(index) => match current {
                serde_json::Value::Array(items) => items.get(*index)?,
                serde_json::Value::Object(map) => map.get(&index.to_string())?,
                _ => return None,
            },
        };
    }
    Some(current.clone())
}

fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let chars: Vec<char> = path.chars().collect();
    let mut segments = Vec::new();
    let mut pos = 0;

    segments.push(PathSegment::Key(parse_identifier(&chars, &mut pos)?));

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                segments.push(PathSegment::Key(parse_identifier(&chars, &mut pos)?));
            }
            '[' => {
                pos += 1;
                match chars.get(pos)? {
                    '\'' | '"' => {
                        let quote = chars[pos];
                        pos += 1;
                        let start = pos;
                        while pos < chars.len() && chars[pos] != quote {
                            pos += 1;
                        }
                        if pos >= chars.len() {
                            return None;
                        }
                        let key: String = chars[start..pos].iter().collect();
                        pos += 1;
                        segments.push(PathSegment::Key(key));
                    }
                    c if c.is_ascii_digit() => {
                        let start = pos;
                        while pos < chars.len() && chars[pos].is_ascii_digit() {
                            pos += 1;
                        }
                        let digits: String = chars[start..pos].iter().collect();
                        segments.push(PathSegment::Index(digits.parse().ok()?));
                    }
                    _ => return None,
                }
                if chars.get(pos) != Some(&']') {
                    return None;
                }
                pos += 1;
            }
            _ => return None,
        }
    }
    Some(segments)
}

fn parse_identifier(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len()
        && (chars[*pos].is_alphanumeric() || chars[*pos] == '_' || chars[*pos] == '$')
    {
        *pos += 1;
    }
    if *pos == start {
        return None;
    }
    Some(chars[start..*pos].iter().collect())
}

/// Render a resolved value into literal template text: null and missing are
/// empty, numbers drop a whole-valued fraction, arrays comma-join, objects
/// render opaquely.
pub fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                // serde_json numbers are always finite; `{}` renders whole
                // floats without a fractional part.
                format!("{}", n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(stringify)
            .collect::<Vec<_>>()
            .join(","),
        serde_json::Value::Object(_) => "[object Object]".to_string(),
    }
}
