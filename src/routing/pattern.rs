//! Route pattern syntax: literals, `:name` parameters and optional groups.
//!
//! `/blog(/:slug)?` and `/blog[/:slug]` are equivalent. A parameter matches one path
//! segment. Optional groups nest. Patterns compile to an anchored regex at boot.

use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Part {
    Literal(String),
    Param(String),
    Optional(Vec<Part>),
}

#[derive(Clone, Debug)]
pub struct RoutePattern {
    source: String,
    parts: Vec<Part>,
    regex: Regex,
    params: Vec<String>,
}

impl RoutePattern {
    pub fn parse(source: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPattern {
            pattern: source.to_string(),
            reason,
        };
        let mut chars = source.chars().peekable();
        let parts = parse_parts(&mut chars, None).map_err(invalid)?;

        let mut params = Vec::new();
        collect_params(&parts, &mut params);
        let mut seen = HashSet::new();
        for p in &params {
            if !seen.insert(p.as_str()) {
                return Err(invalid(format!("parameter ':{}' appears twice", p)));
            }
        }

        let mut expr = String::from("^");
        push_regex(&parts, &mut expr);
        expr.push('$');
        let regex = Regex::new(&expr).map_err(|e| invalid(e.to_string()))?;

        Ok(RoutePattern {
            source: source.to_string(),
            parts,
            regex,
            params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parameter names in declaration order.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params.iter().any(|p| p == name)
    }

    /// Match a path; returns only the parameters that actually matched, percent-decoded.
    pub fn captures(&self, path: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(path)?;
        let mut out = HashMap::new();
        for name in &self.params {
            if let Some(m) = caps.name(name) {
                out.insert(name.clone(), decode(m.as_str()));
            }
        }
        Some(out)
    }

    /// Build a path. Required parameters fall back to `defaults`; optional groups are emitted
    /// only when the caller supplied a non-empty value for every parameter inside them.
    /// Err carries the name of a missing required parameter.
    pub fn assemble(
        &self,
        params: &HashMap<String, String>,
        defaults: &HashMap<String, String>,
    ) -> Result<String, String> {
        let (path, _) = assemble_group(&self.parts, params, defaults, false)?
            .unwrap_or_default();
        Ok(path)
    }
}

fn parse_parts(chars: &mut Peekable<Chars<'_>>, closer: Option<char>) -> Result<Vec<Part>, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    while let Some(c) = chars.next() {
        match c {
            '(' | '[' => {
                flush_literal(&mut literal, &mut parts);
                let close = if c == '(' { ')' } else { ']' };
                let inner = parse_parts(chars, Some(close))?;
                if c == '(' && chars.next_if_eq(&'?').is_none() {
                    return Err("group '(...)' must be marked optional with '?'".into());
                }
                parts.push(Part::Optional(inner));
            }
            ')' | ']' => {
                if closer == Some(c) {
                    flush_literal(&mut literal, &mut parts);
                    return Ok(parts);
                }
                return Err(format!("unbalanced '{}'", c));
            }
            ':' => {
                flush_literal(&mut literal, &mut parts);
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err("parameter without a name".into());
                }
                if name.starts_with(|ch: char| ch.is_ascii_digit()) {
                    return Err(format!("parameter ':{}' must not start with a digit", name));
                }
                parts.push(Part::Param(name));
            }
            other => literal.push(other),
        }
    }
    if let Some(close) = closer {
        return Err(format!("missing '{}'", close));
    }
    flush_literal(&mut literal, &mut parts);
    Ok(parts)
}

fn flush_literal(literal: &mut String, parts: &mut Vec<Part>) {
    if !literal.is_empty() {
        parts.push(Part::Literal(std::mem::take(literal)));
    }
}

fn collect_params(parts: &[Part], out: &mut Vec<String>) {
    for part in parts {
        match part {
            Part::Param(name) => out.push(name.clone()),
            Part::Optional(inner) => collect_params(inner, out),
            Part::Literal(_) => {}
        }
    }
}

fn push_regex(parts: &[Part], out: &mut String) {
    for part in parts {
        match part {
            Part::Literal(l) => out.push_str(&regex::escape(l)),
            Part::Param(name) => {
                out.push_str("(?P<");
                out.push_str(name);
                out.push_str(">[^/]+)");
            }
            Part::Optional(inner) => {
                out.push_str("(?:");
                push_regex(inner, out);
                out.push_str(")?");
            }
        }
    }
}

/// Raw segment text is kept when it does not decode to UTF-8.
fn decode(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(value) => value.into_owned(),
        Err(e) => {
            tracing::debug!(segment = raw, error = %e, "route parameter is not valid UTF-8 once decoded");
            raw.to_string()
        }
    }
}

/// Ok(None): an optional group that must be dropped. Ok(Some((text, supplied))).
fn assemble_group(
    parts: &[Part],
    params: &HashMap<String, String>,
    defaults: &HashMap<String, String>,
    optional: bool,
) -> Result<Option<(String, bool)>, String> {
    let mut out = String::new();
    let mut supplied = false;
    for part in parts {
        match part {
            Part::Literal(l) => out.push_str(l),
            Part::Param(name) => match params.get(name).filter(|v| !v.is_empty()) {
                Some(v) => {
                    out.push_str(&urlencoding::encode(v));
                    supplied = true;
                }
                None if optional => return Ok(None),
                None => match defaults.get(name).filter(|v| !v.is_empty()) {
                    Some(v) => out.push_str(&urlencoding::encode(v)),
                    None => return Err(name.clone()),
                },
            },
            Part::Optional(inner) => {
                if let Some((segment, true)) = assemble_group(inner, params, defaults, true)? {
                    out.push_str(&segment);
                    supplied = true;
                }
            }
        }
    }
    Ok(Some((out, supplied)))
}
