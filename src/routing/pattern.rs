//! Route pattern module
//!
//! Parses patterns like `/home/{year:int}/{name}` and matches them against
//! request paths segment by segment.

use percent_encoding::percent_decode_str;
use std::fmt;

use super::context::{ParamValue, Params};
use super::error::{DispatchError, RouterError};

/// Declared type of a path placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Int,
    Float,
    String,
}

impl PlaceholderKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
        }
    }

    /// Convert one decoded segment into a typed value.
    /// Empty segments never convert; `int` takes unsigned ASCII digits only.
    fn coerce(self, segment: &str) -> Option<ParamValue> {
        if segment.is_empty() {
            return None;
        }
        match self {
            Self::Int => {
                if !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                segment.parse().ok().map(ParamValue::Int)
            }
            Self::Float => {
                if segment.starts_with(['+', '-']) {
                    return None;
                }
                segment
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(ParamValue::Float)
            }
            Self::String => Some(ParamValue::String(segment.to_string())),
        }
    }
}

impl fmt::Display for PlaceholderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder { name: String, kind: PlaceholderKind },
}

/// Parsed route pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

/// Result of testing one pattern against one path
#[derive(Debug)]
pub(super) enum PatternMatch {
    /// Literal segments or segment count differ
    NoMatch,
    /// Shape matches but a placeholder rejected its segment
    Coercion(DispatchError),
    Matched(Params),
}

impl PathPattern {
    pub fn parse(raw: &str) -> Result<Self, RouterError> {
        let invalid = |reason: &str| RouterError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let Some(rest) = raw.strip_prefix('/') else {
            return Err(invalid("pattern must start with '/'"));
        };

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for part in rest.split('/') {
                segments.push(parse_segment(part).map_err(|reason| invalid(&reason))?);
            }
        }

        let mut seen = Vec::new();
        for segment in &segments {
            if let Segment::Placeholder { name, .. } = segment {
                if seen.contains(&name) {
                    return Err(invalid(&format!("placeholder '{name}' used twice")));
                }
                seen.push(name);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Two patterns with the same shape collide even if written differently
    /// (`{name}` and `{name:string}`).
    pub fn same_shape(&self, other: &Self) -> bool {
        self.segments == other.segments
    }

    pub(super) fn match_segments(&self, path: &[String]) -> PatternMatch {
        if path.len() != self.segments.len() {
            return PatternMatch::NoMatch;
        }

        let literals_match = self
            .segments
            .iter()
            .zip(path)
            .all(|(segment, actual)| match segment {
                Segment::Literal(text) => text == actual,
                Segment::Placeholder { .. } => true,
            });
        if !literals_match {
            return PatternMatch::NoMatch;
        }

        let mut params = Params::default();
        for (segment, actual) in self.segments.iter().zip(path) {
            if let Segment::Placeholder { name, kind } = segment {
                match kind.coerce(actual) {
                    Some(value) => params.push(name.clone(), value),
                    None => {
                        return PatternMatch::Coercion(DispatchError::PathCoercion {
                            placeholder: name.clone(),
                            kind: *kind,
                            value: actual.clone(),
                        })
                    }
                }
            }
        }
        PatternMatch::Matched(params)
    }
}

fn parse_segment(part: &str) -> Result<Segment, String> {
    let Some(inner) = part.strip_prefix('{') else {
        if part.contains(['{', '}']) {
            return Err(format!("placeholder must fill the whole segment: '{part}'"));
        }
        return Ok(Segment::Literal(part.to_string()));
    };
    let Some(inner) = inner.strip_suffix('}') else {
        return Err(format!("unterminated placeholder: '{part}'"));
    };
    if inner.contains(['{', '}']) {
        return Err(format!("nested braces in placeholder: '{part}'"));
    }

    let (name, kind) = match inner.split_once(':') {
        Some((name, kind_name)) => {
            let kind = PlaceholderKind::from_name(kind_name)
                .ok_or_else(|| format!("unknown placeholder type '{kind_name}'"))?;
            (name, kind)
        }
        None => (inner, PlaceholderKind::String),
    };
    if name.is_empty() {
        return Err("placeholder name is empty".to_string());
    }
    Ok(Segment::Placeholder {
        name: name.to_string(),
        kind,
    })
}

/// Split a raw request path into percent-decoded segments.
///
/// Splitting happens before decoding, so `%2F` stays inside its segment.
/// Returns `None` when a segment does not decode to UTF-8.
pub(super) fn split_path(path: &str) -> Option<Vec<String>> {
    let rest = path.strip_prefix('/').unwrap_or(path);
    if rest.is_empty() {
        return Some(Vec::new());
    }
    rest.split('/')
        .map(|segment| {
            percent_decode_str(segment)
                .decode_utf8()
                .ok()
                .map(|decoded| decoded.into_owned())
        })
        .collect()
}
