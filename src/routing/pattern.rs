//! Path template compilation and matching.
//!
//! # Responsibilities
//! - Compile a template such as `/users/:id` into literal and parameter segments
//! - Match a request path segment by segment and bind parameters in order
//!
//! # Design Decisions
//! - Structural matching, no regex: a path matches only when it has the same
//!   number of `/`-separated segments as the template
//! - Literal comparison is case-sensitive
//! - Both sides are percent-decoded per segment before comparison

use std::borrow::Cow;
use std::collections::HashMap;

/// Marker that turns a segment into a named parameter.
const PARAM_MARKER: char = ':';

/// Path parameters bound by a successful match.
pub type Params = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route path template.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl PathPattern {
    /// Compile `template`. Every segment is mandatory; a segment starting with
    /// `:` captures the corresponding path segment under the following name.
    pub fn compile(template: &str) -> Self {
        let segments: Vec<Segment> = template
            .split('/')
            .map(|segment| match segment.strip_prefix(PARAM_MARKER) {
                Some(name) if !name.is_empty() => Segment::Param(name.to_string()),
                _ => Segment::Literal(decode_segment(segment).into_owned()),
            })
            .collect();

        let param_names = segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.clone()),
                Segment::Literal(_) => None,
            })
            .collect();

        Self {
            raw: template.to_string(),
            segments,
            param_names,
        }
    }

    /// The template this pattern was compiled from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parameter names in template order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Number of `/`-separated segments, including the empty leading one.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Match `path` against this pattern.
    ///
    /// Returns `None` when the segment counts differ or a literal segment
    /// differs; otherwise the bound parameters (a repeated name keeps the
    /// right-most value).
    pub fn matches(&self, path: &str) -> Option<Params> {
        if path.split('/').count() != self.segments.len() {
            return None;
        }

        let mut params = Params::with_capacity(self.param_names.len());
        for (expected, actual) in self.segments.iter().zip(path.split('/')) {
            let actual = decode_segment(actual);
            match expected {
                Segment::Literal(literal) => {
                    if literal.as_str() != actual.as_ref() {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), actual.into_owned());
                }
            }
        }
        Some(params)
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Percent-decode one segment; undecodable input is compared as-is.
fn decode_segment(segment: &str) -> Cow<'_, str> {
    if !segment.contains('%') {
        return Cow::Borrowed(segment);
    }
    urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment))
}
