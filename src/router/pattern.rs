//! Route matcher: compiled `/`-delimited path patterns with `:name` captures.
//!
//! Matching is deliberately literal. The request path is split on `/` exactly
//! as the pattern is, so the segment counts must agree: `/foo` and `/foo/`
//! never match each other. There are no wildcards and no optional segments.

use std::collections::HashSet;
use std::fmt;

use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::context::PathParams;

/// Prefix that turns a pattern segment into a named capture.
const CAPTURE: char = ':';

/// Registration-time problems with a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("route pattern {pattern:?} must start with '/'")]
    MissingLeadingSlash { pattern: String },

    #[error("route pattern {pattern:?} has an unnamed capture in segment {index}")]
    EmptyCapture { pattern: String, index: usize },

    #[error("route pattern {pattern:?} captures `{name}` more than once")]
    DuplicateCapture { pattern: String, name: String },
}

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Parameter(String),
}

/// A compiled route pattern.
///
/// # Examples
///
/// ```
/// use strata::router::Pattern;
///
/// let pattern = Pattern::parse("/hello/:name").unwrap();
/// let params = pattern.matches("/hello/Fox%20Mulder").unwrap();
/// assert_eq!(params.get("name"), Some("Fox Mulder"));
///
/// assert!(pattern.matches("/hello").is_none());
/// assert!(pattern.matches("/hello/Fox/").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile `raw` into a pattern.
    ///
    /// The pattern is split on every `/`, keeping empty segments, so `/` is two
    /// empty segments and `/foo/` is three.
    ///
    /// # Errors
    ///
    /// - [`PatternError::MissingLeadingSlash`]: `raw` does not start with `/`.
    /// - [`PatternError::EmptyCapture`]: a segment is a bare `:`.
    /// - [`PatternError::DuplicateCapture`]: two segments capture the same name.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash {
                pattern: raw.to_owned(),
            });
        }

        let mut seen = HashSet::new();
        let mut segments = Vec::new();

        for (index, part) in raw.split('/').enumerate() {
            let segment = match part.strip_prefix(CAPTURE) {
                Some("") => {
                    return Err(PatternError::EmptyCapture {
                        pattern: raw.to_owned(),
                        index,
                    });
                }
                Some(name) => {
                    if !seen.insert(name) {
                        return Err(PatternError::DuplicateCapture {
                            pattern: raw.to_owned(),
                            name: name.to_owned(),
                        });
                    }
                    Segment::Parameter(name.to_owned())
                }
                None => Segment::Static(part.to_owned()),
            };
            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_owned(),
            segments,
        })
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of the captures, in path order.
    pub fn captures(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Parameter(name) => Some(name.as_str()),
            Segment::Static(_) => None,
        })
    }

    /// Try to match an encoded request path.
    ///
    /// Each request segment is percent-decoded before comparison, so captures
    /// hold decoded values and literal segments compare against decoded text.
    /// A match always yields a (possibly empty) [`PathParams`].
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        if path.split('/').count() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(path.split('/')) {
            let decoded = percent_decode_str(part).decode_utf8_lossy();
            match segment {
                Segment::Static(literal) => {
                    if *literal != decoded {
                        return None;
                    }
                }
                Segment::Parameter(name) => params.insert(name.clone(), decoded.into_owned()),
            }
        }

        Some(params)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> Pattern {
        Pattern::parse(raw).unwrap()
    }

    // ── Pattern::parse ────────────────────────────────────────────────────────

    #[test]
    fn parse_root_is_two_empty_segments() {
        let pat = pattern("/");
        assert_eq!(
            pat.segments,
            vec![Segment::Static(String::new()), Segment::Static(String::new())]
        );
    }

    #[test]
    fn parse_keeps_trailing_slash() {
        assert_eq!(pattern("/users/").segments.len(), 3);
        assert_eq!(pattern("/users").segments.len(), 2);
    }

    #[test]
    fn parse_captures() {
        let pat = pattern("/users/:id/posts/:post_id");
        assert_eq!(pat.captures().collect::<Vec<_>>(), vec!["id", "post_id"]);
        assert_eq!(pat.to_string(), "/users/:id/posts/:post_id");
    }

    #[test]
    fn parse_rejects_relative_pattern() {
        assert_eq!(
            Pattern::parse("users").unwrap_err(),
            PatternError::MissingLeadingSlash {
                pattern: "users".into()
            }
        );
    }

    #[test]
    fn parse_rejects_unnamed_capture() {
        assert!(matches!(
            Pattern::parse("/users/:"),
            Err(PatternError::EmptyCapture { index: 2, .. })
        ));
    }

    #[test]
    fn parse_rejects_duplicate_capture() {
        assert!(matches!(
            Pattern::parse("/a/:id/b/:id"),
            Err(PatternError::DuplicateCapture { name, .. }) if name == "id"
        ));
    }

    // ── Pattern::matches ──────────────────────────────────────────────────────

    #[test]
    fn literal_match_yields_empty_params() {
        let params = pattern("/users").matches("/users").unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn literal_miss() {
        assert!(pattern("/users").matches("/posts").is_none());
    }

    #[test]
    fn root_matches_only_root() {
        let pat = pattern("/");
        assert!(pat.matches("/").is_some());
        assert!(pat.matches("/other").is_none());
        assert!(pat.matches("").is_none());
    }

    #[test]
    fn segment_count_must_agree() {
        assert!(pattern("/foo").matches("/foo/bar").is_none());
        assert!(pattern("/foo/").matches("/foo").is_none());
        assert!(pattern("/foo").matches("/foo/").is_none());
        assert!(pattern("/users/:id").matches("/users/42/extra").is_none());
    }

    #[test]
    fn capture_extracts_values() {
        let params = pattern("/users/:id/posts/:post_id")
            .matches("/users/7/posts/99")
            .unwrap();
        assert_eq!(params.get("id"), Some("7"));
        assert_eq!(params.get("post_id"), Some("99"));
    }

    #[test]
    fn capture_is_percent_decoded() {
        let params = pattern("/hello/:name")
            .matches("/hello/Fox%20Mulder")
            .unwrap();
        assert_eq!(params.get("name"), Some("Fox Mulder"));
    }

    #[test]
    fn capture_may_be_empty() {
        let params = pattern("/users/:id").matches("/users/").unwrap();
        assert_eq!(params.get("id"), Some(""));
    }

    #[test]
    fn literal_compares_decoded_bytes_exactly() {
        assert!(pattern("/caf\u{e9}").matches("/caf%C3%A9").is_some());
        assert!(pattern("/Users").matches("/users").is_none());
    }
}
