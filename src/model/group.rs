//! Dot-separated label hierarchy attached to fields.

use std::fmt;

/// A field group such as `Rentals.Dates`.
///
/// Segments are trimmed and empty segments are dropped, so `"A..B "` and
/// `"A.B"` describe the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupPath(Vec<String>);

impl GroupPath {
    /// Parse a dot-separated path. Returns `None` when no segment survives.
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<String> = path
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(Self(segments))
        }
    }

    /// Top-level segment.
    pub fn root(&self) -> &str {
        &self.0[0]
    }

    /// Segments below the root.
    pub fn rest(&self) -> &[String] {
        &self.0[1..]
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}
