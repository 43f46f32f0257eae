use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range in a script source, plus the 1-based line and column where it starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub lo: u32,
    pub hi: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(lo: u32, hi: u32, line: u32, column: u32) -> Span {
        Span {
            lo,
            hi,
            line,
            column,
        }
    }

    /// Span starting at `self` and ending where `other` ends.
    pub fn to(self, other: Span) -> Span {
        Span {
            hi: other.hi.max(self.hi),
            ..self
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
