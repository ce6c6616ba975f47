use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location of an expression node.
///
/// Lines and columns are 1-based. A location without a source name is
/// [`Location::NONE`], used for synthesized nodes (literals produced by
/// reduction or substitution, implicit outputs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Location {
    pub source: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl Location {
    /// The location of synthesized nodes.
    pub const NONE: Location = Location {
        source: None,
        line: 0,
        column: 0,
    };

    /// Create a new location.
    pub fn new(source: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            source: Some(source.into()),
            line,
            column,
        }
    }

    /// Whether this location points nowhere.
    pub fn is_none(&self) -> bool {
        self.source.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}:{}:{}", source, self.line, self.column),
            None => write!(f, "<none>"),
        }
    }
}
