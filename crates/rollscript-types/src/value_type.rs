use crate::ParseNameError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The type an expression is requested to evaluate as.
///
/// The seven concrete variants mirror the runtime value variants. `Any`
/// keeps the natural value of the expression, and `Default` defers to the
/// evaluation context's configured default type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Default,
    Any,
    Undef,
    Boolean,
    Integer,
    String,
    List,
    Map,
    Function,
}

impl ValueType {
    pub const ALL: [ValueType; 9] = [
        ValueType::Default,
        ValueType::Any,
        ValueType::Undef,
        ValueType::Boolean,
        ValueType::Integer,
        ValueType::String,
        ValueType::List,
        ValueType::Map,
        ValueType::Function,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Default => "default",
            ValueType::Any => "any",
            ValueType::Undef => "undef",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::String => "string",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Function => "function",
        }
    }

    /// Whether this names one of the seven value variants.
    pub fn is_concrete(&self) -> bool {
        !matches!(self, ValueType::Default | ValueType::Any)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| ParseNameError::new("value type", s))
    }
}
