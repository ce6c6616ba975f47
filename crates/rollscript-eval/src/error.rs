//! Runtime error type for the rollscript evaluator.

use rollscript_types::ast::Expr;
use rollscript_types::Location;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One node an error passed through while unwinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub location: Location,
    /// Rendered source text of the node.
    pub source: String,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.source)
    }
}

/// Fatal evaluation error.
///
/// `trace` lists the expression nodes the error went through, innermost
/// first. Each enclosing node appends itself with [`EvaluationError::at`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
    pub trace: Vec<TraceEntry>,
}

impl EvaluationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Vec::new(),
        }
    }

    /// Append `expr` to the trace.
    pub fn at(mut self, expr: &Expr) -> Self {
        self.trace.push(TraceEntry {
            location: expr.location.clone(),
            source: expr.render(),
        });
        self
    }

    /// Location of the innermost node that has a source location.
    pub fn location(&self) -> Option<&Location> {
        self.trace
            .iter()
            .map(|entry| &entry.location)
            .find(|loc| !loc.is_none())
    }

    /// Message followed by one line per trace entry.
    pub fn report(&self) -> String {
        let mut out = self.message.clone();
        for entry in &self.trace {
            out.push_str("\n  in ");
            out.push_str(&entry.to_string());
        }
        out
    }
}

/// Result alias for evaluator operations.
pub type EvalResult<T> = Result<T, EvaluationError>;
