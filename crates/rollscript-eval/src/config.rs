//! Evaluation context settings.

use rollscript_types::ast::OutputMode;
use rollscript_types::ValueType;
use serde::{Deserialize, Serialize};

/// Settings of an [`EvaluationContext`](crate::EvaluationContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Repetitions of a `sample` output.
    pub sample_size: u32,
    /// Type used where an expression asks for the default type.
    pub default_type: ValueType,
    /// Mode used by outputs declared without one.
    pub default_output_mode: OutputMode,
    /// Calls are refused once a scope reaches this depth.
    pub max_call_depth: u32,
    /// Ceiling on `repeat` iterations, whatever the written limit.
    pub max_reroll: i64,
    /// Whether dice rolls are appended to the dice log.
    pub log_dice: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            sample_size: 30_000,
            default_type: ValueType::Any,
            default_output_mode: OutputMode::Roll,
            max_call_depth: 100,
            max_reroll: 1000,
            log_dice: true,
        }
    }
}
