//! Outcomes recorded by output declarations.

use crate::distribution::Distribution;
use crate::value::Value;
use rollscript_types::ast::{Expr, OutputMode};
use rollscript_types::ValueType;

/// One logged roll: the dice type and the faces it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DiceRecord {
    pub dice_type: Value,
    pub outcomes: Vec<Value>,
}

/// A named single evaluation and the dice rolled during it.
#[derive(Debug, Clone)]
pub struct RollRecord {
    pub name: String,
    /// The evaluated expression and the type it was coerced to.
    pub expression: Expr,
    pub value_type: ValueType,
    pub value: Value,
    pub dice: Vec<DiceRecord>,
}

/// A named distribution collected by sampling.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    pub name: String,
    pub expression: Expr,
    pub value_type: ValueType,
    pub distribution: Distribution,
}

/// Either kind of record, in evaluation order.
#[derive(Debug, Clone)]
pub enum OutputRecord {
    Roll(RollRecord),
    Sample(SampleRecord),
}

impl OutputRecord {
    pub fn name(&self) -> &str {
        match self {
            OutputRecord::Roll(r) => &r.name,
            OutputRecord::Sample(s) => &s.name,
        }
    }

    pub fn expression(&self) -> &Expr {
        match self {
            OutputRecord::Roll(r) => &r.expression,
            OutputRecord::Sample(s) => &s.expression,
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            OutputRecord::Roll(r) => r.value_type,
            OutputRecord::Sample(s) => s.value_type,
        }
    }

    pub fn mode(&self) -> OutputMode {
        match self {
            OutputRecord::Roll(_) => OutputMode::Roll,
            OutputRecord::Sample(_) => OutputMode::Sample,
        }
    }

    pub fn as_roll(&self) -> Option<&RollRecord> {
        match self {
            OutputRecord::Roll(r) => Some(r),
            OutputRecord::Sample(_) => None,
        }
    }

    pub fn as_sample(&self) -> Option<&SampleRecord> {
        match self {
            OutputRecord::Sample(s) => Some(s),
            OutputRecord::Roll(_) => None,
        }
    }
}
