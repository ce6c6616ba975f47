//! Rolling dice of any type.
//!
//! An integer `N` is a fair die numbered `1..=N`, a list is a die whose
//! faces are its elements, a map is a die whose faces are its entries and
//! a function is called to produce the outcome.

use crate::context::EvaluationContext;
use crate::error::{EvalResult, EvaluationError};
use crate::scope::Scope;
use crate::value::Value;
use indexmap::IndexMap;
use rand::{Rng, RngCore};
use rollscript_types::ValueType;

/// Parameter name that marks a function as a bulk roller.
pub const BULK_PARAMETER: &str = "N";

impl EvaluationContext {
    /// Roll one die of `dice_type` from `scope` and log the outcome.
    ///
    /// Function dice are called one level deeper than `scope`.
    pub fn roll_one(&mut self, scope: &Scope, dice_type: &Value) -> EvalResult<Value> {
        let outcome = self.roll_unlogged(scope, dice_type)?;
        self.record_dice(dice_type, std::slice::from_ref(&outcome));
        Ok(outcome)
    }

    /// Roll `n` dice of `dice_type` and log the outcomes as one entry.
    ///
    /// A function with a parameter named `N` is called once with `N = n`
    /// and its result, as a list, is the outcome. Negative `n` rolls
    /// nothing.
    pub fn roll_many(
        &mut self,
        scope: &Scope,
        n: i64,
        dice_type: &Value,
    ) -> EvalResult<Vec<Value>> {
        let outcomes = match dice_type {
            Value::Function(f) if f.has_parameter(BULK_PARAMETER) => {
                let mut named = IndexMap::new();
                named.insert(BULK_PARAMETER.to_string(), Value::Integer(n));
                let result =
                    self.call_function(f, Vec::new(), named, scope.depth(), ValueType::Any)?;
                let list = self.to_list(scope, &result)?;
                let items = list.borrow().clone();
                items
            }
            _ => {
                let count = usize::try_from(n).unwrap_or(0);
                let mut outcomes = Vec::with_capacity(count.min(1 << 16));
                for _ in 0..count {
                    outcomes.push(self.roll_unlogged(scope, dice_type)?);
                }
                outcomes
            }
        };
        self.record_dice(dice_type, &outcomes);
        Ok(outcomes)
    }

    fn roll_unlogged(&mut self, scope: &Scope, dice_type: &Value) -> EvalResult<Value> {
        match dice_type {
            Value::Integer(0) => Err(invalid_dice_type(dice_type)),
            Value::Integer(faces) => Ok(Value::Integer(self.roll_integer(*faces))),
            Value::List(items) => {
                let len = items.borrow().len();
                if len == 0 {
                    return Ok(Value::Undef);
                }
                let index = self.rng().gen_range(0..len);
                Ok(items.borrow().get(index).cloned().unwrap_or_default())
            }
            Value::Map(entries) => {
                let len = entries.borrow().len();
                if len == 0 {
                    return Ok(Value::Undef);
                }
                let index = self.rng().gen_range(0..len);
                let face = entries
                    .borrow()
                    .get_index(index)
                    .map(|(k, v)| (k.clone(), v.clone()));
                Ok(face.map_or(Value::Undef, |face| Value::map_from([face])))
            }
            Value::Function(f) => self.call_function(
                f,
                Vec::new(),
                IndexMap::new(),
                scope.depth(),
                ValueType::Any,
            ),
            Value::Undef | Value::Boolean(_) | Value::String(_) => {
                Err(invalid_dice_type(dice_type))
            }
        }
    }

    /// Uniform in `1..=|faces|`, from the absolute value of a random `i64`.
    ///
    /// `i64::MIN` faces wraps the way the remainder of `i64::MAX` does.
    fn roll_integer(&mut self, faces: i64) -> i64 {
        let n = self.rng().next_u64() as i64;
        let magnitude = if n == i64::MIN { i64::MAX } else { n.abs() };
        (magnitude % faces).wrapping_add(1)
    }
}

fn invalid_dice_type(dice_type: &Value) -> EvaluationError {
    EvaluationError::new(format!("invalid dice type: {dice_type}"))
}
