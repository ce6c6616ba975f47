//! Purity analysis.
//!
//! A pure expression evaluates to the same value whatever the scope, the
//! random stream or the import resolver. Some rules need a value to decide
//! (which branch a constant condition selects, what a constant die type
//! is); those values come from the reducer's scratch context.

use crate::error::EvalResult;
use crate::reduce::Reducer;
use crate::value::Value;
use rollscript_types::ast::{Expr, ExprKind, ReorderOp, StringPart};

impl Reducer {
    /// Whether `expr` can be replaced by its value before evaluation.
    pub fn is_pure(&mut self, expr: &Expr) -> EvalResult<bool> {
        Ok(match &expr.kind {
            ExprKind::Undef | ExprKind::Boolean(_) | ExprKind::Integer(_) | ExprKind::String(_) => {
                true
            }
            ExprKind::Interpolation(parts) => {
                for part in parts {
                    if let StringPart::Expr(e) = part {
                        if !self.is_pure(e)? {
                            return Ok(false);
                        }
                    }
                }
                true
            }
            ExprKind::List(items) | ExprKind::Sequence(items) => self.all_pure(items)?,
            ExprKind::Map(entries) => self.all_pure(entries.values())?,

            ExprKind::Lambda(_)
            | ExprKind::Variable(_)
            | ExprKind::Assign { .. }
            | ExprKind::Append { .. }
            | ExprKind::Import(_)
            | ExprKind::ScopeVariables(_)
            | ExprKind::Output(_) => false,

            ExprKind::Call {
                function,
                positional,
                named,
            } => {
                self.is_pure(function)?
                    && self.all_pure(positional)?
                    && self.all_pure(named.values())?
            }

            ExprKind::Arithmetic { left, right, .. }
            | ExprKind::Comparison { left, right, .. }
            | ExprKind::Range {
                start: left,
                end: right,
            }
            | ExprKind::IndexOf {
                element: left,
                container: right,
            }
            | ExprKind::Subscript {
                container: left,
                subscript: right,
            }
            | ExprKind::DrawMultiple {
                n: left,
                container: right,
            }
            | ExprKind::BestMultiple {
                n: left, expr: right, ..
            } => self.is_pure(left)? && self.is_pure(right)?,

            ExprKind::Sign { operand: e, .. }
            | ExprKind::Not(e)
            | ExprKind::Convert { expr: e, .. }
            | ExprKind::Count(e)
            | ExprKind::Draw(e)
            | ExprKind::Best { expr: e, .. } => self.is_pure(e)?,

            ExprKind::Reorder { op, list } => *op != ReorderOp::Shuffled && self.is_pure(list)?,

            ExprKind::And(operands) => self.is_pure_logic(operands, false)?,
            ExprKind::Or(operands) => self.is_pure_logic(operands, true)?,

            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if !self.is_pure(condition)? {
                    return Ok(false);
                }
                let branch = if self.scratch_boolean(condition)? {
                    then_branch
                } else {
                    else_branch
                };
                self.is_pure(branch)?
            }

            ExprKind::ForLoop(for_loop) => {
                if !self.is_pure(&for_loop.container)? {
                    return Ok(false);
                }
                if is_empty_container(&self.scratch_value(&for_loop.container)?) {
                    return Ok(true);
                }
                if !self.is_pure(&for_loop.condition)? {
                    return Ok(false);
                }
                // A constant false filter selects nothing.
                !self.scratch_boolean(&for_loop.condition)? || self.is_pure(&for_loop.out)?
            }
            ExprKind::Repeat(repeat) => {
                self.is_pure(&repeat.expr)? && self.is_pure(&repeat.condition)?
            }

            ExprKind::Die(dice_type) => self.is_pure_dice_type(dice_type)?,
            ExprKind::Dice { n, dice_type } => {
                self.is_pure(n)? && self.is_pure_dice_type(dice_type)?
            }
        })
    }

    fn all_pure<'a>(&mut self, exprs: impl IntoIterator<Item = &'a Expr>) -> EvalResult<bool> {
        for e in exprs {
            if !self.is_pure(e)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Pure when a pure operand equal to `absorbing` is met before any
    /// impure one, or when every operand is pure.
    fn is_pure_logic(&mut self, operands: &[Expr], absorbing: bool) -> EvalResult<bool> {
        for operand in operands {
            if !self.is_pure(operand)? {
                return Ok(false);
            }
            if self.scratch_boolean(operand)? == absorbing {
                return Ok(true);
            }
        }
        Ok(true)
    }

    /// A die type is foldable when it is pure and its value is not one of
    /// the variants that roll fresh outcomes (booleans, integers, lists).
    pub fn is_pure_dice_type(&mut self, dice_type: &Expr) -> EvalResult<bool> {
        if !self.is_pure(dice_type)? {
            return Ok(false);
        }
        let value = self.scratch_value(dice_type)?;
        Ok(!matches!(
            value,
            Value::Boolean(_) | Value::Integer(_) | Value::List(_)
        ))
    }
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::List(items) => items.borrow().is_empty(),
        Value::Map(entries) => entries.borrow().is_empty(),
        _ => false,
    }
}
