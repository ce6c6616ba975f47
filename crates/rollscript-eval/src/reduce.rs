//! Constant folding and variable substitution.
//!
//! Reduction replaces pure subtrees with the literal of their value and
//! applies a few identities. Values are computed in a scratch context that
//! no run shares; purity guarantees that context is never consulted for
//! state.
//!
//! Substitution replaces free variables with the literal of their current
//! value. Together with reduction and rendering it produces the default
//! name of an output.

use crate::config::EvalConfig;
use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::scope::Scope;
use crate::value::Value;
use rollscript_types::ast::{ArithOp, Expr, ExprKind, ForLoop, Lambda, SignOp};
use rollscript_types::{Location, ValueType};
use std::convert::Infallible;
use std::rc::Rc;

/// Seed of the scratch context.
const SCRATCH_SEED: u64 = 0;

/// Reduce `expr` with a fresh [`Reducer`].
pub fn reduce(expr: &Expr) -> EvalResult<Expr> {
    let reduced = Reducer::new().reduce(expr)?;
    tracing::debug!(before = %expr, after = %reduced, "expression reduced");
    Ok(reduced)
}

/// Reduce every expression of a program.
pub fn reduce_all(exprs: &[Expr]) -> EvalResult<Vec<Expr>> {
    let mut reducer = Reducer::new();
    exprs.iter().map(|e| reducer.reduce(e)).collect()
}

/// Constant folder over a private scratch context.
pub struct Reducer {
    scratch: EvaluationContext,
    scope: Scope,
}

impl Default for Reducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer {
    pub fn new() -> Self {
        let scratch = EvaluationContext::new(EvalConfig::default(), Some(SCRATCH_SEED));
        let scope = scratch.global_scope().clone();
        Self { scratch, scope }
    }

    pub(crate) fn scratch_value(&mut self, expr: &Expr) -> EvalResult<Value> {
        self.scratch.evaluate(expr, &self.scope)
    }

    pub(crate) fn scratch_boolean(&mut self, expr: &Expr) -> EvalResult<bool> {
        self.scratch.evaluate_boolean(expr, &self.scope)
    }

    /// Literal of the value of a pure expression.
    fn fold(&mut self, expr: &Expr) -> EvalResult<Expr> {
        Ok(self.scratch_value(expr)?.to_expr().at(expr.location.clone()))
    }

    pub fn reduce(&mut self, expr: &Expr) -> EvalResult<Expr> {
        if !is_scalar_literal(expr) && self.is_pure(expr)? {
            return self.fold(expr);
        }
        let location = expr.location.clone();
        match &expr.kind {
            ExprKind::Arithmetic { op, left, right } => {
                self.reduce_arithmetic(*op, left, right, location)
            }
            ExprKind::Sign {
                op: SignOp::Plus,
                operand,
            } => {
                let operand = self.reduce(operand)?;
                Ok(convert_unless_natural(ValueType::Integer, operand, location))
            }
            ExprKind::And(operands) => self.reduce_logic(operands, true, location),
            ExprKind::Or(operands) => self.reduce_logic(operands, false, location),
            ExprKind::Convert { target, expr: inner } => {
                let inner = self.reduce(inner)?;
                Ok(convert_unless_natural(*target, inner, location))
            }
            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } if self.is_pure(condition)? => {
                if self.scratch_boolean(condition)? {
                    self.reduce(then_branch)
                } else {
                    self.reduce(else_branch)
                }
            }
            ExprKind::Sequence(items) => self.reduce_sequence(items, location),
            _ => expr.try_map_children(&mut |child| self.reduce(child)),
        }
    }

    /// Neutral operands (`1 *`, `* 1`, `/ 1`, `0 +`, `+ 0`, `- 0`) are
    /// dropped. `% 1` is left alone: its value is 0.
    fn reduce_arithmetic(
        &mut self,
        op: ArithOp,
        left: &Expr,
        right: &Expr,
        location: Location,
    ) -> EvalResult<Expr> {
        let left = self.reduce(left)?;
        let right = self.reduce(right)?;
        match (op, integer_literal(&left), integer_literal(&right)) {
            (ArithOp::Mul, Some(1), _) | (ArithOp::Add, Some(0), _) => {
                return Ok(convert_unless_natural(ValueType::Integer, right, location));
            }
            (ArithOp::Mul | ArithOp::Div, _, Some(1))
            | (ArithOp::Add | ArithOp::Sub, _, Some(0)) => {
                return Ok(convert_unless_natural(ValueType::Integer, left, location));
            }
            _ => {}
        }
        Ok(Expr::new(
            ExprKind::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            location,
        ))
    }

    /// Pure operands equal to `neutral` are dropped; the first pure operand
    /// that decides the result ends the list.
    fn reduce_logic(
        &mut self,
        operands: &[Expr],
        neutral: bool,
        location: Location,
    ) -> EvalResult<Expr> {
        let mut kept = Vec::with_capacity(operands.len());
        for operand in operands {
            let operand = self.reduce(operand)?;
            if self.is_pure(&operand)? {
                if self.scratch_boolean(&operand)? == neutral {
                    continue;
                }
                kept.push(operand);
                break;
            }
            kept.push(operand);
        }
        if kept.len() <= 1 {
            return Ok(match kept.pop() {
                None => Expr::boolean(neutral).at(location),
                Some(single) => convert_unless_natural(ValueType::Boolean, single, location),
            });
        }
        let kind = if neutral {
            ExprKind::And(kept)
        } else {
            ExprKind::Or(kept)
        };
        Ok(Expr::new(kind, location))
    }

    /// Pure items other than the last have no effect and are dropped.
    fn reduce_sequence(&mut self, items: &[Expr], location: Location) -> EvalResult<Expr> {
        let Some((last, init)) = items.split_last() else {
            return Ok(Expr::undef().at(location));
        };
        let mut kept = Vec::with_capacity(items.len());
        for item in init {
            let item = self.reduce(item)?;
            if !self.is_pure(&item)? {
                kept.push(item);
            }
        }
        let last = self.reduce(last)?;
        if kept.is_empty() {
            return Ok(last);
        }
        kept.push(last);
        Ok(Expr::new(ExprKind::Sequence(kept), location))
    }
}

fn is_scalar_literal(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Undef | ExprKind::Boolean(_) | ExprKind::Integer(_) | ExprKind::String(_)
    )
}

fn integer_literal(expr: &Expr) -> Option<i64> {
    match expr.kind {
        ExprKind::Integer(n) => Some(n),
        _ => None,
    }
}

/// `target expr`, or `expr` itself when it already produces `target`.
fn convert_unless_natural(target: ValueType, expr: Expr, location: Location) -> Expr {
    if expr.natural_type() == target {
        return expr;
    }
    Expr::new(
        ExprKind::Convert {
            target,
            expr: Box::new(expr),
        },
        location,
    )
}

// ══════════════════════════════════════════════════════════════════════════════
// Substitution
// ══════════════════════════════════════════════════════════════════════════════

/// Replace every free variable bound in `scope` by the literal of its value.
///
/// Lambda parameters and loop variables shadow the scope inside their
/// bodies. Assignment targets are kept as written.
pub fn substitute_variables(expr: &Expr, scope: &Scope) -> Expr {
    Substituter {
        scope,
        shadowed: Vec::new(),
    }
    .substitute(expr)
}

/// Default name of an output: its expression, substituted, reduced and
/// rendered. Falls back to the substituted form if reduction fails.
pub fn output_name(expr: &Expr, scope: &Scope) -> String {
    let substituted = substitute_variables(expr, scope);
    match Reducer::new().reduce(&substituted) {
        Ok(reduced) => reduced.render(),
        Err(_) => substituted.render(),
    }
}

struct Substituter<'a> {
    scope: &'a Scope,
    shadowed: Vec<String>,
}

impl Substituter<'_> {
    fn substitute(&mut self, expr: &Expr) -> Expr {
        match &expr.kind {
            ExprKind::Variable(name) if !self.shadowed.contains(name) => {
                match self.scope.lookup(name) {
                    Some(value) => value.to_expr().at(expr.location.clone()),
                    None => expr.clone(),
                }
            }
            ExprKind::Lambda(lambda) => {
                let named = lambda
                    .named
                    .iter()
                    .map(|(k, e)| (k.clone(), self.substitute(e)))
                    .collect();
                let params = lambda.positional.iter().chain(lambda.named.keys()).cloned();
                let body = self.shadowing(params, |s| s.substitute(&lambda.body));
                Expr::new(
                    ExprKind::Lambda(Box::new(Lambda {
                        positional: lambda.positional.clone(),
                        named,
                        body: Rc::new(body),
                    })),
                    expr.location.clone(),
                )
            }
            ExprKind::ForLoop(for_loop) => {
                let container = self.substitute(&for_loop.container);
                let bound = std::iter::once(for_loop.item.clone()).chain(for_loop.index.clone());
                let (out, condition) = self.shadowing(bound, |s| {
                    (s.substitute(&for_loop.out), s.substitute(&for_loop.condition))
                });
                Expr::new(
                    ExprKind::ForLoop(Box::new(ForLoop {
                        out,
                        index: for_loop.index.clone(),
                        item: for_loop.item.clone(),
                        container,
                        condition,
                    })),
                    expr.location.clone(),
                )
            }
            ExprKind::Assign { target, value } => Expr::new(
                ExprKind::Assign {
                    target: target.clone(),
                    value: Box::new(self.substitute(value)),
                },
                expr.location.clone(),
            ),
            _ => expr
                .try_map_children(&mut |child| Ok::<_, Infallible>(self.substitute(child)))
                .unwrap_or_else(|never| match never {}),
        }
    }

    fn shadowing<T>(
        &mut self,
        names: impl Iterator<Item = String>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let mark = self.shadowed.len();
        self.shadowed.extend(names);
        let result = f(self);
        self.shadowed.truncate(mark);
        result
    }
}
