//! Assignment to variables, subscripts and destructuring constructors.

use crate::context::EvaluationContext;
use crate::error::{EvalResult, EvaluationError};
use crate::evaluator::list_index;
use crate::scope::Scope;
use crate::value::Value;
use rollscript_types::ast::{Expr, ExprKind};

impl EvaluationContext {
    /// Store `value` into `target`.
    ///
    /// Variables follow the scope rule of [`Scope::set`]. A list or map
    /// constructor destructures `value`, assigning `undef` where the
    /// source has no element.
    pub fn assign(&mut self, target: &Expr, value: Value, scope: &Scope) -> EvalResult<()> {
        self.assign_node(target, value, scope)
            .map_err(|e| e.at(target))
    }

    fn assign_node(&mut self, target: &Expr, value: Value, scope: &Scope) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Variable(name) => {
                scope.set(name, value);
                Ok(())
            }
            ExprKind::Subscript {
                container,
                subscript,
            } => {
                let container = self.evaluate(container, scope)?;
                let subscript = self.evaluate(subscript, scope)?;
                self.assign_element(&container, &subscript, value, scope)
            }
            ExprKind::List(items) => {
                let values = self.to_list(scope, &value)?.borrow().clone();
                for (i, item) in items.iter().enumerate() {
                    let v = values.get(i).cloned().unwrap_or_default();
                    self.assign(item, v, scope)?;
                }
                Ok(())
            }
            ExprKind::Map(entries) => {
                let values = self.to_map(scope, &value)?.borrow().clone();
                for (key, item) in entries {
                    let v = values.get(key).cloned().unwrap_or_default();
                    self.assign(item, v, scope)?;
                }
                Ok(())
            }
            _ => Err(EvaluationError::new(format!("not assignable: {target}"))),
        }
    }

    fn assign_element(
        &mut self,
        container: &Value,
        subscript: &Value,
        value: Value,
        scope: &Scope,
    ) -> EvalResult<()> {
        match (container, subscript) {
            (Value::Map(entries), Value::String(key)) => {
                entries.borrow_mut().insert(key.clone(), value);
            }
            (Value::List(items), Value::Integer(i)) => {
                let mut items = items.borrow_mut();
                let index = list_index(items.len(), *i)?;
                items[index] = value;
            }
            (_, Value::List(subs)) => {
                let values = self.to_list(scope, &value)?.borrow().clone();
                let subs = subs.borrow().clone();
                for (i, sub) in subs.iter().enumerate() {
                    let v = values.get(i).cloned().unwrap_or_default();
                    self.assign_element(container, sub, v, scope)?;
                }
            }
            (_, Value::Map(subs)) => {
                let values = self.to_map(scope, &value)?.borrow().clone();
                let subs = subs.borrow().clone();
                for (key, sub) in &subs {
                    let v = values.get(key).cloned().unwrap_or_default();
                    self.assign_element(container, sub, v, scope)?;
                }
            }
            _ => {
                return Err(EvaluationError::new(format!(
                    "invalid subscript {subscript} for {container}"
                )));
            }
        }
        Ok(())
    }
}
