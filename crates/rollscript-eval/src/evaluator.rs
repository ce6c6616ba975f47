//! Expression evaluator.
//!
//! Every node computes its natural value, which is then coerced to the
//! requested type. `Conditional`, `Sequence` and `Call` pass the requested
//! type down to the branch, last item or body they delegate to. Asking for
//! `Undef` evaluates a node as a statement: side effects happen, the value
//! is dropped.

use crate::context::EvaluationContext;
use crate::distribution::Distribution;
use crate::error::{EvalResult, EvaluationError};
use crate::function::Function;
use crate::scope::Scope;
use crate::value::{Value, ValueList, ValueMap};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rollscript_types::ast::*;
use rollscript_types::ValueType;
use std::cell::RefCell;
use std::rc::Rc;

impl EvaluationContext {
    // ══════════════════════════════════════════════════════════════════════
    // Entry points
    // ══════════════════════════════════════════════════════════════════════

    /// Evaluate `expr` to its natural value.
    pub fn evaluate(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        self.evaluate_as(expr, scope, ValueType::Any)
    }

    /// Evaluate `expr` and coerce the result to `ty`.
    ///
    /// Errors raised here or below get `expr` appended to their trace.
    pub fn evaluate_as(
        &mut self,
        expr: &Expr,
        scope: &Scope,
        ty: ValueType,
    ) -> EvalResult<Value> {
        let ty = match ty {
            ValueType::Default => self.default_type(),
            ty => ty,
        };
        self.eval_node(expr, scope, ty)
            .and_then(|value| self.coerce(scope, value, ty))
            .map_err(|e| e.at(expr))
    }

    /// Evaluate for side effects only.
    pub fn evaluate_statement(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<()> {
        self.evaluate_as(expr, scope, ValueType::Undef).map(drop)
    }

    pub fn evaluate_boolean(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<bool> {
        let value = self.evaluate_as(expr, scope, ValueType::Boolean)?;
        self.to_boolean(scope, &value)
    }

    pub fn evaluate_integer(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<i64> {
        let value = self.evaluate_as(expr, scope, ValueType::Integer)?;
        self.to_integer(scope, &value)
    }

    pub fn evaluate_string(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<String> {
        let value = self.evaluate_as(expr, scope, ValueType::String)?;
        self.to_string(scope, &value)
    }

    /// The list is the evaluated value itself when it already was a list.
    pub fn evaluate_list(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<ValueList> {
        let value = self.evaluate_as(expr, scope, ValueType::List)?;
        self.to_list(scope, &value)
    }

    pub fn evaluate_map(&mut self, expr: &Expr, scope: &Scope) -> EvalResult<ValueMap> {
        let value = self.evaluate_as(expr, scope, ValueType::Map)?;
        self.to_map(scope, &value)
    }

    /// Call `f` from a scope at `depth`, evaluating its body as `ty`.
    pub fn call_function(
        &mut self,
        f: &Rc<Function>,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
        depth: u32,
        ty: ValueType,
    ) -> EvalResult<Value> {
        self.check_call_depth(depth)?;
        let scope = f.call_scope(positional, named, depth)?;
        self.evaluate_as(&f.body, &scope, ty)
    }

    fn check_call_depth(&self, depth: u32) -> EvalResult<()> {
        if depth >= self.config.max_call_depth {
            tracing::warn!(depth, max = self.config.max_call_depth, "max call depth reached");
            return Err(EvaluationError::new("max call depth"));
        }
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════════════
    // Dispatch
    // ══════════════════════════════════════════════════════════════════════

    /// Arms delegate to out-of-line helpers; deep recursion passes through
    /// this frame several times per call level.
    fn eval_node(&mut self, expr: &Expr, scope: &Scope, ty: ValueType) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Undef => Ok(Value::Undef),
            ExprKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ExprKind::Integer(n) => Ok(Value::Integer(*n)),
            ExprKind::String(s) => Ok(Value::String(s.clone())),
            ExprKind::Interpolation(parts) => self.eval_interpolation(parts, scope),

            ExprKind::List(items) => self.eval_list(items, scope),
            ExprKind::Map(entries) => self.eval_map(entries, scope),
            ExprKind::Lambda(lambda) => self.eval_lambda(lambda, scope),

            ExprKind::Variable(name) => Ok(scope.get(name)),
            ExprKind::Call {
                function,
                positional,
                named,
            } => self.eval_call(function, positional, named, scope, ty),

            ExprKind::Arithmetic { op, left, right } => {
                self.eval_arithmetic(*op, left, right, scope)
            }
            ExprKind::Sign { op, operand } => self.eval_sign(*op, operand, scope),
            ExprKind::Comparison { op, left, right } => {
                self.eval_comparison(*op, left, right, scope)
            }
            ExprKind::And(operands) => self.eval_and(operands, scope),
            ExprKind::Or(operands) => self.eval_or(operands, scope),
            ExprKind::Not(operand) => self.eval_not(operand, scope),
            ExprKind::Convert { target, expr } => self.evaluate_as(expr, scope, *target),

            ExprKind::Conditional {
                condition,
                then_branch,
                else_branch,
            } => self.eval_conditional(condition, then_branch, else_branch, scope, ty),
            ExprKind::Sequence(items) => self.eval_sequence(items, scope, ty),
            ExprKind::ForLoop(for_loop) => self.eval_for_loop(for_loop, scope),
            ExprKind::Repeat(repeat) => self.eval_repeat(repeat, scope),

            ExprKind::Count(container) => self.eval_count(container, scope),
            ExprKind::Draw(container) => self.eval_draw(container, scope),
            ExprKind::DrawMultiple { n, container } => self.eval_draw_multiple(n, container, scope),
            ExprKind::Range { start, end } => self.eval_range(start, end, scope),
            ExprKind::IndexOf { element, container } => {
                self.eval_index_of(element, container, scope)
            }
            ExprKind::Subscript {
                container,
                subscript,
            } => self.eval_subscript(container, subscript, scope),
            ExprKind::Reorder { op, list } => self.eval_reorder(*op, list, scope),

            ExprKind::Die(dice_type) => self.eval_die(dice_type, scope),
            ExprKind::Dice { n, dice_type } => self.eval_dice(n, dice_type, scope),
            ExprKind::Best { op, expr } => self.eval_best(*op, expr, scope),
            ExprKind::BestMultiple { op, n, expr } => self.eval_best_multiple(*op, n, expr, scope),

            ExprKind::Assign { target, value } => self.eval_assign(target, value, scope),
            ExprKind::Append { target, source } => self.eval_append(target, source, scope),

            ExprKind::Import(import) => self.eval_import(import, scope),
            ExprKind::ScopeVariables(kind) => Ok(Value::Map(match kind {
                ScopeKind::Local => scope.variables(),
                ScopeKind::Outer => scope.parent().unwrap_or(scope).variables(),
                ScopeKind::Global => scope.root_scope().variables(),
            })),

            ExprKind::Output(output) => self.eval_output(expr, output, scope),
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Literals & constructors
    // ══════════════════════════════════════════════════════════════════════

    #[inline(never)]
    fn eval_interpolation(&mut self, parts: &[StringPart], scope: &Scope) -> EvalResult<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                StringPart::Literal(s) => out.push_str(s),
                StringPart::Expr(e) => out.push_str(&self.evaluate_string(e, scope)?),
            }
        }
        Ok(Value::String(out))
    }

    #[inline(never)]
    fn eval_list(&mut self, items: &[Expr], scope: &Scope) -> EvalResult<Value> {
        Ok(Value::list(self.eval_all(items, scope)?))
    }

    #[inline(never)]
    fn eval_map(&mut self, entries: &IndexMap<String, Expr>, scope: &Scope) -> EvalResult<Value> {
        Ok(Value::map(self.eval_entries(entries, scope)?))
    }

    fn eval_all(&mut self, items: &[Expr], scope: &Scope) -> EvalResult<Vec<Value>> {
        items.iter().map(|e| self.evaluate(e, scope)).collect()
    }

    fn eval_entries(
        &mut self,
        entries: &IndexMap<String, Expr>,
        scope: &Scope,
    ) -> EvalResult<IndexMap<String, Value>> {
        entries
            .iter()
            .map(|(k, e)| Ok((k.clone(), self.evaluate(e, scope)?)))
            .collect()
    }

    /// Named defaults are evaluated now, in the defining scope.
    #[inline(never)]
    fn eval_lambda(&mut self, lambda: &Lambda, scope: &Scope) -> EvalResult<Value> {
        let named = self.eval_entries(&lambda.named, scope)?;
        Ok(Value::Function(Rc::new(Function::new(
            scope.clone(),
            lambda.positional.clone(),
            named,
            Rc::clone(&lambda.body),
        ))))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Calls & operators
    // ══════════════════════════════════════════════════════════════════════

    #[inline(never)]
    fn eval_call(
        &mut self,
        function: &Expr,
        positional: &[Expr],
        named: &IndexMap<String, Expr>,
        scope: &Scope,
        ty: ValueType,
    ) -> EvalResult<Value> {
        self.check_call_depth(scope.depth())?;
        let f = match self.evaluate(function, scope)? {
            Value::Function(f) => f,
            other => return Err(EvaluationError::new(format!("not a function: {other}"))),
        };
        let positional = self.eval_all(positional, scope)?;
        let named = self.eval_entries(named, scope)?;
        self.call_function(&f, positional, named, scope.depth(), ty)
    }

    #[inline(never)]
    fn eval_arithmetic(
        &mut self,
        op: ArithOp,
        left: &Expr,
        right: &Expr,
        scope: &Scope,
    ) -> EvalResult<Value> {
        let l = self.evaluate_integer(left, scope)?;
        let r = self.evaluate_integer(right, scope)?;
        let n = match op {
            ArithOp::Add => l.wrapping_add(r),
            ArithOp::Sub => l.wrapping_sub(r),
            ArithOp::Mul => l.wrapping_mul(r),
            ArithOp::Div | ArithOp::Mod if r == 0 => {
                return Err(EvaluationError::new("division by zero"));
            }
            ArithOp::Div => l.wrapping_div(r),
            ArithOp::Mod => l.wrapping_rem(r),
        };
        Ok(Value::Integer(n))
    }

    #[inline(never)]
    fn eval_sign(&mut self, op: SignOp, operand: &Expr, scope: &Scope) -> EvalResult<Value> {
        let n = self.evaluate_integer(operand, scope)?;
        Ok(Value::Integer(match op {
            SignOp::Plus => n,
            SignOp::Minus => n.wrapping_neg(),
        }))
    }

    #[inline(never)]
    fn eval_comparison(
        &mut self,
        op: CompareOp,
        left: &Expr,
        right: &Expr,
        scope: &Scope,
    ) -> EvalResult<Value> {
        if !op.is_numeric() {
            let l = self.evaluate(left, scope)?;
            let r = self.evaluate(right, scope)?;
            let same = l == r;
            return Ok(Value::Boolean(if op == CompareOp::Same { same } else { !same }));
        }
        let l = self.evaluate_integer(left, scope)?;
        let r = self.evaluate_integer(right, scope)?;
        Ok(Value::Boolean(match op {
            CompareOp::Eq => l == r,
            CompareOp::Ne => l != r,
            CompareOp::Lt => l < r,
            CompareOp::Gt => l > r,
            CompareOp::Le => l <= r,
            _ => l >= r,
        }))
    }

    #[inline(never)]
    fn eval_and(&mut self, operands: &[Expr], scope: &Scope) -> EvalResult<Value> {
        for operand in operands {
            if !self.evaluate_boolean(operand, scope)? {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    }

    #[inline(never)]
    fn eval_or(&mut self, operands: &[Expr], scope: &Scope) -> EvalResult<Value> {
        for operand in operands {
            if self.evaluate_boolean(operand, scope)? {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    }

    #[inline(never)]
    fn eval_not(&mut self, operand: &Expr, scope: &Scope) -> EvalResult<Value> {
        Ok(Value::Boolean(!self.evaluate_boolean(operand, scope)?))
    }

    #[inline(never)]
    fn eval_conditional(
        &mut self,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: &Expr,
        scope: &Scope,
        ty: ValueType,
    ) -> EvalResult<Value> {
        let branch = if self.evaluate_boolean(condition, scope)? {
            then_branch
        } else {
            else_branch
        };
        self.evaluate_as(branch, scope, ty)
    }

    #[inline(never)]
    fn eval_sequence(&mut self, items: &[Expr], scope: &Scope, ty: ValueType) -> EvalResult<Value> {
        match items.split_last() {
            None => Ok(Value::Undef),
            Some((last, init)) => {
                for item in init {
                    self.evaluate_statement(item, scope)?;
                }
                self.evaluate_as(last, scope, ty)
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════
    // Loops
    // ══════════════════════════════════════════════════════════════════════

    #[inline(never)]
    fn eval_for_loop(&mut self, for_loop: &ForLoop, scope: &Scope) -> EvalResult<Value> {
        let container = self.evaluate(&for_loop.container, scope)?;
        let loop_scope = scope.child();
        match container {
            Value::List(items) => {
                let items = items.borrow().clone();
                let mut result = Vec::new();
                for (i, item) in items.into_iter().enumerate() {
                    if let Some(index) = &for_loop.index {
                        loop_scope.define(index, Value::Integer(i as i64));
                    }
                    loop_scope.define(&for_loop.item, item);
                    if self.evaluate_boolean(&for_loop.condition, &loop_scope)? {
                        result.push(self.evaluate(&for_loop.out, &loop_scope)?);
                    }
                }
                Ok(Value::list(result))
            }
            Value::Map(entries) => {
                let entries = entries.borrow().clone();
                let mut result = IndexMap::new();
                for (key, item) in entries {
                    if let Some(index) = &for_loop.index {
                        loop_scope.define(index, Value::String(key.clone()));
                    }
                    loop_scope.define(&for_loop.item, item);
                    if self.evaluate_boolean(&for_loop.condition, &loop_scope)? {
                        let value = self.evaluate(&for_loop.out, &loop_scope)?;
                        result.insert(key, value);
                    }
                }
                Ok(Value::map(result))
            }
            other => Err(EvaluationError::new(format!("invalid loop container: {other}"))),
        }
    }

    #[inline(never)]
    fn eval_repeat(&mut self, repeat: &Repeat, scope: &Scope) -> EvalResult<Value> {
        let limit = repeat
            .limit
            .unwrap_or(i64::MAX)
            .min(self.config.max_reroll)
            .max(0);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let loop_scope = scope.child();
        let mut result = Vec::new();
        match repeat.mode {
            RepeatMode::DoWhile => loop {
                result.push(self.evaluate(&repeat.expr, &loop_scope)?);
                if result.len() > limit
                    || !self.evaluate_boolean(&repeat.condition, &loop_scope)?
                {
                    break;
                }
            },
            RepeatMode::WhileDo => {
                while result.len() < limit
                    && self.evaluate_boolean(&repeat.condition, &loop_scope)?
                {
                    result.push(self.evaluate(&repeat.expr, &loop_scope)?);
                }
            }
        }
        Ok(Value::list(result))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Dice & selection
    // ══════════════════════════════════════════════════════════════════════

    #[inline(never)]
    fn eval_die(&mut self, dice_type: &Expr, scope: &Scope) -> EvalResult<Value> {
        let dice_type = self.evaluate(dice_type, scope)?;
        self.roll_one(scope, &dice_type)
    }

    #[inline(never)]
    fn eval_dice(&mut self, n: &Expr, dice_type: &Expr, scope: &Scope) -> EvalResult<Value> {
        let n = self.evaluate_integer(n, scope)?;
        let dice_type = self.evaluate(dice_type, scope)?;
        Ok(Value::list(self.roll_many(scope, n, &dice_type)?))
    }

    #[inline(never)]
    fn eval_best(&mut self, op: BestOp, expr: &Expr, scope: &Scope) -> EvalResult<Value> {
        let items = self.evaluate_list(expr, scope)?.borrow().clone();
        Ok(best_index(op, &items)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default())
    }

    #[inline(never)]
    fn eval_best_multiple(
        &mut self,
        op: BestOp,
        n: &Expr,
        expr: &Expr,
        scope: &Scope,
    ) -> EvalResult<Value> {
        let n = self.evaluate_integer(n, scope)?;
        let items = self.evaluate_list(expr, scope)?.borrow().clone();
        Ok(Value::list(best_multiple(op, n, items)))
    }

    // ══════════════════════════════════════════════════════════════════════
    // Containers & mutation
    // ══════════════════════════════════════════════════════════════════════

    #[inline(never)]
    fn eval_count(&mut self, container: &Expr, scope: &Scope) -> EvalResult<Value> {
        let list = self.evaluate_list(container, scope)?;
        let len = list.borrow().len();
        Ok(Value::Integer(len as i64))
    }

    #[inline(never)]
    fn eval_draw(&mut self, container: &Expr, scope: &Scope) -> EvalResult<Value> {
        let list = self.evaluate_list(container, scope)?;
        let mut items = list.borrow_mut();
        Ok(if items.is_empty() {
            Value::Undef
        } else {
            items.remove(0)
        })
    }

    #[inline(never)]
    fn eval_draw_multiple(
        &mut self,
        n: &Expr,
        container: &Expr,
        scope: &Scope,
    ) -> EvalResult<Value> {
        let n = self.evaluate_integer(n, scope)?;
        if n < 0 {
            return Err(EvaluationError::new(format!("cannot draw negative number: {n}")));
        }
        let list = self.evaluate_list(container, scope)?;
        let mut items = list.borrow_mut();
        let count = usize::try_from(n).unwrap_or(usize::MAX).min(items.len());
        Ok(Value::list(items.drain(..count).collect()))
    }

    #[inline(never)]
    fn eval_range(&mut self, start: &Expr, end: &Expr, scope: &Scope) -> EvalResult<Value> {
        let start = self.evaluate_integer(start, scope)?;
        let end = self.evaluate_integer(end, scope)?;
        let items: Vec<Value> = if start <= end {
            (start..=end).map(Value::Integer).collect()
        } else {
            (end..=start).rev().map(Value::Integer).collect()
        };
        Ok(Value::list(items))
    }

    #[inline(never)]
    fn eval_subscript(
        &mut self,
        container: &Expr,
        subscript: &Expr,
        scope: &Scope,
    ) -> EvalResult<Value> {
        let container = self.evaluate(container, scope)?;
        let subscript = self.evaluate(subscript, scope)?;
        subscript_value(&container, &subscript)
    }

    #[inline(never)]
    fn eval_reorder(&mut self, op: ReorderOp, list: &Expr, scope: &Scope) -> EvalResult<Value> {
        let mut items = self.evaluate_list(list, scope)?.borrow().clone();
        match op {
            ReorderOp::Sorted => items.sort(),
            ReorderOp::Reversed => items.reverse(),
            ReorderOp::Shuffled => items.shuffle(self.rng()),
        }
        Ok(Value::list(items))
    }

    #[inline(never)]
    fn eval_index_of(
        &mut self,
        element: &Expr,
        container: &Expr,
        scope: &Scope,
    ) -> EvalResult<Value> {
        let element = self.evaluate(element, scope)?;
        let container = self.evaluate(container, scope)?;
        Ok(match &container {
            Value::Undef => Value::Undef,
            Value::List(items) => items
                .borrow()
                .iter()
                .position(|v| *v == element)
                .map_or(Value::Undef, |i| Value::Integer(i as i64)),
            Value::Map(entries) => entries
                .borrow()
                .iter()
                .find(|(_, v)| **v == element)
                .map_or(Value::Undef, |(k, _)| Value::String(k.clone())),
            scalar => Value::Boolean(*scalar == element),
        })
    }

    #[inline(never)]
    fn eval_assign(&mut self, target: &Expr, value: &Expr, scope: &Scope) -> EvalResult<Value> {
        let value = self.evaluate(value, scope)?;
        self.assign(target, value.clone(), scope)?;
        Ok(value)
    }

    #[inline(never)]
    fn eval_append(&mut self, target: &Expr, source: &Expr, scope: &Scope) -> EvalResult<Value> {
        let target = self.evaluate(target, scope)?;
        match &target {
            Value::List(items) => {
                let source = self.evaluate_list(source, scope)?;
                let extra = source.borrow().clone();
                items.borrow_mut().extend(extra);
            }
            Value::Map(entries) => match self.evaluate(source, scope)? {
                Value::Map(source) => {
                    let extra = source.borrow().clone();
                    entries.borrow_mut().extend(extra);
                }
                other => {
                    return Err(EvaluationError::new(format!(
                        "invalid right operand for '<<', expected map: {other}"
                    )));
                }
            },
            other => {
                return Err(EvaluationError::new(format!(
                    "invalid left operand for '<<': {other}"
                )));
            }
        }
        Ok(target)
    }

    // ══════════════════════════════════════════════════════════════════════
    // Imports & outputs
    // ══════════════════════════════════════════════════════════════════════

    #[inline(never)]
    fn eval_import(&mut self, import: &Import, scope: &Scope) -> EvalResult<Value> {
        let bindings = self.resolve_import(&import.address).ok_or_else(|| {
            EvaluationError::new(format!("unresolved import: {}", import.address))
        })?;
        let bindings: Vec<(String, Value)> = bindings
            .borrow()
            .iter()
            .filter(|(name, _)| {
                import
                    .names
                    .as_ref()
                    .map_or(true, |names| names.iter().any(|n| n == *name))
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let target = match &import.alias {
            None => scope.variables(),
            Some(alias) => {
                let existing = scope.variables().borrow().get(alias).cloned();
                match existing {
                    Some(Value::Map(map)) => map,
                    Some(_) => {
                        return Err(EvaluationError::new(format!(
                            "import alias {alias} is not a map"
                        )));
                    }
                    None => {
                        let map: ValueMap = Rc::new(RefCell::new(IndexMap::new()));
                        scope.define(alias, Value::Map(Rc::clone(&map)));
                        map
                    }
                }
            }
        };
        let mut target = target.borrow_mut();
        for (name, value) in bindings {
            if target.contains_key(&name) {
                return Err(EvaluationError::new(format!("import name clash: {name}")));
            }
            target.insert(name, value);
        }
        Ok(Value::Undef)
    }

    #[inline(never)]
    fn eval_output(&mut self, expr: &Expr, output: &Output, scope: &Scope) -> EvalResult<Value> {
        let name = match &output.name {
            Some(name) => self.evaluate_string(name, scope)?,
            None => crate::reduce::output_name(&output.expr, scope),
        };
        let mode = match output.mode {
            OutputMode::Default => match self.config.default_output_mode {
                OutputMode::Default => OutputMode::Roll,
                mode => mode,
            },
            mode => mode,
        };
        tracing::debug!(name = %name, mode = %mode, output = %expr, "evaluating output");
        match mode {
            OutputMode::Sample => {
                self.open_sample(name, &output.expr, output.value_type)?;
                let mut distribution = Distribution::new();
                let repeats = self.config.sample_size;
                match distribution.sample(&output.expr, self, scope, output.value_type, repeats) {
                    Ok(()) => {
                        let most_frequent = distribution.mode().unwrap_or_default();
                        self.close_sample(distribution);
                        Ok(most_frequent)
                    }
                    Err(e) => {
                        self.abort_record();
                        Err(e)
                    }
                }
            }
            _ => {
                self.open_roll(name, &output.expr, output.value_type)?;
                match self.evaluate_as(&output.expr, scope, output.value_type) {
                    Ok(value) => {
                        self.close_roll(value.clone());
                        Ok(value)
                    }
                    Err(e) => {
                        self.abort_record();
                        Err(e)
                    }
                }
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// Element of `container` at `subscript`. List and map subscripts select
/// elementwise. Functions come back owned by `container`.
pub(crate) fn subscript_value(container: &Value, subscript: &Value) -> EvalResult<Value> {
    let value = match (container, subscript) {
        (Value::Map(entries), Value::String(key)) => {
            entries.borrow().get(key).cloned().unwrap_or_default()
        }
        (Value::List(items), Value::Integer(i)) => {
            let items = items.borrow();
            let index = list_index(items.len(), *i)?;
            items[index].clone()
        }
        (_, Value::List(subs)) => {
            let subs = subs.borrow().clone();
            let items = subs
                .iter()
                .map(|s| subscript_value(container, s))
                .collect::<EvalResult<Vec<_>>>()?;
            return Ok(Value::list(items));
        }
        (_, Value::Map(subs)) => {
            let subs = subs.borrow().clone();
            let entries = subs
                .iter()
                .map(|(k, s)| Ok((k.clone(), subscript_value(container, s)?)))
                .collect::<EvalResult<IndexMap<_, _>>>()?;
            return Ok(Value::map(entries));
        }
        _ => {
            return Err(EvaluationError::new(format!(
                "invalid subscript {subscript} for {container}"
            )));
        }
    };
    Ok(match value {
        Value::Function(f) => Value::Function(f.reassign_owner(container)),
        other => other,
    })
}

/// Resolve a possibly negative index against a list of `len` elements.
pub(crate) fn list_index(len: usize, index: i64) -> EvalResult<usize> {
    let signed_len = len as i64;
    let resolved = if index < 0 { index + signed_len } else { index };
    if resolved < 0 || resolved >= signed_len {
        return Err(EvaluationError::new(format!(
            "index out of bounds: length {len}, index {index}"
        )));
    }
    Ok(resolved as usize)
}

/// Index of the selected element; the earliest among ties.
fn best_index(op: BestOp, items: &[Value]) -> Option<usize> {
    if items.is_empty() {
        return None;
    }
    let better = |candidate: &Value, best: &Value| match op {
        BestOp::Highest => candidate > best,
        _ => candidate < best,
    };
    match op {
        BestOp::First => Some(0),
        BestOp::Last => Some(items.len() - 1),
        BestOp::Highest | BestOp::Lowest => {
            let mut best = 0;
            for (i, item) in items.iter().enumerate().skip(1) {
                if better(item, &items[best]) {
                    best = i;
                }
            }
            Some(best)
        }
    }
}

/// The `n` selected elements, kept in their original order.
fn best_multiple(op: BestOp, n: i64, items: Vec<Value>) -> Vec<Value> {
    if n <= 0 {
        return Vec::new();
    }
    let len = items.len();
    let n = usize::try_from(n).unwrap_or(usize::MAX);
    if len <= n {
        return items;
    }
    match op {
        BestOp::First => items.into_iter().take(n).collect(),
        BestOp::Last => items.into_iter().skip(len - n).collect(),
        BestOp::Highest | BestOp::Lowest => {
            let mut order: Vec<usize> = (0..len).collect();
            order.sort_by(|&a, &b| items[a].cmp(&items[b]).then(a.cmp(&b)));
            let mut chosen: Vec<usize> = if op == BestOp::Highest {
                order[len - n..].to_vec()
            } else {
                order[..n].to_vec()
            };
            chosen.sort_unstable();
            chosen.into_iter().map(|i| items[i].clone()).collect()
        }
    }
}
