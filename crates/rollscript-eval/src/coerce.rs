//! Conversions between value variants.
//!
//! Every value converts to every variant without error. The only
//! conversions that can fail are those that call a function: a closure
//! with no positional parameter is called and its result converted.

use crate::context::EvaluationContext;
use crate::error::EvalResult;
use crate::function::Function;
use crate::scope::Scope;
use crate::value::{Value, ValueList, ValueMap};
use indexmap::IndexMap;
use rollscript_types::ValueType;
use std::cell::RefCell;
use std::rc::Rc;

/// Key of the single entry when a scalar becomes a map.
pub const SINGLETON_KEY: &str = "_";

impl EvaluationContext {
    /// Call a nullary function for a conversion, or `None` if it takes
    /// positional parameters.
    fn call_for_conversion(
        &mut self,
        scope: &Scope,
        f: &Rc<Function>,
        ty: ValueType,
    ) -> EvalResult<Option<Value>> {
        if !f.is_nullary() {
            return Ok(None);
        }
        self.call_function(f, Vec::new(), IndexMap::new(), scope.depth(), ty)
            .map(Some)
    }

    /// Convert `value` to `ty`. `Any` keeps the value; `Undef` discards it.
    pub fn coerce(&mut self, scope: &Scope, value: Value, ty: ValueType) -> EvalResult<Value> {
        match ty {
            ValueType::Default => {
                let ty = self.default_type();
                self.coerce(scope, value, ty)
            }
            ValueType::Any => Ok(value),
            ValueType::Undef => Ok(Value::Undef),
            ValueType::Boolean => self.to_boolean(scope, &value).map(Value::Boolean),
            ValueType::Integer => self.to_integer(scope, &value).map(Value::Integer),
            ValueType::String => self.to_string(scope, &value).map(Value::String),
            ValueType::List => self.to_list(scope, &value).map(Value::List),
            ValueType::Map => self.to_map(scope, &value).map(Value::Map),
            ValueType::Function => Ok(Value::Function(to_function(&value))),
        }
    }

    /// The configured default type, `Any` when unset.
    pub fn default_type(&self) -> ValueType {
        match self.config.default_type {
            ValueType::Default => ValueType::Any,
            ty => ty,
        }
    }

    pub fn to_boolean(&mut self, scope: &Scope, value: &Value) -> EvalResult<bool> {
        Ok(match value {
            Value::Undef => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Map(entries) => !entries.borrow().is_empty(),
            Value::Function(f) => match self.call_for_conversion(scope, f, ValueType::Boolean)? {
                Some(result) => self.to_boolean(scope, &result)?,
                None => false,
            },
        })
    }

    /// Sums containers; unparsable strings are 0; arithmetic wraps.
    pub fn to_integer(&mut self, scope: &Scope, value: &Value) -> EvalResult<i64> {
        Ok(match value {
            Value::Undef => 0,
            Value::Boolean(b) => i64::from(*b),
            Value::Integer(n) => *n,
            Value::String(s) => s.parse::<i64>().unwrap_or(0),
            Value::List(items) => {
                let items = items.borrow().clone();
                self.sum_integers(scope, &items)?
            }
            Value::Map(entries) => {
                let items: Vec<Value> = entries.borrow().values().cloned().collect();
                self.sum_integers(scope, &items)?
            }
            Value::Function(f) => match self.call_for_conversion(scope, f, ValueType::Integer)? {
                Some(result) => self.to_integer(scope, &result)?,
                None => f.fingerprint(),
            },
        })
    }

    fn sum_integers(&mut self, scope: &Scope, items: &[Value]) -> EvalResult<i64> {
        let mut sum = 0i64;
        for item in items {
            sum = sum.wrapping_add(self.to_integer(scope, item)?);
        }
        Ok(sum)
    }

    /// Concatenates containers without separators; `false` is empty.
    pub fn to_string(&mut self, scope: &Scope, value: &Value) -> EvalResult<String> {
        Ok(match value {
            Value::Undef | Value::Boolean(false) => String::new(),
            Value::Boolean(true) => "true".to_string(),
            Value::Integer(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::List(items) => {
                let items = items.borrow().clone();
                self.concat_strings(scope, &items)?
            }
            Value::Map(entries) => {
                let items: Vec<Value> = entries.borrow().values().cloned().collect();
                self.concat_strings(scope, &items)?
            }
            Value::Function(f) => match self.call_for_conversion(scope, f, ValueType::String)? {
                Some(result) => self.to_string(scope, &result)?,
                None => value.to_string(),
            },
        })
    }

    fn concat_strings(&mut self, scope: &Scope, items: &[Value]) -> EvalResult<String> {
        let mut out = String::new();
        for item in items {
            out.push_str(&self.to_string(scope, item)?);
        }
        Ok(out)
    }

    /// A list value is returned as is, so mutations reach the original.
    pub fn to_list(&mut self, scope: &Scope, value: &Value) -> EvalResult<ValueList> {
        let items = match value {
            Value::List(items) => return Ok(Rc::clone(items)),
            Value::Undef => Vec::new(),
            Value::Boolean(_) | Value::Integer(_) | Value::String(_) => vec![value.clone()],
            Value::Map(entries) => entries.borrow().values().cloned().collect(),
            Value::Function(f) => match self.call_for_conversion(scope, f, ValueType::List)? {
                Some(result) => return self.to_list(scope, &result),
                None => vec![value.clone()],
            },
        };
        Ok(Rc::new(RefCell::new(items)))
    }

    /// A map value is returned as is; lists are keyed `"0"`, `"1"`, ...
    pub fn to_map(&mut self, scope: &Scope, value: &Value) -> EvalResult<ValueMap> {
        let entries = match value {
            Value::Map(entries) => return Ok(Rc::clone(entries)),
            Value::Undef => IndexMap::new(),
            Value::Boolean(_) | Value::Integer(_) | Value::String(_) => singleton(value),
            Value::List(items) => items
                .borrow()
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect(),
            Value::Function(f) => match self.call_for_conversion(scope, f, ValueType::Map)? {
                Some(result) => return self.to_map(scope, &result),
                None => singleton(value),
            },
        };
        Ok(Rc::new(RefCell::new(entries)))
    }
}

fn singleton(value: &Value) -> IndexMap<String, Value> {
    let mut entries = IndexMap::new();
    entries.insert(SINGLETON_KEY.to_string(), value.clone());
    entries
}

/// Functions stay as they are; anything else becomes a constant closure.
pub fn to_function(value: &Value) -> Rc<Function> {
    match value {
        Value::Function(f) => Rc::clone(f),
        other => Rc::new(Function::constant(other)),
    }
}
