//! Closures and argument binding.

use crate::error::{EvalResult, EvaluationError};
use crate::scope::Scope;
use crate::value::Value;
use indexmap::IndexMap;
use rollscript_types::ast::Expr;
use sha2::{Digest, Sha256};
use std::fmt;
use std::rc::Rc;

/// Name bound to a function's owner inside its body.
pub const OWNER_VARIABLE: &str = "this";

/// A closure value.
///
/// Named defaults were evaluated once when the closure was created. The
/// owner is the list or map the function was extracted from by
/// subscripting, if any.
#[derive(Clone)]
pub struct Function {
    pub scope: Scope,
    pub positional: Vec<String>,
    pub named: IndexMap<String, Value>,
    pub body: Rc<Expr>,
    pub owner: Option<Value>,
}

impl Function {
    pub fn new(
        scope: Scope,
        positional: Vec<String>,
        named: IndexMap<String, Value>,
        body: Rc<Expr>,
    ) -> Self {
        Self {
            scope,
            positional,
            named,
            body,
            owner: None,
        }
    }

    /// A zero-argument closure whose body is the literal of `value`.
    pub fn constant(value: &Value) -> Self {
        Self::new(Scope::root(), Vec::new(), IndexMap::new(), Rc::new(value.to_expr()))
    }

    /// Whether calling with no arguments is possible.
    pub fn is_nullary(&self) -> bool {
        self.positional.is_empty()
    }

    /// Whether `name` is a positional or named parameter.
    pub fn has_parameter(&self, name: &str) -> bool {
        self.positional.iter().any(|p| p == name) || self.named.contains_key(name)
    }

    /// The same function with no owner.
    pub fn without_owner(self: &Rc<Self>) -> Rc<Function> {
        if self.owner.is_none() {
            return Rc::clone(self);
        }
        Rc::new(Function {
            owner: None,
            ..(**self).clone()
        })
    }

    /// The same function owned by `owner`. Returns `self` when already
    /// owned by that very object.
    pub fn reassign_owner(self: &Rc<Self>, owner: &Value) -> Rc<Function> {
        if let Some(current) = &self.owner {
            if current.same_object(owner) {
                return Rc::clone(self);
            }
        }
        Rc::new(Function {
            owner: Some(owner.clone()),
            ..(**self).clone()
        })
    }

    /// Stable integer derived from the function's rendered source.
    pub fn fingerprint(&self) -> i64 {
        let source = Value::Function(Rc::new(Function {
            owner: None,
            ..self.clone()
        }))
        .to_expr()
        .render();
        let digest = Sha256::digest(source.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        i64::from_be_bytes(bytes)
    }

    /// Bind call arguments to parameters.
    ///
    /// Positional arguments fill positional parameters first, then named
    /// parameters in declaration order. Surplus positional arguments are
    /// ignored. Named arguments may not rebind a parameter already filled.
    pub fn bind_arguments(
        &self,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
    ) -> EvalResult<IndexMap<String, Value>> {
        let mut bound = IndexMap::new();
        let mut args = positional.into_iter();
        for (name, value) in self.positional.iter().zip(args.by_ref()) {
            bound.insert(name.clone(), value);
        }
        for (name, value) in self.named.keys().zip(args.by_ref()) {
            bound.insert(name.clone(), value);
        }
        for (name, value) in named {
            if bound.contains_key(&name) {
                return Err(EvaluationError::new(format!(
                    "argument {name} already set"
                )));
            }
            if !self.has_parameter(&name) {
                return Err(EvaluationError::new(format!("unknown argument {name}")));
            }
            bound.insert(name, value);
        }
        for (name, default) in &self.named {
            if !bound.contains_key(name) {
                bound.insert(name.clone(), default.clone());
            }
        }
        let missing: Vec<&str> = self
            .positional
            .iter()
            .filter(|p| !bound.contains_key(*p))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(EvaluationError::new(format!(
                "missing arguments [{}]",
                missing.join(", ")
            )));
        }
        if let Some(owner) = &self.owner {
            if !bound.contains_key(OWNER_VARIABLE) {
                bound.insert(OWNER_VARIABLE.to_string(), owner.clone());
            }
        }
        Ok(bound)
    }

    /// The scope a call runs in: bound arguments over the defining scope,
    /// one level deeper than the caller.
    pub fn call_scope(
        &self,
        positional: Vec<Value>,
        named: IndexMap<String, Value>,
        depth: u32,
    ) -> EvalResult<Scope> {
        let variables = self.bind_arguments(positional, named)?;
        Ok(Scope::with_variables(
            Some(self.scope.clone()),
            variables,
            depth + 1,
        ))
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("positional", &self.positional)
            .field("named", &self.named)
            .field("body", &self.body.render())
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_function() -> Function {
        let body = Expr::arithmetic(
            rollscript_types::ast::ArithOp::Add,
            Expr::variable("a"),
            Expr::variable("b"),
        );
        let mut named = IndexMap::new();
        named.insert("b".to_string(), Value::Integer(10));
        Function::new(Scope::root(), vec!["a".to_string()], named, Rc::new(body))
    }

    fn named(entries: &[(&str, i64)]) -> IndexMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Integer(*v)))
            .collect()
    }

    #[test]
    fn test_binding_fills_positional_then_named() {
        let f = add_function();
        let bound = f
            .bind_arguments(vec![Value::Integer(5), Value::Integer(6)], IndexMap::new())
            .unwrap();
        assert_eq!(bound["a"], Value::Integer(5));
        assert_eq!(bound["b"], Value::Integer(6));
    }

    #[test]
    fn test_binding_uses_default() {
        let f = add_function();
        let bound = f.bind_arguments(vec![Value::Integer(5)], IndexMap::new()).unwrap();
        assert_eq!(bound["b"], Value::Integer(10));
    }

    #[test]
    fn test_binding_rejects_duplicate() {
        let f = add_function();
        let err = f
            .bind_arguments(
                vec![Value::Integer(5), Value::Integer(6)],
                named(&[("b", 7)]),
            )
            .unwrap_err();
        assert_eq!(err.message, "argument b already set");
    }

    #[test]
    fn test_binding_rejects_unknown_and_missing() {
        let f = add_function();
        let err = f
            .bind_arguments(vec![Value::Integer(1)], named(&[("c", 1)]))
            .unwrap_err();
        assert_eq!(err.message, "unknown argument c");
        let err = f.bind_arguments(vec![], named(&[("b", 1)])).unwrap_err();
        assert_eq!(err.message, "missing arguments [a]");
    }

    #[test]
    fn test_owner_bound_as_this() {
        let f = Rc::new(add_function());
        let owner = Value::list(vec![]);
        let owned = f.reassign_owner(&owner);
        assert!(Rc::ptr_eq(&owned, &owned.reassign_owner(&owner)));
        let bound = owned.bind_arguments(vec![Value::Integer(1)], IndexMap::new()).unwrap();
        assert!(bound["this"].same_object(&owner));
        assert!(owned.without_owner().owner.is_none());
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = add_function();
        let b = add_function();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), Function::constant(&Value::Integer(3)).fingerprint());
    }
}
