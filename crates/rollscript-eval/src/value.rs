//! Runtime values.
//!
//! Lists and maps are shared and mutable: a value copied into a variable
//! aliases the same container, so `draw`, `<<` and subscript assignment
//! are visible through every alias. Use [`Value::copy`] or
//! [`Value::deep_copy`] to break sharing.

use crate::function::Function;
use indexmap::IndexMap;
use rollscript_types::ast::{Expr, ExprKind, Lambda};
use rollscript_types::ValueType;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// Shared, mutable list storage.
pub type ValueList = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable, insertion-ordered map storage.
pub type ValueMap = Rc<RefCell<IndexMap<String, Value>>>;

/// A dynamically typed runtime value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undef,
    Boolean(bool),
    Integer(i64),
    String(String),
    List(ValueList),
    Map(ValueMap),
    Function(Rc<Function>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<String, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// Build a map from `(key, value)` pairs, keeping their order.
    pub fn map_from<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// The variant of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Undef => ValueType::Undef,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::String(_) => ValueType::String,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Function(_) => ValueType::Function,
        }
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Value::Undef)
    }

    /// Whether two values are the same object (containers and functions)
    /// or equal scalars.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::List(_) | Value::Map(_) | Value::Function(_), _)
            | (_, Value::List(_) | Value::Map(_) | Value::Function(_)) => false,
            _ => self == other,
        }
    }

    // ── Copies ───────────────────────────────────────────────────────────

    /// Duplicate the top-level container. Functions lose their owner.
    pub fn copy(&self) -> Value {
        match self {
            Value::List(items) => Value::list(items.borrow().clone()),
            Value::Map(entries) => Value::map(entries.borrow().clone()),
            Value::Function(f) => Value::Function(f.without_owner()),
            other => other.clone(),
        }
    }

    /// Duplicate containers recursively. Functions lose their owner.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::List(items) => {
                Value::list(items.borrow().iter().map(Value::deep_copy).collect())
            }
            Value::Map(entries) => Value::map(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            Value::Function(f) => Value::Function(f.without_owner()),
            other => other.clone(),
        }
    }

    // ── Conversions to source & JSON ─────────────────────────────────────

    /// A literal or constructor expression that evaluates to this value.
    ///
    /// Functions become lambdas whose named defaults are the captured
    /// default values; the defining scope is not represented.
    pub fn to_expr(&self) -> Expr {
        let kind = match self {
            Value::Undef => ExprKind::Undef,
            Value::Boolean(b) => ExprKind::Boolean(*b),
            Value::Integer(n) => ExprKind::Integer(*n),
            Value::String(s) => ExprKind::String(s.clone()),
            Value::List(items) => {
                ExprKind::List(items.borrow().iter().map(Value::to_expr).collect())
            }
            Value::Map(entries) => ExprKind::Map(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_expr()))
                    .collect(),
            ),
            Value::Function(f) => ExprKind::Lambda(Box::new(Lambda {
                positional: f.positional.clone(),
                named: f
                    .named
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_expr()))
                    .collect(),
                body: Rc::clone(&f.body),
            })),
        };
        Expr::synthetic(kind)
    }

    /// JSON snapshot for presentation layers. Functions render as source.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undef => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.borrow().iter().map(Value::to_json).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Function(_) => serde_json::Value::String(self.to_expr().render()),
        }
    }

    /// Rank of the variant in the total order.
    fn rank(&self) -> u8 {
        match self {
            Value::Undef => 0,
            Value::String(_) => 1,
            Value::Boolean(_) => 2,
            Value::Integer(_) => 3,
            Value::List(_) => 4,
            Value::Map(_) => 5,
            Value::Function(_) => 6,
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Equality & ordering
// ══════════════════════════════════════════════════════════════════════════════

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order: `undef < string < boolean < integer < list < map < function`.
///
/// Lists compare element by element, the shorter being less when it is a
/// prefix of the other. Maps compare their values in insertion order the
/// same way, then their keys. Functions compare by source fingerprint,
/// then by defining scope; the owner is ignored, so every extraction of
/// the same closure is one value.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Undef, Value::Undef) => Ordering::Equal,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                a.borrow().iter().cmp(b.borrow().iter())
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                let (a, b) = (a.borrow(), b.borrow());
                a.values()
                    .cmp(b.values())
                    .then_with(|| a.keys().cmp(b.keys()))
            }
            (Value::Function(a), Value::Function(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ordering::Equal;
                }
                a.fingerprint()
                    .cmp(&b.fingerprint())
                    .then_with(|| a.scope.id().cmp(&b.scope.id()))
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Formatting & conversions
// ══════════════════════════════════════════════════════════════════════════════

/// Source-literal form, e.g. `[1, "a", { k: true }]`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expr().render())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undef => write!(f, "Undef"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::List(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Map(entries) => f.debug_map().entries(entries.borrow().iter()).finish(),
            Value::Function(_) => write!(f, "Function({self})"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(ns: &[i64]) -> Value {
        Value::list(ns.iter().copied().map(Value::Integer).collect())
    }

    #[test]
    fn test_variant_order() {
        let ordered = vec![
            Value::Undef,
            Value::string("zzz"),
            Value::Boolean(false),
            Value::Integer(-5),
            ints(&[]),
            Value::map_from(Vec::<(String, Value)>::new()),
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0] < pair[1], "{:?} < {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_list_order_prefix_is_less() {
        assert!(ints(&[1, 2]) < ints(&[1, 2, 0]));
        assert!(ints(&[1, 3]) > ints(&[1, 2, 9]));
        assert_eq!(ints(&[4, 5]), ints(&[4, 5]));
    }

    #[test]
    fn test_map_order_by_values() {
        let a = Value::map_from([("x", Value::Integer(1)), ("y", Value::Integer(2))]);
        let b = Value::map_from([("a", Value::Integer(1)), ("b", Value::Integer(3))]);
        assert!(a < b);
        let c = Value::map_from([("x", Value::Integer(1))]);
        assert_ne!(a, c);
        assert!(c < a);
    }

    #[test]
    fn test_map_keys_break_value_ties() {
        let a = Value::map_from([("a", Value::Integer(1))]);
        let b = Value::map_from([("b", Value::Integer(1))]);
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn test_function_order_ignores_owner() {
        use crate::function::Function;
        use crate::scope::Scope;
        use rollscript_types::ast::Expr;

        let scope = Scope::root();
        let f = Rc::new(Function::new(
            scope.clone(),
            Vec::new(),
            Default::default(),
            Rc::new(Expr::integer(1)),
        ));
        let owner = ints(&[]);
        let owned = Value::Function(f.reassign_owner(&owner));
        let again = Value::Function(f.reassign_owner(&ints(&[])));
        assert_eq!(owned, Value::Function(Rc::clone(&f)));
        assert_eq!(owned, again);
        assert_eq!(owned.deep_copy(), owned);

        let elsewhere = Value::Function(Rc::new(Function::new(
            scope.child(),
            Vec::new(),
            Default::default(),
            Rc::new(Expr::integer(1)),
        )));
        assert_ne!(elsewhere, owned);
    }

    #[test]
    fn test_copy_breaks_top_level_sharing() {
        let inner = ints(&[1]);
        let outer = Value::list(vec![inner.clone()]);
        let shallow = outer.copy();
        let deep = outer.deep_copy();
        if let Value::List(l) = &inner {
            l.borrow_mut().push(Value::Integer(2));
        }
        assert_eq!(shallow, Value::list(vec![ints(&[1, 2])]));
        assert_eq!(deep, Value::list(vec![ints(&[1])]));
        assert!(!shallow.same_object(&outer));
    }

    #[test]
    fn test_display_as_literal() {
        let v = Value::list(vec![
            Value::Integer(1),
            Value::string("a"),
            Value::map_from([("k", Value::Boolean(true))]),
            Value::Undef,
        ]);
        assert_eq!(v.to_string(), "[1, \"a\", { k: true }, undef]");
    }

    #[test]
    fn test_to_json() {
        let v = Value::map_from([("n", Value::Integer(3)), ("l", ints(&[1, 2]))]);
        assert_eq!(v.to_json(), serde_json::json!({"n": 3, "l": [1, 2]}));
        assert_eq!(Value::Undef.to_json(), serde_json::Value::Null);
    }
}
