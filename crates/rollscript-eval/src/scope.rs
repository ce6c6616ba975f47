//! Lexical scopes.
//!
//! A scope is a shared variable table with an optional parent. Closures
//! keep their defining scope alive, and several calls may alias the same
//! ancestor, so scopes are reference counted with interior mutability.
//! Parents are always created before their children, so no cycle can form
//! through the parent chain.

use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

struct ScopeData {
    variables: ValueMap,
    parent: Option<Scope>,
    depth: u32,
}

/// Shared handle to a variable table.
///
/// Reads search the chain outward and yield `Undef` when nothing is bound.
/// [`Scope::set`] overwrites the nearest existing binding, or creates a new
/// one in this scope when the name is unbound everywhere.
#[derive(Clone)]
pub struct Scope(Rc<ScopeData>);

impl Scope {
    /// A fresh outermost scope.
    pub fn root() -> Self {
        Self::with_variables(None, IndexMap::new(), 0)
    }

    /// A child scope with the same call depth (loops, blocks).
    pub fn child(&self) -> Self {
        Self::with_variables(Some(self.clone()), IndexMap::new(), self.depth())
    }

    /// A scope with explicit parent, initial bindings and depth.
    pub fn with_variables(
        parent: Option<Scope>,
        variables: IndexMap<String, Value>,
        depth: u32,
    ) -> Self {
        Scope(Rc::new(ScopeData {
            variables: Rc::new(RefCell::new(variables)),
            parent,
            depth,
        }))
    }

    /// Identity of this scope, shared by every handle to it.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Call depth of this scope.
    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    pub fn parent(&self) -> Option<&Scope> {
        self.0.parent.as_ref()
    }

    /// The outermost ancestor.
    pub fn root_scope(&self) -> Scope {
        let mut scope = self;
        while let Some(parent) = scope.parent() {
            scope = parent;
        }
        scope.clone()
    }

    /// The live variable table of this scope (not its ancestors).
    pub fn variables(&self) -> ValueMap {
        Rc::clone(&self.0.variables)
    }

    /// The nearest scope binding `name`.
    fn owner_of(&self, name: &str) -> Option<&Scope> {
        let mut scope = Some(self);
        while let Some(s) = scope {
            if s.0.variables.borrow().contains_key(name) {
                return Some(s);
            }
            scope = s.parent();
        }
        None
    }

    /// The value bound to `name`, searching outward.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.owner_of(name)
            .and_then(|s| s.0.variables.borrow().get(name).cloned())
    }

    /// The value bound to `name`, or `Undef` when unbound.
    pub fn get(&self, name: &str) -> Value {
        self.lookup(name).unwrap_or_default()
    }

    /// Whether `name` is bound here or in an ancestor.
    pub fn has(&self, name: &str) -> bool {
        self.owner_of(name).is_some()
    }

    /// Whether `name` is bound in this scope itself.
    pub fn has_local(&self, name: &str) -> bool {
        self.0.variables.borrow().contains_key(name)
    }

    /// Overwrite the nearest binding of `name`, or bind it here.
    pub fn set(&self, name: &str, value: Value) {
        let target = self.owner_of(name).unwrap_or(self);
        target
            .0
            .variables
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    /// Bind `name` in this scope, shadowing any outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.0
            .variables
            .borrow_mut()
            .insert(name.to_string(), value);
    }

    /// Whether both handles point to the same scope.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.0.variables.borrow().keys().cloned().collect();
        f.debug_struct("Scope")
            .field("depth", &self.depth())
            .field("variables", &names)
            .field("has_parent", &self.parent().is_some())
            .finish()
    }
}
