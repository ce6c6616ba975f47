//! Import resolution.
//!
//! An `import` expression names an address; the resolver turns it into the
//! bindings the imported module exports. Where those bindings come from
//! (files, URLs, bundled libraries) is up to the embedder.

use crate::value::{Value, ValueMap};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Maps an import address to exported bindings.
pub trait ImportResolver {
    /// The bindings exported at `address`, or `None` when nothing is there.
    fn resolve(&mut self, address: &str) -> Option<ValueMap>;
}

/// Resolver that never finds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImports;

impl ImportResolver for NoImports {
    fn resolve(&mut self, _address: &str) -> Option<ValueMap> {
        None
    }
}

/// Resolver over bindings registered in advance.
#[derive(Debug, Clone, Default)]
pub struct MapImportResolver {
    modules: HashMap<String, ValueMap>,
}

impl MapImportResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bindings` under `address`.
    pub fn with_module(
        mut self,
        address: impl Into<String>,
        bindings: IndexMap<String, Value>,
    ) -> Self {
        self.insert(address, bindings);
        self
    }

    pub fn insert(&mut self, address: impl Into<String>, bindings: IndexMap<String, Value>) {
        self.modules
            .insert(address.into(), Rc::new(RefCell::new(bindings)));
    }
}

impl ImportResolver for MapImportResolver {
    fn resolve(&mut self, address: &str) -> Option<ValueMap> {
        self.modules.get(address).cloned()
    }
}

/// Memoizes an inner resolver, misses included.
pub struct ImportCache<R> {
    inner: R,
    cache: HashMap<String, Option<ValueMap>>,
}

impl<R: ImportResolver> ImportCache<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
        }
    }

    /// Number of distinct addresses looked up so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<R: ImportResolver> ImportResolver for ImportCache<R> {
    fn resolve(&mut self, address: &str) -> Option<ValueMap> {
        if let Some(cached) = self.cache.get(address) {
            tracing::trace!(address, found = cached.is_some(), "import cache hit");
            return cached.clone();
        }
        let resolved = self.inner.resolve(address);
        self.cache.insert(address.to_string(), resolved.clone());
        resolved
    }
}

/// Tries resolvers in order; the first hit wins.
#[derive(Default)]
pub struct ImportChain {
    resolvers: Vec<Box<dyn ImportResolver>>,
}

impl ImportChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, resolver: impl ImportResolver + 'static) -> Self {
        self.push(resolver);
        self
    }

    pub fn push(&mut self, resolver: impl ImportResolver + 'static) {
        self.resolvers.push(Box::new(resolver));
    }
}

impl ImportResolver for ImportChain {
    fn resolve(&mut self, address: &str) -> Option<ValueMap> {
        self.resolvers.iter_mut().find_map(|r| r.resolve(address))
    }
}
