//! Lexical scope arena
//!
//! Scopes are arena-allocated and linked by parent id, because function
//! values must outlive the call that created their defining scope (a nested
//! definition returned or called later still resolves names through it).
//! Name lookup walks the parent chain; plain assignment always binds in the
//! current scope.

use crate::memory::value::Value;
use rustc_hash::FxHashMap;

/// Handle to one scope in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// One lexical scope: its bindings plus the enclosing scope
#[derive(Debug, Default)]
pub struct Scope {
    pub vars: FxHashMap<String, Value>,
    pub parent: Option<ScopeId>,
}

/// Arena of scopes for one invocation. Index 0 is the module (global) scope.
#[derive(Debug)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    /// The module-level scope
    pub fn global(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Create a new scope chained to `parent`
    pub fn push(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            vars: FxHashMap::default(),
            parent: Some(parent),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Bind a name in `scope` (shadows any outer binding)
    pub fn bind(&mut self, scope: ScopeId, name: &str, value: Value) {
        self.scopes[scope.0].vars.insert(name.to_string(), value);
    }

    /// Resolve a name by walking the parent chain
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = &self.scopes[id.0];
            if let Some(value) = s.vars.get(name) {
                return Some(value.clone());
            }
            current = s.parent;
        }
        None
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parent_chain() {
        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "x", Value::Int(1));
        let inner = scopes.push(global);
        assert_eq!(scopes.lookup(inner, "x"), Some(Value::Int(1)));
    }

    #[test]
    fn bind_shadows_outer() {
        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "x", Value::Int(1));
        let inner = scopes.push(global);
        scopes.bind(inner, "x", Value::Int(2));
        assert_eq!(scopes.lookup(inner, "x"), Some(Value::Int(2)));
        assert_eq!(scopes.lookup(global, "x"), Some(Value::Int(1)));
    }

    #[test]
    fn missing_name_is_none() {
        let scopes = Scopes::new();
        assert_eq!(scopes.lookup(scopes.global(), "missing"), None);
    }
}
