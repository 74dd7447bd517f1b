//! Object arena for compound subject values
//!
//! The arena owns every compound value the subject program creates and hands
//! out [`ObjId`] handles. Handles are stable and unique for the lifetime of
//! one trace invocation, which makes them usable as identity tokens: the
//! linked-chain walker and the tree serializer key their visited sets on
//! `ObjId`, and the tree wire format exposes it as the node `id`.

use crate::memory::value::Value;
use crate::parser::ast::Stmt;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// Stable identity token for one arena object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub usize);

/// A function value: parameters, body, and the scope it was defined in
#[derive(Debug, Clone)]
pub struct FunctionObj {
    pub name: String,
    pub params: Vec<String>,
    pub body: Rc<Vec<Stmt>>,
    pub closure: crate::memory::scope::ScopeId,
    pub is_async: bool,
}

/// A class value: name plus method table
#[derive(Debug, Clone)]
pub struct ClassObj {
    pub name: String,
    /// Method name → function object in the arena
    pub methods: FxHashMap<String, ObjId>,
}

/// An instance of a subject class
#[derive(Debug, Clone)]
pub struct InstanceObj {
    pub class: ObjId,
    pub fields: FxHashMap<String, Value>,
}

/// Heap objects
#[derive(Debug, Clone)]
pub enum Object {
    List(Vec<Value>),
    /// Insertion-ordered key/value pairs; lookups are linear, which is fine
    /// for the short illustrative programs this crate executes
    Dict(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
    Range {
        start: i64,
        stop: i64,
        step: i64,
    },
    Function(FunctionObj),
    Class(ClassObj),
    Instance(InstanceObj),
}

impl Object {
    /// Short human-readable type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::List(_) => "list",
            Object::Dict(_) => "dict",
            Object::Tuple(_) => "tuple",
            Object::Range { .. } => "range",
            Object::Function(_) => "function",
            Object::Class(_) => "class",
            Object::Instance(_) => "instance",
        }
    }
}

/// Arena owning all compound values of one invocation
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move an object into the arena and return its identity token
    pub fn alloc(&mut self, object: Object) -> ObjId {
        let id = ObjId(self.objects.len());
        self.objects.push(object);
        id
    }

    pub fn get(&self, id: ObjId) -> &Object {
        &self.objects[id.0]
    }

    pub fn get_mut(&mut self, id: ObjId) -> &mut Object {
        &mut self.objects[id.0]
    }

    /// Number of live objects (the arena never frees within a run)
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
