//! Frame serialization
//!
//! Classifies every binding of the innermost scope into the frame's buckets
//! and deep-copies it to JSON. Classification is by shape, in a fixed order:
//! list, dict, scalar, `next`-linked chain, `left`/`right` tree, otherwise
//! omitted (functions, classes, tuples, ranges, unrecognized instances).
//!
//! Serialization failures are contained by construction: each binding
//! serializes independently, a failure is logged and that binding omitted,
//! and the run continues. Nothing in here can abort execution.

use crate::interpreter::constants::MAX_SERIALIZE_DEPTH;
use crate::memory::heap::{Heap, InstanceObj, ObjId, Object};
use crate::memory::scope::Scope;
use crate::memory::value::Value;
use crate::trace::TraceFrame;
use rustc_hash::FxHashSet;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use thiserror::Error;

/// A contained failure to serialize one binding
#[derive(Debug, Clone, Error)]
pub enum SnapshotError {
    #[error("cyclic structure in binding")]
    Cycle,
    #[error("value nesting exceeds depth {0}")]
    DepthExceeded(usize),
    #[error("dict key of type '{0}' is not serializable")]
    UnsupportedKey(&'static str),
    #[error("value of type '{0}' is not serializable")]
    UnsupportedValue(&'static str),
}

/// Names reserved by the instrumentation layer; bindings carrying this
/// prefix never appear in a frame
const RESERVED_PREFIX: &str = "__";

/// Build one frame from the bindings of `scope`
pub fn capture_frame(line_no: u32, scope: &Scope, heap: &Heap) -> TraceFrame {
    let mut frame = TraceFrame {
        line_no,
        ..TraceFrame::default()
    };
    let mut int_bindings: BTreeMap<String, i64> = BTreeMap::new();

    for (name, value) in &scope.vars {
        if name.starts_with(RESERVED_PREFIX) {
            continue;
        }
        match classify_binding(name, value, heap, &mut frame) {
            Ok(()) => {
                if let Value::Int(n) = value {
                    int_bindings.insert(name.clone(), *n);
                }
            }
            Err(err) => {
                tracing::warn!(binding = %name, error = %err, "skipping unserializable binding");
            }
        }
    }

    // Index-reference table: ints that currently index into a captured list
    for (var, index) in &int_bindings {
        for (list_name, list_value) in &frame.lists {
            let len = list_value.as_array().map(|a| a.len()).unwrap_or(0);
            if *index >= 0 && (*index as usize) < len {
                frame
                    .array_indices
                    .entry(list_name.clone())
                    .or_default()
                    .push((var.clone(), *index));
            }
        }
    }

    frame
}

/// Classify one binding and write it into the matching frame bucket
fn classify_binding(
    name: &str,
    value: &Value,
    heap: &Heap,
    frame: &mut TraceFrame,
) -> Result<(), SnapshotError> {
    match value {
        Value::Ref(id) => match heap.get(*id) {
            Object::List(_) => {
                let copied = value_to_json(value, heap, 0, &mut FxHashSet::default())?;
                frame.lists.insert(name.to_string(), copied);
            }
            Object::Dict(_) => {
                let copied = value_to_json(value, heap, 0, &mut FxHashSet::default())?;
                frame.dicts.insert(name.to_string(), copied);
            }
            Object::Instance(inst) => {
                if inst.fields.contains_key("next") {
                    let chain = walk_chain(*id, heap)?;
                    frame.linked.insert(name.to_string(), chain);
                } else if inst.fields.contains_key("left") || inst.fields.contains_key("right") {
                    let tree = tree_to_json(*id, heap, &mut FxHashSet::default())?;
                    frame.trees.insert(name.to_string(), tree);
                }
                // Other instances are silently omitted
            }
            // Tuples, ranges, functions, classes are silently omitted
            _ => {}
        },
        scalar => {
            frame
                .prims
                .insert(name.to_string(), scalar_to_json(scalar));
        }
    }
    Ok(())
}

/// Deep-copy a value to JSON with a depth bound and identity cycle guard
fn value_to_json(
    value: &Value,
    heap: &Heap,
    depth: usize,
    visited: &mut FxHashSet<ObjId>,
) -> Result<JsonValue, SnapshotError> {
    if depth > MAX_SERIALIZE_DEPTH {
        return Err(SnapshotError::DepthExceeded(MAX_SERIALIZE_DEPTH));
    }

    match value {
        Value::Ref(id) => {
            let object = heap.get(*id);
            match object {
                Object::List(items) | Object::Tuple(items) => {
                    if !visited.insert(*id) {
                        return Err(SnapshotError::Cycle);
                    }
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(value_to_json(item, heap, depth + 1, visited)?);
                    }
                    visited.remove(id);
                    Ok(JsonValue::Array(out))
                }
                Object::Dict(entries) => {
                    if !visited.insert(*id) {
                        return Err(SnapshotError::Cycle);
                    }
                    let mut map = serde_json::Map::with_capacity(entries.len());
                    for (key, val) in entries {
                        map.insert(json_key(key)?, value_to_json(val, heap, depth + 1, visited)?);
                    }
                    visited.remove(id);
                    Ok(JsonValue::Object(map))
                }
                other => Err(SnapshotError::UnsupportedValue(other.type_name())),
            }
        }
        scalar => Ok(scalar_to_json(scalar)),
    }
}

/// Scalars always serialize; non-finite floats become strings because JSON
/// has no literal for them
fn scalar_to_json(value: &Value) -> JsonValue {
    match value {
        Value::None => JsonValue::Null,
        Value::Bool(b) => json!(b),
        Value::Int(n) => json!(n),
        Value::Float(x) => {
            if x.is_finite() {
                json!(x)
            } else if x.is_nan() {
                json!("NaN")
            } else if *x > 0.0 {
                json!("Infinity")
            } else {
                json!("-Infinity")
            }
        }
        Value::Str(s) => json!(s),
        Value::Ref(_) => JsonValue::Null,
    }
}

/// JSON object keys must be strings; scalar keys stringify, compound keys
/// are a contained failure
fn json_key(key: &Value) -> Result<String, SnapshotError> {
    match key {
        Value::Str(s) => Ok(s.clone()),
        Value::Int(n) => Ok(n.to_string()),
        Value::Float(x) => Ok(x.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::None => Ok("null".to_string()),
        Value::Ref(_) => Err(SnapshotError::UnsupportedKey("object")),
    }
}

/// Walk a `next`-linked chain collecting each node's `val`. The visited set
/// is keyed by object identity, so a cyclic chain yields a finite sequence:
/// one entry per distinct node before the first repeat.
fn walk_chain(start: ObjId, heap: &Heap) -> Result<JsonValue, SnapshotError> {
    let mut values = Vec::new();
    let mut seen: FxHashSet<ObjId> = FxHashSet::default();
    let mut current = Some(start);

    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        let Object::Instance(inst) = heap.get(id) else {
            break;
        };
        let val = inst.fields.get("val").cloned().unwrap_or(Value::None);
        values.push(value_to_json(&val, heap, 0, &mut FxHashSet::default())?);

        current = match inst.fields.get("next") {
            Some(Value::Ref(next_id)) if matches!(heap.get(*next_id), Object::Instance(_)) => {
                Some(*next_id)
            }
            _ => None,
        };
    }

    Ok(JsonValue::Array(values))
}

/// Serialize a binary tree to nested `{id, val, left, right}` records.
/// `id` is the arena token, stable and unique within the run; the visualizer
/// uses it only to correlate nodes across frames.
fn tree_to_json(
    id: ObjId,
    heap: &Heap,
    visited: &mut FxHashSet<ObjId>,
) -> Result<JsonValue, SnapshotError> {
    if !visited.insert(id) {
        return Err(SnapshotError::Cycle);
    }

    let Object::Instance(inst) = heap.get(id) else {
        return Ok(JsonValue::Null);
    };

    let val = inst.fields.get("val").cloned().unwrap_or(Value::None);
    let val = value_to_json(&val, heap, 0, &mut FxHashSet::default())?;

    let left = child_to_json(inst, "left", heap, visited)?;
    let right = child_to_json(inst, "right", heap, visited)?;

    Ok(json!({
        "id": id.0,
        "val": val,
        "left": left,
        "right": right,
    }))
}

/// A missing, `None`, or non-instance child serializes as null
fn child_to_json(
    inst: &InstanceObj,
    field: &str,
    heap: &Heap,
    visited: &mut FxHashSet<ObjId>,
) -> Result<JsonValue, SnapshotError> {
    match inst.fields.get(field) {
        Some(Value::Ref(child)) if matches!(heap.get(*child), Object::Instance(_)) => {
            tree_to_json(*child, heap, visited)
        }
        _ => Ok(JsonValue::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::heap::{ClassObj, FunctionObj};
    use crate::memory::scope::Scopes;
    use rustc_hash::FxHashMap;
    use std::rc::Rc;

    fn instance(heap: &mut Heap, class: ObjId, fields: Vec<(&str, Value)>) -> ObjId {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<FxHashMap<_, _>>();
        heap.alloc(Object::Instance(InstanceObj { class, fields }))
    }

    fn node_class(heap: &mut Heap) -> ObjId {
        heap.alloc(Object::Class(ClassObj {
            name: "Node".to_string(),
            methods: FxHashMap::default(),
        }))
    }

    #[test]
    fn scalars_and_lists_are_classified() {
        let mut heap = Heap::new();
        let list = heap.alloc(Object::List(vec![
            Value::Int(5),
            Value::Int(1),
            Value::Int(9),
        ]));

        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "arr", Value::Ref(list));
        scopes.bind(global, "i", Value::Int(1));
        scopes.bind(global, "name", Value::Str("merge".to_string()));

        let frame = capture_frame(3, scopes.get(global), &heap);
        assert_eq!(frame.line_no, 3);
        assert_eq!(frame.lists["arr"], json!([5, 1, 9]));
        assert_eq!(frame.prims["i"], json!(1));
        assert_eq!(frame.prims["name"], json!("merge"));
    }

    #[test]
    fn index_reference_table_pairs_ints_with_lists() {
        let mut heap = Heap::new();
        let list = heap.alloc(Object::List(vec![
            Value::Int(5),
            Value::Int(1),
            Value::Int(9),
        ]));

        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "arr", Value::Ref(list));
        scopes.bind(global, "i", Value::Int(1));
        scopes.bind(global, "big", Value::Int(7));
        scopes.bind(global, "neg", Value::Int(-1));

        let frame = capture_frame(1, scopes.get(global), &heap);
        let pairs = &frame.array_indices["arr"];
        assert_eq!(pairs, &vec![("i".to_string(), 1)]);
    }

    #[test]
    fn reserved_names_are_skipped() {
        let heap = Heap::new();
        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "__internal", Value::Int(1));
        scopes.bind(global, "x", Value::Int(2));

        let frame = capture_frame(1, scopes.get(global), &heap);
        assert!(!frame.prims.contains_key("__internal"));
        assert!(frame.prims.contains_key("x"));
    }

    #[test]
    fn functions_are_silently_omitted() {
        let mut heap = Heap::new();
        let mut scopes = Scopes::new();
        let global = scopes.global();
        let func = heap.alloc(Object::Function(FunctionObj {
            name: "f".to_string(),
            params: vec![],
            body: Rc::new(vec![]),
            closure: global,
            is_async: false,
        }));
        scopes.bind(global, "f", Value::Ref(func));

        let frame = capture_frame(1, scopes.get(global), &heap);
        assert!(frame.prims.is_empty());
        assert!(frame.lists.is_empty());
    }

    #[test]
    fn cyclic_chain_serializes_finitely() {
        let mut heap = Heap::new();
        let class = node_class(&mut heap);
        let a = instance(&mut heap, class, vec![("val", Value::Int(1)), ("next", Value::None)]);
        let b = instance(
            &mut heap,
            class,
            vec![("val", Value::Int(2)), ("next", Value::Ref(a))],
        );
        // Close the cycle: a.next = b
        if let Object::Instance(inst) = heap.get_mut(a) {
            inst.fields.insert("next".to_string(), Value::Ref(b));
        }

        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "head", Value::Ref(a));

        let frame = capture_frame(1, scopes.get(global), &heap);
        // Two distinct nodes before the first repeat
        assert_eq!(frame.linked["head"], json!([1, 2]));
    }

    #[test]
    fn tree_serializes_with_identity_tokens() {
        let mut heap = Heap::new();
        let class = node_class(&mut heap);
        let leaf_l = instance(
            &mut heap,
            class,
            vec![
                ("val", Value::Int(1)),
                ("left", Value::None),
                ("right", Value::None),
            ],
        );
        let leaf_r = instance(
            &mut heap,
            class,
            vec![
                ("val", Value::Int(3)),
                ("left", Value::None),
                ("right", Value::None),
            ],
        );
        let root = instance(
            &mut heap,
            class,
            vec![
                ("val", Value::Int(2)),
                ("left", Value::Ref(leaf_l)),
                ("right", Value::Ref(leaf_r)),
            ],
        );

        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "root", Value::Ref(root));

        let frame = capture_frame(1, scopes.get(global), &heap);
        let tree = &frame.trees["root"];
        assert_eq!(tree["val"], json!(2));
        assert_eq!(tree["left"]["val"], json!(1));
        assert_eq!(tree["right"]["val"], json!(3));
        assert_eq!(tree["left"]["left"], JsonValue::Null);
        // Identity tokens are distinct
        assert_ne!(tree["id"], tree["left"]["id"]);
    }

    #[test]
    fn cyclic_nested_list_is_contained() {
        let mut heap = Heap::new();
        let list = heap.alloc(Object::List(vec![]));
        if let Object::List(items) = heap.get_mut(list) {
            items.push(Value::Ref(list));
        }

        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "weird", Value::Ref(list));
        scopes.bind(global, "ok", Value::Int(1));

        // The cyclic binding is dropped; the frame still builds
        let frame = capture_frame(1, scopes.get(global), &heap);
        assert!(!frame.lists.contains_key("weird"));
        assert_eq!(frame.prims["ok"], json!(1));
    }

    #[test]
    fn nonfinite_floats_serialize_as_strings() {
        let heap = Heap::new();
        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "inf", Value::Float(f64::INFINITY));

        let frame = capture_frame(1, scopes.get(global), &heap);
        assert_eq!(frame.prims["inf"], json!("Infinity"));
    }

    #[test]
    fn dict_keys_stringify() {
        let mut heap = Heap::new();
        let dict = heap.alloc(Object::Dict(vec![
            (Value::Str("a".to_string()), Value::Int(1)),
            (Value::Int(2), Value::Int(3)),
        ]));

        let mut scopes = Scopes::new();
        let global = scopes.global();
        scopes.bind(global, "d", Value::Ref(dict));

        let frame = capture_frame(1, scopes.get(global), &heap);
        assert_eq!(frame.dicts["d"], json!({"a": 1, "2": 3}));
    }
}
