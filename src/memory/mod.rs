//! Runtime memory model
//!
//! - [`value`]: tagged [`value::Value`] — immediate scalars plus references
//!   into the object arena.
//! - [`heap`]: the object arena. Compound subject values (lists, dicts,
//!   tuples, ranges, functions, classes, instances) live here and are
//!   addressed by [`heap::ObjId`], the stable per-run identity token used for
//!   cycle detection and the tree serializer's `id` field.
//! - [`scope`]: lexical environments. Scopes form parent chains; function
//!   values capture their defining scope, which gives nested definitions
//!   access to siblings and enclosing locals.

pub mod heap;
pub mod scope;
pub mod value;
