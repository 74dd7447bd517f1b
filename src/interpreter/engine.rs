//! Execution engine for the subject-language interpreter
//!
//! The interpreter walks an instrumented AST. All mutable state — the object
//! arena, the scope arena, the trace recorder — lives on the interpreter and
//! is constructed fresh per invocation, so concurrent traces share nothing.
//! The two hook statements drive the recorder: `SetLine` overwrites the
//! current-line cell and `Snapshot` captures the innermost scope into a
//! frame. A snapshot failure is logged and skipped; it never aborts the run.

use crate::interpreter::constants::{MAX_CALL_DEPTH, MAX_ITERABLE_LEN, MAX_STEPS};
use crate::interpreter::errors::RuntimeError;
use crate::memory::heap::{ClassObj, FunctionObj, Heap, InstanceObj, ObjId, Object};
use crate::memory::scope::{ScopeId, Scopes};
use crate::memory::value::Value;
use crate::parser::ast::*;
use crate::trace::{serialize, TraceFrame, TraceRecorder};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// How a statement list finished
#[derive(Debug, Clone)]
pub enum Flow {
    Normal,
    Break(SourceLocation),
    Continue(SourceLocation),
    Return(Value, SourceLocation),
}

/// The main interpreter for one trace invocation
pub struct Interpreter {
    pub(crate) heap: Heap,
    pub(crate) scopes: Scopes,
    pub(crate) current_scope: ScopeId,
    pub(crate) recorder: TraceRecorder,
    call_depth: usize,
    steps: u64,
}

impl Interpreter {
    /// Create a fresh interpreter with empty global scope and empty trace
    /// state
    pub fn new() -> Self {
        let scopes = Scopes::new();
        let current_scope = scopes.global();
        Interpreter {
            heap: Heap::new(),
            scopes,
            current_scope,
            recorder: TraceRecorder::new(),
            call_depth: 0,
            steps: 0,
        }
    }

    /// Run an instrumented program to completion
    pub fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        match self.exec_block(&program.body)? {
            Flow::Normal => Ok(()),
            Flow::Break(location) => Err(RuntimeError::BreakOutsideLoop { location }),
            Flow::Continue(location) => Err(RuntimeError::ContinueOutsideLoop { location }),
            Flow::Return(_, location) => Err(RuntimeError::ReturnOutsideFunction { location }),
        }
    }

    /// The frames recorded so far, consuming the interpreter
    pub fn into_frames(self) -> Vec<TraceFrame> {
        self.recorder.into_frames()
    }

    /// The subject program's captured `print` output
    pub fn output(&self) -> &[String] {
        self.recorder.output()
    }

    /// Execute a statement list, stopping early on any control-flow signal
    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in stmts {
            let flow = self.exec_stmt(stmt)?;
            if !matches!(flow, Flow::Normal) {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    /// Execute a single statement
    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        self.steps += 1;
        if self.steps > MAX_STEPS {
            return Err(RuntimeError::StepBudgetExceeded { limit: MAX_STEPS });
        }

        match stmt {
            Stmt::FunctionDef {
                name,
                params,
                body,
                is_async,
                ..
            } => {
                let func = self.heap.alloc(Object::Function(FunctionObj {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::new(body.clone()),
                    closure: self.current_scope,
                    is_async: *is_async,
                }));
                self.scopes.bind(self.current_scope, name, Value::Ref(func));
                Ok(Flow::Normal)
            }

            Stmt::ClassDef { name, body, .. } => {
                let class = self.exec_class_def(name, body);
                self.scopes.bind(self.current_scope, name, Value::Ref(class));
                Ok(Flow::Normal)
            }

            Stmt::Assign { targets, value, .. } => {
                let value = self.eval(value)?;
                for target in targets {
                    self.assign_target(target, value.clone())?;
                }
                Ok(Flow::Normal)
            }

            Stmt::AugAssign {
                target,
                op,
                value,
                location,
            } => {
                let current = self.eval(target)?;
                let rhs = self.eval(value)?;
                let result = self.binary_op(*op, current, rhs, *location)?;
                self.assign_target(target, result)?;
                Ok(Flow::Normal)
            }

            Stmt::Return { value, location } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::None,
                };
                Ok(Flow::Return(value, *location))
            }

            Stmt::If {
                condition,
                body,
                orelse,
                ..
            } => {
                let cond = self.eval(condition)?;
                if self.truthy(&cond) {
                    self.exec_block(body)
                } else {
                    self.exec_block(orelse)
                }
            }

            Stmt::While {
                condition,
                body,
                orelse,
                ..
            } => {
                loop {
                    let cond = self.eval(condition)?;
                    if !self.truthy(&cond) {
                        // Loop finished without break
                        return self.exec_block(orelse);
                    }
                    match self.exec_block(body)? {
                        Flow::Normal | Flow::Continue(_) => {}
                        Flow::Break(_) => return Ok(Flow::Normal),
                        ret @ Flow::Return(..) => return Ok(ret),
                    }
                }
            }

            Stmt::For {
                target,
                iter,
                body,
                orelse,
                location,
            } => {
                let iterable = self.eval(iter)?;
                let values = self.iter_values(&iterable, *location)?;
                for value in values {
                    self.assign_target(target, value)?;
                    match self.exec_block(body)? {
                        Flow::Normal | Flow::Continue(_) => {}
                        Flow::Break(_) => return Ok(Flow::Normal),
                        ret @ Flow::Return(..) => return Ok(ret),
                    }
                }
                self.exec_block(orelse)
            }

            Stmt::With {
                context,
                binding,
                body,
                ..
            } => {
                let value = self.eval(context)?;
                if let Some(name) = binding {
                    self.scopes.bind(self.current_scope, name, value);
                }
                self.exec_block(body)
            }

            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => self.exec_try(body, handlers, orelse, finalbody),

            Stmt::Expr { value, .. } => {
                self.eval(value)?;
                Ok(Flow::Normal)
            }

            Stmt::Break { location } => Ok(Flow::Break(*location)),
            Stmt::Continue { location } => Ok(Flow::Continue(*location)),
            Stmt::Pass { .. } => Ok(Flow::Normal),

            Stmt::SetLine { line, .. } => {
                self.recorder.set_line(*line);
                Ok(Flow::Normal)
            }

            Stmt::Snapshot { .. } => {
                self.take_snapshot();
                Ok(Flow::Normal)
            }
        }
    }

    /// Capture a frame from the innermost scope. Serialization problems are
    /// contained inside the serializer; this can only ever append.
    fn take_snapshot(&mut self) {
        let frame = serialize::capture_frame(
            self.recorder.current_line(),
            self.scopes.get(self.current_scope),
            &self.heap,
        );
        self.recorder.push_frame(frame);
    }

    /// Build a class object: the body's function definitions become methods,
    /// everything else in the class body is inert
    fn exec_class_def(&mut self, name: &str, body: &[Stmt]) -> ObjId {
        let mut methods = FxHashMap::default();
        for stmt in body {
            if let Stmt::FunctionDef {
                name: method_name,
                params,
                body: method_body,
                is_async,
                ..
            } = stmt
            {
                let func = self.heap.alloc(Object::Function(FunctionObj {
                    name: method_name.clone(),
                    params: params.clone(),
                    body: Rc::new(method_body.clone()),
                    closure: self.current_scope,
                    is_async: *is_async,
                }));
                methods.insert(method_name.clone(), func);
            }
        }
        self.heap.alloc(Object::Class(ClassObj {
            name: name.to_string(),
            methods,
        }))
    }

    /// `try`/`except`/`else`/`finally`. Any handler catches any runtime
    /// error; `finally` always runs and its own signals win.
    fn exec_try(
        &mut self,
        body: &[Stmt],
        handlers: &[ExceptHandler],
        orelse: &[Stmt],
        finalbody: &[Stmt],
    ) -> Result<Flow, RuntimeError> {
        let body_result = self.exec_block(body);

        let mut outcome = match body_result {
            Ok(Flow::Normal) => self.exec_block(orelse),
            Ok(flow) => Ok(flow),
            Err(error) => match handlers.first() {
                Some(handler) => {
                    if let Some(name) = &handler.binding {
                        self.scopes
                            .bind(self.current_scope, name, Value::Str(error.to_string()));
                    }
                    self.exec_block(&handler.body)
                }
                None => Err(error),
            },
        };

        if !finalbody.is_empty() {
            let final_flow = self.exec_block(finalbody)?;
            if !matches!(final_flow, Flow::Normal) {
                outcome = Ok(final_flow);
            }
        }

        outcome
    }

    // ===== Assignment =====

    /// Assign `value` to a target expression
    fn assign_target(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        match target {
            Expr::Name { id, .. } => {
                self.scopes.bind(self.current_scope, id, value);
                Ok(())
            }

            Expr::Attribute {
                object,
                attr,
                location,
            } => {
                let obj = self.eval(object)?;
                let Some(id) = obj.as_ref_id() else {
                    return Err(RuntimeError::AttributeError {
                        type_name: obj.type_name(),
                        attr: attr.clone(),
                        location: *location,
                    });
                };
                match self.heap.get_mut(id) {
                    Object::Instance(inst) => {
                        inst.fields.insert(attr.clone(), value);
                        Ok(())
                    }
                    other => Err(RuntimeError::AttributeError {
                        type_name: other.type_name(),
                        attr: attr.clone(),
                        location: *location,
                    }),
                }
            }

            Expr::Subscript {
                object,
                index,
                location,
            } => {
                let obj = self.eval(object)?;
                let Subscript::Index(index_expr) = index.as_ref() else {
                    return Err(RuntimeError::TypeError {
                        message: "slice assignment is not supported".to_string(),
                        location: *location,
                    });
                };
                let index_value = self.eval(index_expr)?;
                self.set_item(&obj, index_value, value, *location)
            }

            Expr::Tuple { elts, location } => {
                let values = match value.as_ref_id().map(|id| self.heap.get(id)) {
                    Some(Object::List(items)) | Some(Object::Tuple(items)) => items.clone(),
                    _ => {
                        return Err(RuntimeError::TypeError {
                            message: format!("cannot unpack '{}'", value.type_name()),
                            location: *location,
                        });
                    }
                };
                if values.len() != elts.len() {
                    return Err(RuntimeError::ValueError {
                        message: format!(
                            "expected {} values to unpack, got {}",
                            elts.len(),
                            values.len()
                        ),
                        location: *location,
                    });
                }
                for (elt, v) in elts.iter().zip(values) {
                    self.assign_target(elt, v)?;
                }
                Ok(())
            }

            other => Err(RuntimeError::TypeError {
                message: "cannot assign to this expression".to_string(),
                location: other.location(),
            }),
        }
    }

    /// `obj[index] = value`
    fn set_item(
        &mut self,
        obj: &Value,
        index: Value,
        value: Value,
        location: SourceLocation,
    ) -> Result<(), RuntimeError> {
        let Some(id) = obj.as_ref_id() else {
            return Err(RuntimeError::TypeError {
                message: format!("'{}' does not support item assignment", obj.type_name()),
                location,
            });
        };

        match self.heap.get(id) {
            Object::List(items) => {
                let len = items.len();
                let i = self.normalize_index(&index, len, location)?;
                let Object::List(items) = self.heap.get_mut(id) else {
                    unreachable!();
                };
                items[i] = value;
                Ok(())
            }
            Object::Dict(_) => {
                let existing = {
                    let Object::Dict(entries) = self.heap.get(id) else {
                        unreachable!();
                    };
                    entries
                        .iter()
                        .position(|(k, _)| self.values_equal(k, &index))
                };
                let Object::Dict(entries) = self.heap.get_mut(id) else {
                    unreachable!();
                };
                match existing {
                    Some(pos) => entries[pos].1 = value,
                    None => entries.push((index, value)),
                }
                Ok(())
            }
            other => Err(RuntimeError::TypeError {
                message: format!("'{}' does not support item assignment", other.type_name()),
                location,
            }),
        }
    }

    // ===== Expression evaluation =====

    /// Evaluate an expression and return its value
    pub(crate) fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Constant { value, .. } => Ok(match value {
                Constant::Int(n) => Value::Int(*n),
                Constant::Float(x) => Value::Float(*x),
                Constant::Str(s) => Value::Str(s.clone()),
                Constant::Bool(b) => Value::Bool(*b),
                Constant::None => Value::None,
            }),

            Expr::Name { id, location } => self
                .scopes
                .lookup(self.current_scope, id)
                .ok_or_else(|| RuntimeError::NameError {
                    name: id.clone(),
                    location: *location,
                }),

            Expr::List { elts, .. } => {
                let mut items = Vec::with_capacity(elts.len());
                for elt in elts {
                    items.push(self.eval(elt)?);
                }
                Ok(Value::Ref(self.heap.alloc(Object::List(items))))
            }

            Expr::Tuple { elts, .. } => {
                let mut items = Vec::with_capacity(elts.len());
                for elt in elts {
                    items.push(self.eval(elt)?);
                }
                Ok(Value::Ref(self.heap.alloc(Object::Tuple(items))))
            }

            Expr::Dict { entries, .. } => {
                let mut pairs: Vec<(Value, Value)> = Vec::with_capacity(entries.len());
                for (key_expr, value_expr) in entries {
                    let key = self.eval(key_expr)?;
                    let value = self.eval(value_expr)?;
                    match pairs.iter().position(|(k, _)| self.values_equal(k, &key)) {
                        Some(pos) => pairs[pos].1 = value,
                        None => pairs.push((key, value)),
                    }
                }
                Ok(Value::Ref(self.heap.alloc(Object::Dict(pairs))))
            }

            Expr::ListComp {
                elt,
                target,
                iter,
                condition,
                location,
            } => {
                let iterable = self.eval(iter)?;
                let values = self.iter_values(&iterable, *location)?;

                // The comprehension gets its own scope; the loop variable
                // does not leak
                let comp_scope = self.scopes.push(self.current_scope);
                let saved = self.current_scope;
                self.current_scope = comp_scope;

                let result: Result<Vec<Value>, RuntimeError> = (|| {
                    let mut items = Vec::new();
                    for value in values {
                        self.assign_target(target, value)?;
                        if let Some(condition) = condition {
                            let keep = self.eval(condition)?;
                            if !self.truthy(&keep) {
                                continue;
                            }
                        }
                        items.push(self.eval(elt)?);
                    }
                    Ok(items)
                })();

                self.current_scope = saved;
                let items = result?;
                Ok(Value::Ref(self.heap.alloc(Object::List(items))))
            }

            Expr::BoolOp {
                op, left, right, ..
            } => {
                let left = self.eval(left)?;
                let take_right = match op {
                    BoolOp::And => self.truthy(&left),
                    BoolOp::Or => !self.truthy(&left),
                };
                if take_right {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }

            Expr::BinaryOp {
                op,
                left,
                right,
                location,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.binary_op(*op, left, right, *location)
            }

            Expr::UnaryOp {
                op,
                operand,
                location,
            } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!self.truthy(&value))),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => {
                            n.checked_neg().map(Value::Int).ok_or_else(|| {
                                RuntimeError::ValueError {
                                    message: "integer overflow in negation".to_string(),
                                    location: *location,
                                }
                            })
                        }
                        Value::Float(x) => Ok(Value::Float(-x)),
                        Value::Bool(b) => Ok(Value::Int(if b { -1 } else { 0 })),
                        other => Err(RuntimeError::TypeError {
                            message: format!("bad operand type for unary -: '{}'", other.type_name()),
                            location: *location,
                        }),
                    },
                }
            }

            Expr::Compare {
                op,
                left,
                right,
                location,
            } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                let result = match op {
                    CmpOp::Eq => self.values_equal(&left, &right),
                    CmpOp::NotEq => !self.values_equal(&left, &right),
                    CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                        self.compare_order(*op, &left, &right, *location)?
                    }
                    CmpOp::In => self.contains(&right, &left, *location)?,
                    CmpOp::NotIn => !self.contains(&right, &left, *location)?,
                };
                Ok(Value::Bool(result))
            }

            Expr::Call {
                func,
                args,
                location,
            } => self.eval_call(func, args, *location),

            Expr::Attribute {
                object,
                attr,
                location,
            } => {
                let obj = self.eval(object)?;
                self.get_attribute(&obj, attr, *location)
            }

            Expr::Subscript {
                object,
                index,
                location,
            } => {
                let obj = self.eval(object)?;
                match index.as_ref() {
                    Subscript::Index(index_expr) => {
                        let index_value = self.eval(index_expr)?;
                        self.get_item(&obj, &index_value, *location)
                    }
                    Subscript::Slice { lower, upper, step } => {
                        let lower = self.eval_slice_part(lower)?;
                        let upper = self.eval_slice_part(upper)?;
                        let step = self.eval_slice_part(step)?;
                        self.get_slice(&obj, lower, upper, step, *location)
                    }
                }
            }
        }
    }

    fn eval_slice_part(&mut self, part: &Option<Expr>) -> Result<Option<i64>, RuntimeError> {
        match part {
            None => Ok(None),
            Some(expr) => {
                let value = self.eval(expr)?;
                match value.as_integral() {
                    Some(n) => Ok(Some(n)),
                    None => Err(RuntimeError::TypeError {
                        message: format!("slice index must be an integer, got '{}'", value.type_name()),
                        location: expr.location(),
                    }),
                }
            }
        }
    }

    // ===== Calls =====

    fn eval_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        // Method calls dispatch on the receiver
        if let Expr::Attribute { object, attr, .. } = func {
            let recv = self.eval(object)?;
            let arg_values = self.eval_args(args)?;
            return self.call_method(recv, attr, arg_values, location);
        }

        // Plain names fall back to builtins when unbound
        if let Expr::Name { id, .. } = func {
            let resolved = self.scopes.lookup(self.current_scope, id);
            let arg_values = self.eval_args(args)?;
            return match resolved {
                Some(value) => self.call_value(value, arg_values, location),
                None => self.call_builtin(id, arg_values, location),
            };
        }

        let callee = self.eval(func)?;
        let arg_values = self.eval_args(args)?;
        self.call_value(callee, arg_values, location)
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        Ok(values)
    }

    /// Call a first-class value: function or class
    pub(crate) fn call_value(
        &mut self,
        callee: Value,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let Some(id) = callee.as_ref_id() else {
            return Err(RuntimeError::TypeError {
                message: format!("'{}' object is not callable", callee.type_name()),
                location,
            });
        };
        match self.heap.get(id) {
            Object::Function(_) => self.call_function(id, args, location),
            Object::Class(_) => self.instantiate(id, args, location),
            other => Err(RuntimeError::TypeError {
                message: format!("'{}' object is not callable", other.type_name()),
                location,
            }),
        }
    }

    /// Call a subject function: fresh scope chained to the closure scope
    pub(crate) fn call_function(
        &mut self,
        func_id: ObjId,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let func = match self.heap.get(func_id) {
            Object::Function(f) => f.clone(),
            other => {
                return Err(RuntimeError::TypeError {
                    message: format!("'{}' object is not callable", other.type_name()),
                    location,
                });
            }
        };

        if args.len() != func.params.len() {
            return Err(RuntimeError::ArgumentCountMismatch {
                name: func.name,
                expected: func.params.len(),
                got: args.len(),
                location,
            });
        }
        if self.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::RecursionLimit {
                limit: MAX_CALL_DEPTH,
                location,
            });
        }

        let scope = self.scopes.push(func.closure);
        for (param, arg) in func.params.iter().zip(args) {
            self.scopes.bind(scope, param, arg);
        }

        let saved_scope = self.current_scope;
        self.current_scope = scope;
        self.call_depth += 1;
        let flow = self.exec_block(&func.body);
        self.call_depth -= 1;
        self.current_scope = saved_scope;

        match flow? {
            Flow::Return(value, _) => Ok(value),
            Flow::Normal => Ok(Value::None),
            Flow::Break(location) => Err(RuntimeError::BreakOutsideLoop { location }),
            Flow::Continue(location) => Err(RuntimeError::ContinueOutsideLoop { location }),
        }
    }

    /// Instantiate a class: allocate the instance, run `__init__` if present
    fn instantiate(
        &mut self,
        class_id: ObjId,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let instance = self.heap.alloc(Object::Instance(InstanceObj {
            class: class_id,
            fields: FxHashMap::default(),
        }));

        let init = match self.heap.get(class_id) {
            Object::Class(cls) => cls.methods.get("__init__").copied(),
            _ => None,
        };

        if let Some(init) = init {
            let mut init_args = Vec::with_capacity(args.len() + 1);
            init_args.push(Value::Ref(instance));
            init_args.extend(args);
            self.call_function(init, init_args, location)?;
        } else if !args.is_empty() {
            let name = match self.heap.get(class_id) {
                Object::Class(cls) => cls.name.clone(),
                _ => "?".to_string(),
            };
            return Err(RuntimeError::ArgumentCountMismatch {
                name,
                expected: 0,
                got: args.len(),
                location,
            });
        }

        Ok(Value::Ref(instance))
    }

    /// Dispatch `recv.attr(args)`
    fn call_method(
        &mut self,
        recv: Value,
        attr: &str,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let Some(id) = recv.as_ref_id() else {
            return Err(RuntimeError::AttributeError {
                type_name: recv.type_name(),
                attr: attr.to_string(),
                location,
            });
        };

        match self.heap.get(id) {
            Object::List(_) => self.call_list_method(id, attr, args, location),
            Object::Dict(_) => self.call_dict_method(id, attr, args, location),
            Object::Instance(inst) => {
                let method = match self.heap.get(inst.class) {
                    Object::Class(cls) => cls.methods.get(attr).copied(),
                    _ => None,
                };
                let Some(method) = method else {
                    return Err(RuntimeError::AttributeError {
                        type_name: "instance",
                        attr: attr.to_string(),
                        location,
                    });
                };
                let mut method_args = Vec::with_capacity(args.len() + 1);
                method_args.push(Value::Ref(id));
                method_args.extend(args);
                self.call_function(method, method_args, location)
            }
            other => Err(RuntimeError::AttributeError {
                type_name: other.type_name(),
                attr: attr.to_string(),
                location,
            }),
        }
    }

    /// `instance.attr` reads a field
    fn get_attribute(
        &mut self,
        obj: &Value,
        attr: &str,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let Some(id) = obj.as_ref_id() else {
            return Err(RuntimeError::AttributeError {
                type_name: obj.type_name(),
                attr: attr.to_string(),
                location,
            });
        };
        match self.heap.get(id) {
            Object::Instance(inst) => {
                inst.fields
                    .get(attr)
                    .cloned()
                    .ok_or_else(|| RuntimeError::AttributeError {
                        type_name: "instance",
                        attr: attr.to_string(),
                        location,
                    })
            }
            other => Err(RuntimeError::AttributeError {
                type_name: other.type_name(),
                attr: attr.to_string(),
                location,
            }),
        }
    }

    // ===== Subscripting =====

    /// `obj[index]`
    fn get_item(
        &mut self,
        obj: &Value,
        index: &Value,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match obj {
            Value::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                let i = self.normalize_index(index, chars.len(), location)?;
                Ok(Value::Str(chars[i].to_string()))
            }
            Value::Ref(id) => match self.heap.get(*id) {
                Object::List(items) | Object::Tuple(items) => {
                    let i = self.normalize_index(index, items.len(), location)?;
                    Ok(items[i].clone())
                }
                Object::Dict(entries) => {
                    for (key, value) in entries {
                        if self.values_equal(key, index) {
                            return Ok(value.clone());
                        }
                    }
                    Err(RuntimeError::KeyError {
                        key: crate::interpreter::builtins::format_value(self, index, true),
                        location,
                    })
                }
                other => Err(RuntimeError::TypeError {
                    message: format!("'{}' object is not subscriptable", other.type_name()),
                    location,
                }),
            },
            other => Err(RuntimeError::TypeError {
                message: format!("'{}' object is not subscriptable", other.type_name()),
                location,
            }),
        }
    }

    /// Resolve an index value against a length, with negative wrapping
    fn normalize_index(
        &self,
        index: &Value,
        len: usize,
        location: SourceLocation,
    ) -> Result<usize, RuntimeError> {
        let Some(raw) = index.as_integral() else {
            return Err(RuntimeError::TypeError {
                message: format!("indices must be integers, got '{}'", index.type_name()),
                location,
            });
        };
        let adjusted = if raw < 0 { raw + len as i64 } else { raw };
        if adjusted < 0 || adjusted as usize >= len {
            return Err(RuntimeError::IndexError {
                index: raw,
                len,
                location,
            });
        }
        Ok(adjusted as usize)
    }

    /// `obj[lower:upper:step]`
    fn get_slice(
        &mut self,
        obj: &Value,
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match obj {
            Value::Str(s) => {
                let chars: Vec<Value> = s.chars().map(|c| Value::Str(c.to_string())).collect();
                let picked = self.slice_values(&chars, lower, upper, step, location)?;
                let mut out = String::new();
                for v in picked {
                    if let Value::Str(part) = v {
                        out.push_str(&part);
                    }
                }
                Ok(Value::Str(out))
            }
            Value::Ref(id) => match self.heap.get(*id) {
                Object::List(items) => {
                    let items = items.clone();
                    let picked = self.slice_values(&items, lower, upper, step, location)?;
                    Ok(Value::Ref(self.heap.alloc(Object::List(picked))))
                }
                Object::Tuple(items) => {
                    let items = items.clone();
                    let picked = self.slice_values(&items, lower, upper, step, location)?;
                    Ok(Value::Ref(self.heap.alloc(Object::Tuple(picked))))
                }
                other => Err(RuntimeError::TypeError {
                    message: format!("'{}' object cannot be sliced", other.type_name()),
                    location,
                }),
            },
            other => Err(RuntimeError::TypeError {
                message: format!("'{}' object cannot be sliced", other.type_name()),
                location,
            }),
        }
    }

    /// Slice semantics of the subject language: out-of-range bounds clamp,
    /// negative indices wrap, negative steps walk backwards
    fn slice_values(
        &self,
        items: &[Value],
        lower: Option<i64>,
        upper: Option<i64>,
        step: Option<i64>,
        location: SourceLocation,
    ) -> Result<Vec<Value>, RuntimeError> {
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err(RuntimeError::ValueError {
                message: "slice step cannot be zero".to_string(),
                location,
            });
        }

        let len = items.len() as i64;
        let wrap = |i: i64| if i < 0 { i + len } else { i };

        let mut out = Vec::new();
        if step > 0 {
            let start = lower.map(wrap).unwrap_or(0).clamp(0, len);
            let stop = upper.map(wrap).unwrap_or(len).clamp(0, len);
            let mut i = start;
            while i < stop {
                out.push(items[i as usize].clone());
                i += step;
            }
        } else {
            let start = lower.map(wrap).unwrap_or(len - 1).clamp(-1, len - 1);
            let stop = upper.map(wrap).unwrap_or(-1).clamp(-1, len - 1);
            let mut i = start;
            while i > stop {
                out.push(items[i as usize].clone());
                i += step;
            }
        }
        Ok(out)
    }

    // ===== Operators =====

    /// Apply a binary operator
    pub(crate) fn binary_op(
        &mut self,
        op: BinOp,
        left: Value,
        right: Value,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        // String and sequence forms first
        match (&op, &left, &right) {
            (BinOp::Add, Value::Str(a), Value::Str(b)) => {
                return Ok(Value::Str(format!("{}{}", a, b)));
            }
            (BinOp::Mul, Value::Str(s), other) | (BinOp::Mul, other, Value::Str(s)) => {
                if let Some(n) = other.as_integral() {
                    return Ok(Value::Str(s.repeat(n.max(0) as usize)));
                }
            }
            (BinOp::Add, Value::Ref(a), Value::Ref(b)) => {
                if let (Object::List(x), Object::List(y)) = (self.heap.get(*a), self.heap.get(*b)) {
                    let mut items = x.clone();
                    items.extend(y.iter().cloned());
                    return Ok(Value::Ref(self.heap.alloc(Object::List(items))));
                }
                if let (Object::Tuple(x), Object::Tuple(y)) = (self.heap.get(*a), self.heap.get(*b))
                {
                    let mut items = x.clone();
                    items.extend(y.iter().cloned());
                    return Ok(Value::Ref(self.heap.alloc(Object::Tuple(items))));
                }
            }
            (BinOp::Mul, Value::Ref(a), other) | (BinOp::Mul, other, Value::Ref(a)) => {
                if let (Object::List(items), Some(n)) = (self.heap.get(*a), other.as_integral()) {
                    let mut out = Vec::new();
                    for _ in 0..n.max(0) {
                        out.extend(items.iter().cloned());
                    }
                    return Ok(Value::Ref(self.heap.alloc(Object::List(out))));
                }
            }
            _ => {}
        }

        // Integer arithmetic stays integral
        if let (Some(a), Some(b)) = (left.as_integral(), right.as_integral()) {
            if !matches!(left, Value::Float(_)) && !matches!(right, Value::Float(_)) {
                return self.int_op(op, a, b, location);
            }
        }

        // Mixed / float arithmetic
        let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
            return Err(RuntimeError::TypeError {
                message: format!(
                    "unsupported operand types for {}: '{}' and '{}'",
                    op,
                    left.type_name(),
                    right.type_name()
                ),
                location,
            });
        };
        self.float_op(op, a, b, location)
    }

    fn int_op(
        &self,
        op: BinOp,
        a: i64,
        b: i64,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        let overflow = |op_name: &str| RuntimeError::ValueError {
            message: format!("integer overflow in {}", op_name),
            location,
        };
        match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(|| overflow("+")),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(|| overflow("-")),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(|| overflow("*")),
            BinOp::Div => {
                if b == 0 {
                    Err(RuntimeError::ZeroDivision { location })
                } else {
                    Ok(Value::Float(a as f64 / b as f64))
                }
            }
            BinOp::FloorDiv => {
                if b == 0 {
                    Err(RuntimeError::ZeroDivision { location })
                } else {
                    Ok(Value::Int(floor_div(a, b)))
                }
            }
            BinOp::Mod => {
                if b == 0 {
                    Err(RuntimeError::ZeroDivision { location })
                } else {
                    Ok(Value::Int(a - floor_div(a, b) * b))
                }
            }
            BinOp::Pow => {
                if b >= 0 {
                    let exp = u32::try_from(b).map_err(|_| overflow("**"))?;
                    a.checked_pow(exp).map(Value::Int).ok_or_else(|| overflow("**"))
                } else {
                    Ok(Value::Float((a as f64).powi(b as i32)))
                }
            }
        }
    }

    fn float_op(
        &self,
        op: BinOp,
        a: f64,
        b: f64,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match op {
            BinOp::Add => Ok(Value::Float(a + b)),
            BinOp::Sub => Ok(Value::Float(a - b)),
            BinOp::Mul => Ok(Value::Float(a * b)),
            BinOp::Div => {
                if b == 0.0 {
                    Err(RuntimeError::ZeroDivision { location })
                } else {
                    Ok(Value::Float(a / b))
                }
            }
            BinOp::FloorDiv => {
                if b == 0.0 {
                    Err(RuntimeError::ZeroDivision { location })
                } else {
                    Ok(Value::Float((a / b).floor()))
                }
            }
            BinOp::Mod => {
                if b == 0.0 {
                    Err(RuntimeError::ZeroDivision { location })
                } else {
                    Ok(Value::Float(a - (a / b).floor() * b))
                }
            }
            BinOp::Pow => Ok(Value::Float(a.powf(b))),
        }
    }

    /// Ordering comparisons over numbers and strings
    fn compare_order(
        &self,
        op: CmpOp,
        left: &Value,
        right: &Value,
        location: SourceLocation,
    ) -> Result<bool, RuntimeError> {
        if let (Value::Str(a), Value::Str(b)) = (left, right) {
            return Ok(match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                _ => unreachable!(),
            });
        }
        let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
            return Err(RuntimeError::TypeError {
                message: format!(
                    "'{}' not supported between '{}' and '{}'",
                    op,
                    left.type_name(),
                    right.type_name()
                ),
                location,
            });
        };
        Ok(match op {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            _ => unreachable!(),
        })
    }

    /// Membership test: `needle in haystack`
    fn contains(
        &mut self,
        haystack: &Value,
        needle: &Value,
        location: SourceLocation,
    ) -> Result<bool, RuntimeError> {
        match haystack {
            Value::Str(s) => match needle {
                Value::Str(sub) => Ok(s.contains(sub.as_str())),
                other => Err(RuntimeError::TypeError {
                    message: format!("'in <str>' requires a string, got '{}'", other.type_name()),
                    location,
                }),
            },
            Value::Ref(id) => match self.heap.get(*id) {
                Object::List(items) | Object::Tuple(items) => {
                    let items = items.clone();
                    Ok(items.iter().any(|item| self.values_equal(item, needle)))
                }
                Object::Dict(entries) => {
                    let keys: Vec<Value> = entries.iter().map(|(k, _)| k.clone()).collect();
                    Ok(keys.iter().any(|key| self.values_equal(key, needle)))
                }
                Object::Range { start, stop, step } => {
                    let (start, stop, step) = (*start, *stop, *step);
                    match needle.as_integral() {
                        Some(n) => Ok(range_contains(start, stop, step, n)),
                        None => Ok(false),
                    }
                }
                other => Err(RuntimeError::TypeError {
                    message: format!("'{}' object is not iterable", other.type_name()),
                    location,
                }),
            },
            other => Err(RuntimeError::TypeError {
                message: format!("'{}' object is not iterable", other.type_name()),
                location,
            }),
        }
    }

    // ===== Shared helpers =====

    /// Truthiness of a value
    pub(crate) fn truthy(&self, value: &Value) -> bool {
        match value {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Ref(id) => match self.heap.get(*id) {
                Object::List(items) | Object::Tuple(items) => !items.is_empty(),
                Object::Dict(entries) => !entries.is_empty(),
                Object::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
                _ => true,
            },
        }
    }

    /// Structural equality; instances compare by identity
    pub(crate) fn values_equal(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::None, Value::None) => true,
            (Value::Str(x), Value::Str(y)) => x == y,
            (Value::Ref(x), Value::Ref(y)) => {
                if x == y {
                    return true;
                }
                match (self.heap.get(*x), self.heap.get(*y)) {
                    (Object::List(p), Object::List(q)) | (Object::Tuple(p), Object::Tuple(q)) => {
                        p.len() == q.len()
                            && p.iter().zip(q).all(|(u, v)| self.values_equal(u, v))
                    }
                    (Object::Dict(p), Object::Dict(q)) => {
                        p.len() == q.len()
                            && p.iter().all(|(key, value)| {
                                q.iter().any(|(k, v)| {
                                    self.values_equal(k, key) && self.values_equal(v, value)
                                })
                            })
                    }
                    _ => false,
                }
            }
            _ => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            },
        }
    }

    /// Materialize an iterable into a vector of values
    pub(crate) fn iter_values(
        &mut self,
        value: &Value,
        location: SourceLocation,
    ) -> Result<Vec<Value>, RuntimeError> {
        match value {
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string())).collect()),
            Value::Ref(id) => match self.heap.get(*id) {
                Object::List(items) | Object::Tuple(items) => Ok(items.clone()),
                Object::Dict(entries) => Ok(entries.iter().map(|(k, _)| k.clone()).collect()),
                Object::Range { start, stop, step } => {
                    let (start, stop, step) = (*start, *stop, *step);
                    let len = range_len(start, stop, step);
                    if len > MAX_ITERABLE_LEN {
                        return Err(RuntimeError::ValueError {
                            message: format!("range of {} elements is too large", len),
                            location,
                        });
                    }
                    let mut out = Vec::with_capacity(len);
                    let mut i = start;
                    while (step > 0 && i < stop) || (step < 0 && i > stop) {
                        out.push(Value::Int(i));
                        i += step;
                    }
                    Ok(out)
                }
                other => Err(RuntimeError::TypeError {
                    message: format!("'{}' object is not iterable", other.type_name()),
                    location,
                }),
            },
            other => Err(RuntimeError::TypeError {
                message: format!("'{}' object is not iterable", other.type_name()),
                location,
            }),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Floor division rounding toward negative infinity
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

/// Number of elements a range produces
fn range_len(start: i64, stop: i64, step: i64) -> usize {
    if step > 0 && stop > start {
        ((stop - start + step - 1) / step) as usize
    } else if step < 0 && stop < start {
        ((start - stop - step - 1) / -step) as usize
    } else {
        0
    }
}

fn range_contains(start: i64, stop: i64, step: i64, n: i64) -> bool {
    if step > 0 {
        n >= start && n < stop && (n - start) % step == 0
    } else if step < 0 {
        n <= start && n > stop && (start - n) % (-step) == 0
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_div_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_div(7, -2), -4);
        assert_eq!(floor_div(-7, -2), 3);
    }

    #[test]
    fn range_len_matches_iteration() {
        assert_eq!(range_len(0, 5, 1), 5);
        assert_eq!(range_len(1, 5, 2), 2);
        assert_eq!(range_len(5, 0, -1), 5);
        assert_eq!(range_len(0, 5, -1), 0);
        assert_eq!(range_len(5, 5, 1), 0);
    }

    #[test]
    fn range_contains_respects_step() {
        assert!(range_contains(0, 10, 2, 4));
        assert!(!range_contains(0, 10, 2, 5));
        assert!(range_contains(10, 0, -2, 4));
        assert!(!range_contains(0, 10, 2, 10));
    }
}
