//! Built-in functions and methods
//!
//! The names here resolve only after scope lookup fails, so subject programs
//! can shadow any builtin. `print` output is captured into the recorder and
//! never written to the host's stdout.

use crate::interpreter::engine::Interpreter;
use crate::interpreter::errors::RuntimeError;
use crate::memory::heap::{ObjId, Object};
use crate::memory::value::Value;
use crate::parser::ast::SourceLocation;

impl Interpreter {
    /// Dispatch a call to a builtin by name. Unknown names are a
    /// [`RuntimeError::NameError`], matching an unbound variable.
    pub(crate) fn call_builtin(
        &mut self,
        name: &str,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match name {
            "print" => {
                let parts: Vec<String> = args
                    .iter()
                    .map(|value| format_value(self, value, false))
                    .collect();
                self.recorder.print_line(parts.join(" "));
                Ok(Value::None)
            }

            "len" => {
                let [value] = self.expect_args::<1>(name, args, location)?;
                let len = match &value {
                    Value::Str(s) => s.chars().count(),
                    Value::Ref(id) => match self.heap.get(*id) {
                        Object::List(items) | Object::Tuple(items) => items.len(),
                        Object::Dict(entries) => entries.len(),
                        Object::Range { start, stop, step } => {
                            range_len_for(*start, *stop, *step)
                        }
                        other => {
                            return Err(RuntimeError::TypeError {
                                message: format!("'{}' has no length", other.type_name()),
                                location,
                            });
                        }
                    },
                    other => {
                        return Err(RuntimeError::TypeError {
                            message: format!("'{}' has no length", other.type_name()),
                            location,
                        });
                    }
                };
                Ok(Value::Int(len as i64))
            }

            "range" => {
                if args.is_empty() || args.len() > 3 {
                    return Err(RuntimeError::TypeError {
                        message: format!("range expects 1 to 3 arguments, got {}", args.len()),
                        location,
                    });
                }
                let mut ints = Vec::with_capacity(args.len());
                for arg in &args {
                    match arg.as_integral() {
                        Some(n) => ints.push(n),
                        None => {
                            return Err(RuntimeError::TypeError {
                                message: format!(
                                    "range arguments must be integers, got '{}'",
                                    arg.type_name()
                                ),
                                location,
                            });
                        }
                    }
                }
                let (start, stop, step) = match ints.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => unreachable!(),
                };
                if step == 0 {
                    return Err(RuntimeError::ValueError {
                        message: "range step cannot be zero".to_string(),
                        location,
                    });
                }
                Ok(Value::Ref(self.heap.alloc(Object::Range {
                    start,
                    stop,
                    step,
                })))
            }

            "abs" => {
                let [value] = self.expect_args::<1>(name, args, location)?;
                match value {
                    Value::Int(n) => Ok(Value::Int(n.abs())),
                    Value::Float(x) => Ok(Value::Float(x.abs())),
                    Value::Bool(b) => Ok(Value::Int(if b { 1 } else { 0 })),
                    other => Err(RuntimeError::TypeError {
                        message: format!("bad operand type for abs(): '{}'", other.type_name()),
                        location,
                    }),
                }
            }

            "min" => self.min_max(args, location, true),
            "max" => self.min_max(args, location, false),

            "sum" => {
                let [value] = self.expect_args::<1>(name, args, location)?;
                let items = self.iter_values(&value, location)?;
                let mut acc = Value::Int(0);
                for item in items {
                    acc = self.binary_op(crate::parser::ast::BinOp::Add, acc, item, location)?;
                }
                Ok(acc)
            }

            "int" => {
                let [value] = self.expect_args::<1>(name, args, location)?;
                match &value {
                    Value::Int(n) => Ok(Value::Int(*n)),
                    Value::Float(x) => Ok(Value::Int(x.trunc() as i64)),
                    Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
                    Value::Str(s) => {
                        s.trim()
                            .parse::<i64>()
                            .map(Value::Int)
                            .map_err(|_| RuntimeError::ValueError {
                                message: format!("invalid literal for int(): '{}'", s),
                                location,
                            })
                    }
                    other => Err(RuntimeError::TypeError {
                        message: format!("int() argument must be a number, got '{}'", other.type_name()),
                        location,
                    }),
                }
            }

            "float" => {
                let [value] = self.expect_args::<1>(name, args, location)?;
                match &value {
                    Value::Float(x) => Ok(Value::Float(*x)),
                    Value::Int(n) => Ok(Value::Float(*n as f64)),
                    Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
                    Value::Str(s) => parse_float(s).map(Value::Float).ok_or_else(|| {
                        RuntimeError::ValueError {
                            message: format!("could not convert string to float: '{}'", s),
                            location,
                        }
                    }),
                    other => Err(RuntimeError::TypeError {
                        message: format!(
                            "float() argument must be a number, got '{}'",
                            other.type_name()
                        ),
                        location,
                    }),
                }
            }

            "str" => {
                let [value] = self.expect_args::<1>(name, args, location)?;
                Ok(Value::Str(format_value(self, &value, false)))
            }

            "bool" => {
                let [value] = self.expect_args::<1>(name, args, location)?;
                Ok(Value::Bool(self.truthy(&value)))
            }

            "list" => {
                if args.is_empty() {
                    return Ok(Value::Ref(self.heap.alloc(Object::List(Vec::new()))));
                }
                let [value] = self.expect_args::<1>(name, args, location)?;
                let items = self.iter_values(&value, location)?;
                Ok(Value::Ref(self.heap.alloc(Object::List(items))))
            }

            _ => Err(RuntimeError::NameError {
                name: name.to_string(),
                location,
            }),
        }
    }

    /// min()/max() over a single iterable or over the arguments themselves
    fn min_max(
        &mut self,
        args: Vec<Value>,
        location: SourceLocation,
        take_min: bool,
    ) -> Result<Value, RuntimeError> {
        let candidates = if args.len() == 1 {
            self.iter_values(&args[0], location)?
        } else {
            args
        };
        if candidates.is_empty() {
            return Err(RuntimeError::ValueError {
                message: format!("{}() of an empty sequence", if take_min { "min" } else { "max" }),
                location,
            });
        }

        let mut best = candidates[0].clone();
        for candidate in &candidates[1..] {
            let replace = self.value_lt(candidate, &best, location)? == take_min;
            if replace {
                best = candidate.clone();
            }
        }
        Ok(best)
    }

    /// Strict less-than over numbers or strings, for min/max
    fn value_lt(
        &self,
        a: &Value,
        b: &Value,
        location: SourceLocation,
    ) -> Result<bool, RuntimeError> {
        if let (Value::Str(x), Value::Str(y)) = (a, b) {
            return Ok(x < y);
        }
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => Ok(x < y),
            _ => Err(RuntimeError::TypeError {
                message: format!(
                    "cannot compare '{}' and '{}'",
                    a.type_name(),
                    b.type_name()
                ),
                location,
            }),
        }
    }

    /// Pull exactly N arguments or fail with an argument-count error
    fn expect_args<const N: usize>(
        &self,
        name: &str,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<[Value; N], RuntimeError> {
        let got = args.len();
        args.try_into().map_err(|_| RuntimeError::ArgumentCountMismatch {
            name: name.to_string(),
            expected: N,
            got,
            location,
        })
    }

    /// List methods: append, extend, insert, pop
    pub(crate) fn call_list_method(
        &mut self,
        id: ObjId,
        attr: &str,
        mut args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match attr {
            "append" => {
                let [value] = self.expect_args::<1>("append", args, location)?;
                let Object::List(items) = self.heap.get_mut(id) else {
                    unreachable!();
                };
                items.push(value);
                Ok(Value::None)
            }
            "extend" => {
                let [value] = self.expect_args::<1>("extend", args, location)?;
                let new_items = self.iter_values(&value, location)?;
                let Object::List(items) = self.heap.get_mut(id) else {
                    unreachable!();
                };
                items.extend(new_items);
                Ok(Value::None)
            }
            "insert" => {
                let [index, value] = self.expect_args::<2>("insert", args, location)?;
                let Some(raw) = index.as_integral() else {
                    return Err(RuntimeError::TypeError {
                        message: "insert index must be an integer".to_string(),
                        location,
                    });
                };
                let Object::List(items) = self.heap.get_mut(id) else {
                    unreachable!();
                };
                let len = items.len() as i64;
                // Out-of-range insert positions clamp rather than fail
                let at = if raw < 0 { raw + len } else { raw }.clamp(0, len) as usize;
                items.insert(at, value);
                Ok(Value::None)
            }
            "pop" => {
                let index = match args.len() {
                    0 => None,
                    1 => Some(args.remove(0)),
                    n => {
                        return Err(RuntimeError::ArgumentCountMismatch {
                            name: "pop".to_string(),
                            expected: 1,
                            got: n,
                            location,
                        });
                    }
                };
                let Object::List(items) = self.heap.get(id) else {
                    unreachable!();
                };
                let len = items.len();
                if len == 0 {
                    return Err(RuntimeError::IndexError {
                        index: 0,
                        len: 0,
                        location,
                    });
                }
                let at = match index {
                    None => len - 1,
                    Some(value) => {
                        let Some(raw) = value.as_integral() else {
                            return Err(RuntimeError::TypeError {
                                message: "pop index must be an integer".to_string(),
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
                        adjusted as usize
                    }
                };
                let Object::List(items) = self.heap.get_mut(id) else {
                    unreachable!();
                };
                Ok(items.remove(at))
            }
            other => Err(RuntimeError::AttributeError {
                type_name: "list",
                attr: other.to_string(),
                location,
            }),
        }
    }

    /// Dict methods: get, keys, values
    pub(crate) fn call_dict_method(
        &mut self,
        id: ObjId,
        attr: &str,
        args: Vec<Value>,
        location: SourceLocation,
    ) -> Result<Value, RuntimeError> {
        match attr {
            "get" => {
                let (key, default) = match args.len() {
                    1 => (args.into_iter().next().unwrap(), Value::None),
                    2 => {
                        let mut it = args.into_iter();
                        (it.next().unwrap(), it.next().unwrap())
                    }
                    n => {
                        return Err(RuntimeError::ArgumentCountMismatch {
                            name: "get".to_string(),
                            expected: 2,
                            got: n,
                            location,
                        });
                    }
                };
                let Object::Dict(entries) = self.heap.get(id) else {
                    unreachable!();
                };
                let entries = entries.clone();
                for (k, v) in &entries {
                    if self.values_equal(k, &key) {
                        return Ok(v.clone());
                    }
                }
                Ok(default)
            }
            "keys" => {
                let Object::Dict(entries) = self.heap.get(id) else {
                    unreachable!();
                };
                let keys: Vec<Value> = entries.iter().map(|(k, _)| k.clone()).collect();
                Ok(Value::Ref(self.heap.alloc(Object::List(keys))))
            }
            "values" => {
                let Object::Dict(entries) = self.heap.get(id) else {
                    unreachable!();
                };
                let values: Vec<Value> = entries.iter().map(|(_, v)| v.clone()).collect();
                Ok(Value::Ref(self.heap.alloc(Object::List(values))))
            }
            other => Err(RuntimeError::AttributeError {
                type_name: "dict",
                attr: other.to_string(),
                location,
            }),
        }
    }
}

/// Render a value the way the subject language prints it. `quote` selects
/// the container-element form (strings quoted) over the `print` form.
pub(crate) fn format_value(interp: &Interpreter, value: &Value, quote: bool) -> String {
    format_value_depth(interp, value, quote, 0)
}

fn format_value_depth(interp: &Interpreter, value: &Value, quote: bool, depth: usize) -> String {
    if depth > 8 {
        return "...".to_string();
    }
    match value {
        Value::None => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(x) => format_float(*x),
        Value::Str(s) => {
            if quote {
                format!("'{}'", s)
            } else {
                s.clone()
            }
        }
        Value::Ref(id) => match interp.heap.get(*id) {
            Object::List(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| format_value_depth(interp, item, true, depth + 1))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Object::Tuple(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| format_value_depth(interp, item, true, depth + 1))
                    .collect();
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            Object::Dict(entries) => {
                let parts: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{}: {}",
                            format_value_depth(interp, k, true, depth + 1),
                            format_value_depth(interp, v, true, depth + 1)
                        )
                    })
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Object::Range { start, stop, step } => {
                if *step == 1 {
                    format!("range({}, {})", start, stop)
                } else {
                    format!("range({}, {}, {})", start, stop, step)
                }
            }
            Object::Function(f) => format!("<function {}>", f.name),
            Object::Class(c) => format!("<class '{}'>", c.name),
            Object::Instance(inst) => {
                let class_name = match interp.heap.get(inst.class) {
                    Object::Class(c) => c.name.clone(),
                    _ => "?".to_string(),
                };
                format!("<{} object>", class_name)
            }
        },
    }
}

/// Floats print with a trailing `.0` when integral, like the subject language
fn format_float(x: f64) -> String {
    if x.is_nan() {
        "nan".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if x == x.trunc() && x.abs() < 1e16 {
        format!("{:.1}", x)
    } else {
        format!("{}", x)
    }
}

/// Accepted spellings for float('...') conversions
fn parse_float(s: &str) -> Option<f64> {
    let t = s.trim();
    match t.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Some(f64::INFINITY),
        "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
        "nan" | "+nan" | "-nan" => Some(f64::NAN),
        _ => t.parse::<f64>().ok(),
    }
}

fn range_len_for(start: i64, stop: i64, step: i64) -> usize {
    if step > 0 && stop > start {
        ((stop - start + step - 1) / step) as usize
    } else if step < 0 && stop < start {
        ((start - stop - step - 1) / -step) as usize
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::new(1, 1)
    }

    #[test]
    fn float_of_inf_string() {
        let mut interp = Interpreter::new();
        let result = interp
            .call_builtin("float", vec![Value::Str("inf".to_string())], loc())
            .unwrap();
        assert_eq!(result, Value::Float(f64::INFINITY));
    }

    #[test]
    fn len_of_list() {
        let mut interp = Interpreter::new();
        let list = interp
            .heap
            .alloc(Object::List(vec![Value::Int(1), Value::Int(2)]));
        let result = interp
            .call_builtin("len", vec![Value::Ref(list)], loc())
            .unwrap();
        assert_eq!(result, Value::Int(2));
    }

    #[test]
    fn min_over_arguments_and_iterable() {
        let mut interp = Interpreter::new();
        let result = interp
            .call_builtin(
                "min",
                vec![Value::Float(f64::INFINITY), Value::Int(3)],
                loc(),
            )
            .unwrap();
        assert_eq!(result, Value::Int(3));

        let list = interp.heap.alloc(Object::List(vec![
            Value::Int(4),
            Value::Int(1),
            Value::Int(9),
        ]));
        let result = interp
            .call_builtin("max", vec![Value::Ref(list)], loc())
            .unwrap();
        assert_eq!(result, Value::Int(9));
    }

    #[test]
    fn print_is_captured_not_written() {
        let mut interp = Interpreter::new();
        interp
            .call_builtin(
                "print",
                vec![Value::Str("x =".to_string()), Value::Int(3)],
                loc(),
            )
            .unwrap();
        assert_eq!(interp.output(), ["x = 3"]);
    }

    #[test]
    fn unknown_builtin_is_a_name_error() {
        let mut interp = Interpreter::new();
        let result = interp.call_builtin("sorted_backwards", vec![], loc());
        assert!(matches!(result, Err(RuntimeError::NameError { .. })));
    }

    #[test]
    fn format_float_matches_subject_repr() {
        assert_eq!(format_float(2.0), "2.0");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }
}
