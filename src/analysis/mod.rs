//! Heuristic complexity estimation
//!
//! A single static walk over the parsed tree collects a small profile —
//! maximum loop-nesting depth, per-function loop/comprehension/tree-attribute
//! flags, directly-recursive function names, and one "halving observed" bit —
//! and a fixed decision ladder turns the profile into a label. The estimate
//! is an approximation by design; it never executes anything and never fails
//! (a parse error yields `"unknown"`).

use crate::parser::ast::{BinOp, Constant, ExceptHandler, Expr, Program, Stmt, Subscript};
use crate::parser::parser::Parser;
use rustc_hash::{FxHashMap, FxHashSet};

/// Divisor constants treated as evidence of halving
const HALVING_DIVISORS: [i64; 4] = [2, 4, 8, 16];

/// Estimate the time complexity of the given subject source.
///
/// Pure and deterministic; identical source always yields the identical
/// label. Returns `"unknown"` when the source does not parse.
pub fn estimate_complexity(source: &str) -> String {
    let program = match Parser::new(source).and_then(|mut p| p.parse_program()) {
        Ok(program) => program,
        Err(_) => return "unknown".to_string(),
    };

    let mut visitor = ComplexityVisitor::default();
    visitor.visit_program(&program);
    visitor.label()
}

/// Walks the AST collecting the complexity profile
#[derive(Default)]
struct ComplexityVisitor {
    max_loop_depth: usize,
    loop_depth: usize,
    current_func: Option<String>,
    recursive_funcs: FxHashSet<String>,
    recursive_with_loops: FxHashSet<String>,
    func_loops: FxHashMap<String, bool>,
    func_has_comp: FxHashMap<String, bool>,
    func_tree_recursion: FxHashMap<String, bool>,
    halves: bool,
}

impl ComplexityVisitor {
    fn visit_program(&mut self, program: &Program) {
        for stmt in &program.body {
            self.visit_stmt(stmt);
        }
    }

    /// Enter a loop construct: bump the nesting depth and flag the enclosing
    /// function
    fn enter_loop(&mut self) {
        self.loop_depth += 1;
        self.max_loop_depth = self.max_loop_depth.max(self.loop_depth);
        if let Some(func) = &self.current_func {
            self.func_loops.insert(func.clone(), true);
        }
    }

    fn exit_loop(&mut self) {
        self.loop_depth -= 1;
    }

    fn mark_comp(&mut self) {
        if let Some(func) = &self.current_func {
            self.func_has_comp.insert(func.clone(), true);
        }
    }

    fn mark_tree_attr(&mut self, attr: &str) {
        if attr == "left" || attr == "right" {
            if let Some(func) = &self.current_func {
                self.func_tree_recursion.insert(func.clone(), true);
            }
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::FunctionDef { name, body, .. } => self.visit_function_def(name, body),
            Stmt::ClassDef { body, .. } => {
                // Methods participate as functions
                for stmt in body {
                    self.visit_stmt(stmt);
                }
            }
            Stmt::Assign { targets, value, .. } => {
                for target in targets {
                    self.visit_expr(target);
                }
                self.visit_expr(value);
            }
            Stmt::AugAssign {
                target, op, value, ..
            } => {
                // Augmented floor-division by a halving constant counts
                if *op == BinOp::FloorDiv && is_halving_constant(value) {
                    self.halves = true;
                }
                self.visit_expr(target);
                self.visit_expr(value);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.visit_expr(value);
                }
            }
            Stmt::If {
                condition,
                body,
                orelse,
                ..
            } => {
                self.visit_expr(condition);
                self.visit_block(body);
                self.visit_block(orelse);
            }
            Stmt::While {
                condition,
                body,
                orelse,
                ..
            } => {
                self.enter_loop();
                self.visit_expr(condition);
                self.visit_block(body);
                self.visit_block(orelse);
                self.exit_loop();
            }
            Stmt::For {
                target,
                iter,
                body,
                orelse,
                ..
            } => {
                self.enter_loop();
                self.visit_expr(target);
                self.visit_expr(iter);
                self.visit_block(body);
                self.visit_block(orelse);
                self.exit_loop();
            }
            Stmt::With { context, body, .. } => {
                self.visit_expr(context);
                self.visit_block(body);
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finalbody,
                ..
            } => {
                self.visit_block(body);
                for ExceptHandler { body, .. } in handlers {
                    self.visit_block(body);
                }
                self.visit_block(orelse);
                self.visit_block(finalbody);
            }
            Stmt::Expr { value, .. } => self.visit_expr(value),
            Stmt::Break { .. }
            | Stmt::Continue { .. }
            | Stmt::Pass { .. }
            | Stmt::SetLine { .. }
            | Stmt::Snapshot { .. } => {}
        }
    }

    fn visit_block(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Constant { .. } | Expr::Name { .. } => {}
            Expr::List { elts, .. } | Expr::Tuple { elts, .. } => {
                for elt in elts {
                    self.visit_expr(elt);
                }
            }
            Expr::Dict { entries, .. } => {
                for (key, value) in entries {
                    self.visit_expr(key);
                    self.visit_expr(value);
                }
            }
            Expr::ListComp {
                elt,
                target,
                iter,
                condition,
                ..
            } => {
                // A comprehension is both a loop (for nesting depth) and the
                // per-function comprehension flag
                self.enter_loop();
                self.mark_comp();
                self.visit_expr(target);
                self.visit_expr(iter);
                if let Some(condition) = condition {
                    self.visit_expr(condition);
                }
                self.visit_expr(elt);
                self.exit_loop();
            }
            Expr::BoolOp { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::BinaryOp {
                op, left, right, ..
            } => {
                if *op == BinOp::FloorDiv && is_halving_constant(right) {
                    self.halves = true;
                }
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::UnaryOp { operand, .. } => self.visit_expr(operand),
            Expr::Compare { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            Expr::Call { func, args, .. } => {
                self.visit_expr(func);
                for arg in args {
                    self.visit_expr(arg);
                }
            }
            Expr::Attribute { object, attr, .. } => {
                self.mark_tree_attr(attr);
                self.visit_expr(object);
            }
            Expr::Subscript { object, index, .. } => {
                self.visit_expr(object);
                match index.as_ref() {
                    Subscript::Index(expr) => self.visit_expr(expr),
                    Subscript::Slice { lower, upper, step } => {
                        // Any slice counts as halving evidence
                        self.halves = true;
                        for part in [lower, upper, step].into_iter().flatten() {
                            self.visit_expr(part);
                        }
                    }
                }
            }
        }
    }

    fn visit_function_def(&mut self, name: &str, body: &[Stmt]) {
        let prev = self.current_func.take();
        self.current_func = Some(name.to_string());
        self.func_loops.entry(name.to_string()).or_insert(false);
        self.func_has_comp.entry(name.to_string()).or_insert(false);
        self.func_tree_recursion
            .entry(name.to_string())
            .or_insert(false);

        self.visit_block(body);

        // Direct recursion: any call to the function's own bare name anywhere
        // in its subtree (nested definitions included)
        if block_calls_name(body, name) {
            self.recursive_funcs.insert(name.to_string());
            if self.func_loops.get(name).copied().unwrap_or(false) {
                self.recursive_with_loops.insert(name.to_string());
            }
        }

        self.current_func = prev;
    }

    /// Apply the decision ladder to the collected profile
    fn label(&self) -> String {
        if !self.recursive_funcs.is_empty() {
            let any_comp = self
                .recursive_funcs
                .iter()
                .any(|f| self.func_has_comp.get(f).copied().unwrap_or(false));
            if !self.recursive_with_loops.is_empty() || any_comp || self.halves {
                return "O(n log n)".to_string();
            }
            let any_tree = self
                .recursive_funcs
                .iter()
                .any(|f| self.func_tree_recursion.get(f).copied().unwrap_or(false));
            if any_tree {
                return "O(log n)".to_string();
            }
            return "O(n)".to_string();
        }

        if self.max_loop_depth > 1 {
            return format!("O(n^{})", self.max_loop_depth);
        }
        if self.max_loop_depth == 1 && self.halves {
            return "O(n log n)".to_string();
        }
        if self.max_loop_depth == 1 {
            return "O(n)".to_string();
        }
        if self.halves {
            return "O(log n)".to_string();
        }
        "O(1)".to_string()
    }
}

/// Whether `expr` is a constant 2, 4, 8, or 16
fn is_halving_constant(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Constant {
            value: Constant::Int(n),
            ..
        } if HALVING_DIVISORS.contains(n)
    )
}

/// Whether any statement in the block contains a call to the bare name
fn block_calls_name(stmts: &[Stmt], name: &str) -> bool {
    stmts.iter().any(|stmt| stmt_calls_name(stmt, name))
}

fn stmt_calls_name(stmt: &Stmt, name: &str) -> bool {
    match stmt {
        Stmt::FunctionDef { body, .. } | Stmt::ClassDef { body, .. } => {
            block_calls_name(body, name)
        }
        Stmt::Assign { targets, value, .. } => {
            targets.iter().any(|t| expr_calls_name(t, name)) || expr_calls_name(value, name)
        }
        Stmt::AugAssign { target, value, .. } => {
            expr_calls_name(target, name) || expr_calls_name(value, name)
        }
        Stmt::Return { value, .. } => value
            .as_ref()
            .is_some_and(|value| expr_calls_name(value, name)),
        Stmt::If {
            condition,
            body,
            orelse,
            ..
        }
        | Stmt::While {
            condition,
            body,
            orelse,
            ..
        } => {
            expr_calls_name(condition, name)
                || block_calls_name(body, name)
                || block_calls_name(orelse, name)
        }
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            ..
        } => {
            expr_calls_name(target, name)
                || expr_calls_name(iter, name)
                || block_calls_name(body, name)
                || block_calls_name(orelse, name)
        }
        Stmt::With { context, body, .. } => {
            expr_calls_name(context, name) || block_calls_name(body, name)
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            ..
        } => {
            block_calls_name(body, name)
                || handlers.iter().any(|h| block_calls_name(&h.body, name))
                || block_calls_name(orelse, name)
                || block_calls_name(finalbody, name)
        }
        Stmt::Expr { value, .. } => expr_calls_name(value, name),
        Stmt::Break { .. }
        | Stmt::Continue { .. }
        | Stmt::Pass { .. }
        | Stmt::SetLine { .. }
        | Stmt::Snapshot { .. } => false,
    }
}

fn expr_calls_name(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Call { func, args, .. } => {
            if matches!(func.as_ref(), Expr::Name { id, .. } if id == name) {
                return true;
            }
            expr_calls_name(func, name) || args.iter().any(|a| expr_calls_name(a, name))
        }
        Expr::Constant { .. } | Expr::Name { .. } => false,
        Expr::List { elts, .. } | Expr::Tuple { elts, .. } => {
            elts.iter().any(|e| expr_calls_name(e, name))
        }
        Expr::Dict { entries, .. } => entries
            .iter()
            .any(|(k, v)| expr_calls_name(k, name) || expr_calls_name(v, name)),
        Expr::ListComp {
            elt,
            target,
            iter,
            condition,
            ..
        } => {
            expr_calls_name(elt, name)
                || expr_calls_name(target, name)
                || expr_calls_name(iter, name)
                || condition.as_ref().is_some_and(|c| expr_calls_name(c, name))
        }
        Expr::BoolOp { left, right, .. }
        | Expr::BinaryOp { left, right, .. }
        | Expr::Compare { left, right, .. } => {
            expr_calls_name(left, name) || expr_calls_name(right, name)
        }
        Expr::UnaryOp { operand, .. } => expr_calls_name(operand, name),
        Expr::Attribute { object, .. } => expr_calls_name(object, name),
        Expr::Subscript { object, index, .. } => {
            expr_calls_name(object, name)
                || match index.as_ref() {
                    Subscript::Index(expr) => expr_calls_name(expr, name),
                    Subscript::Slice { lower, upper, step } => [lower, upper, step]
                        .into_iter()
                        .flatten()
                        .any(|e| expr_calls_name(e, name)),
                }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_is_constant() {
        assert_eq!(estimate_complexity("x = 1\ny = x + 2\n"), "O(1)");
    }

    #[test]
    fn single_loop_is_linear() {
        assert_eq!(
            estimate_complexity("for i in range(10):\n    x = i\n"),
            "O(n)"
        );
    }

    #[test]
    fn nested_loops_are_quadratic() {
        let source = "for i in range(10):\n    for j in range(10):\n        x = i + j\n";
        assert_eq!(estimate_complexity(source), "O(n^2)");
    }

    #[test]
    fn triple_nesting_is_cubic() {
        let source = "for i in a:\n    for j in a:\n        for k in a:\n            x = 1\n";
        assert_eq!(estimate_complexity(source), "O(n^3)");
    }

    #[test]
    fn loop_with_halving_is_linearithmic() {
        let source = "for i in range(10):\n    n = n // 2\n";
        assert_eq!(estimate_complexity(source), "O(n log n)");
    }

    #[test]
    fn augmented_halving_counts() {
        let source = "while n > 1:\n    n //= 2\n";
        assert_eq!(estimate_complexity(source), "O(n log n)");
    }

    #[test]
    fn bare_halving_is_logarithmic() {
        assert_eq!(estimate_complexity("n = n // 2\n"), "O(log n)");
    }

    #[test]
    fn slice_counts_as_halving() {
        assert_eq!(estimate_complexity("b = arr[1:]\n"), "O(log n)");
    }

    #[test]
    fn recursion_with_loop_is_linearithmic() {
        let source = "\
def f(arr):
    if len(arr) <= 1:
        return arr
    for x in arr:
        y = x
    return f(arr)
";
        assert_eq!(estimate_complexity(source), "O(n log n)");
    }

    #[test]
    fn plain_recursion_is_linear() {
        let source = "def f(n):\n    if n == 0:\n        return 0\n    return f(n - 1)\n";
        assert_eq!(estimate_complexity(source), "O(n)");
    }

    #[test]
    fn tree_recursion_is_logarithmic() {
        let source = "\
def find(node, key):
    if key < node.val:
        return find(node.left, key)
    return find(node.right, key)
";
        assert_eq!(estimate_complexity(source), "O(log n)");
    }

    #[test]
    fn comprehension_counts_as_loop() {
        assert_eq!(estimate_complexity("b = [x for x in arr]\n"), "O(n)");
    }

    #[test]
    fn comprehension_in_recursive_function_is_linearithmic() {
        let source = "\
def f(arr):
    b = [x for x in arr]
    return f(b)
";
        assert_eq!(estimate_complexity(source), "O(n log n)");
    }

    #[test]
    fn parse_failure_is_unknown() {
        assert_eq!(estimate_complexity("def f(:\n"), "unknown");
    }

    #[test]
    fn deterministic() {
        let source = "for i in range(3):\n    x = i\n";
        assert_eq!(estimate_complexity(source), estimate_complexity(source));
    }
}
