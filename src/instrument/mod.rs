//! Statement instrumentation
//!
//! Rewrites a parsed program so that every executed statement is followed by
//! a pair of hook statements: [`Stmt::SetLine`] (record the line that just
//! ran) and [`Stmt::Snapshot`] (capture the current scope). One generic rule
//! covers every kind of block: for each field of any node that holds a
//! statement list, rewrite that list.
//!
//! Hooks trail *simple* statements only. Block-bearing statements (defs,
//! loops, `if`, `with`, `try`) have their nested lists rewritten instead of
//! receiving a trailing pair, so a frame corresponds 1:1 to an executed leaf
//! statement — a loop body run five times yields five frames, and the loop
//! statement itself yields none. Hooks inserted after `return`/`break`/
//! `continue` are unreachable and harmless.
//!
//! The transform never reorders or duplicates subject statements; synthesized
//! nodes carry the location of the statement they follow.

use crate::parser::ast::{ExceptHandler, Program, Stmt};

/// Instrument every statement list in the program
pub fn instrument(program: Program) -> Program {
    Program {
        body: instrument_block(program.body),
    }
}

/// Rewrite one statement list: recurse into nested lists, then interleave
/// hook pairs after simple statements
fn instrument_block(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len() * 3);
    for stmt in stmts {
        let location = stmt.location();
        let stmt = instrument_nested(stmt);
        let is_block = stmt.is_block();
        out.push(stmt);
        if !is_block {
            out.push(Stmt::SetLine {
                line: location.line,
                location,
            });
            out.push(Stmt::Snapshot { location });
        }
    }
    out
}

/// Apply [`instrument_block`] to every statement list a node owns
fn instrument_nested(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::FunctionDef {
            name,
            params,
            body,
            is_async,
            location,
        } => Stmt::FunctionDef {
            name,
            params,
            body: instrument_block(body),
            is_async,
            location,
        },
        Stmt::ClassDef {
            name,
            body,
            location,
        } => Stmt::ClassDef {
            name,
            body: instrument_block(body),
            location,
        },
        Stmt::If {
            condition,
            body,
            orelse,
            location,
        } => Stmt::If {
            condition,
            body: instrument_block(body),
            orelse: instrument_block(orelse),
            location,
        },
        Stmt::While {
            condition,
            body,
            orelse,
            location,
        } => Stmt::While {
            condition,
            body: instrument_block(body),
            orelse: instrument_block(orelse),
            location,
        },
        Stmt::For {
            target,
            iter,
            body,
            orelse,
            location,
        } => Stmt::For {
            target,
            iter,
            body: instrument_block(body),
            orelse: instrument_block(orelse),
            location,
        },
        Stmt::With {
            context,
            binding,
            body,
            location,
        } => Stmt::With {
            context,
            binding,
            body: instrument_block(body),
            location,
        },
        Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            location,
        } => Stmt::Try {
            body: instrument_block(body),
            handlers: handlers
                .into_iter()
                .map(|h| ExceptHandler {
                    type_name: h.type_name,
                    binding: h.binding,
                    body: instrument_block(h.body),
                    location: h.location,
                })
                .collect(),
            orelse: instrument_block(orelse),
            finalbody: instrument_block(finalbody),
            location,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parser::Parser;

    fn instrumented(source: &str) -> Program {
        let program = Parser::new(source)
            .expect("lexer failed")
            .parse_program()
            .expect("parse failed");
        instrument(program)
    }

    fn count_snapshots(stmts: &[Stmt]) -> usize {
        stmts
            .iter()
            .map(|stmt| match stmt {
                Stmt::Snapshot { .. } => 1,
                Stmt::FunctionDef { body, .. } | Stmt::ClassDef { body, .. } => {
                    count_snapshots(body)
                }
                Stmt::If { body, orelse, .. }
                | Stmt::While { body, orelse, .. }
                | Stmt::For { body, orelse, .. } => count_snapshots(body) + count_snapshots(orelse),
                Stmt::With { body, .. } => count_snapshots(body),
                Stmt::Try {
                    body,
                    handlers,
                    orelse,
                    finalbody,
                    ..
                } => {
                    count_snapshots(body)
                        + handlers
                            .iter()
                            .map(|h| count_snapshots(&h.body))
                            .sum::<usize>()
                        + count_snapshots(orelse)
                        + count_snapshots(finalbody)
                }
                _ => 0,
            })
            .sum()
    }

    #[test]
    fn simple_statements_get_hook_pairs() {
        let program = instrumented("x = 1\ny = 2\n");
        // stmt, SetLine, Snapshot per source statement
        assert_eq!(program.body.len(), 6);
        assert!(matches!(program.body[1], Stmt::SetLine { line: 1, .. }));
        assert!(matches!(program.body[2], Stmt::Snapshot { .. }));
        assert!(matches!(program.body[4], Stmt::SetLine { line: 2, .. }));
    }

    #[test]
    fn loop_statement_itself_is_not_hooked() {
        let program = instrumented("for i in range(3):\n    x = i\n");
        // Only the For at module level, no trailing hooks
        assert_eq!(program.body.len(), 1);
        assert_eq!(count_snapshots(&program.body), 1);
    }

    #[test]
    fn hooks_reach_every_nested_block() {
        let source = "\
def f(x):
    if x:
        a = 1
    else:
        b = 2
    while x:
        c = 3
    with x as y:
        d = 4
    try:
        e = 5
    except ValueError:
        g = 6
    finally:
        h = 7
";
        let program = instrumented(source);
        // One snapshot per simple statement: a, b, c, d, e, g, h
        assert_eq!(count_snapshots(&program.body), 7);
    }

    #[test]
    fn hook_carries_the_statement_line() {
        let program = instrumented("x = 1\n\n\ny = 2\n");
        let lines: Vec<u32> = program
            .body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::SetLine { line, .. } => Some(*line),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![1, 4]);
    }

    #[test]
    fn subject_statement_order_is_preserved() {
        let program = instrumented("a = 1\nb = 2\n");
        let names: Vec<&str> = program
            .body
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Assign { targets, .. } => match &targets[0] {
                    crate::parser::ast::Expr::Name { id, .. } => Some(id.as_str()),
                    _ => None,
                },
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
