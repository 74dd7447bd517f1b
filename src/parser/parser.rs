//! Recursive descent parser for the subject language
//!
//! Statement parsing dispatches on the leading keyword; suites accept either
//! an indented block (`NEWLINE INDENT ... DEDENT`) or simple statements on
//! the header line. Expressions use precedence climbing in the usual order:
//! `or` < `and` < `not` < comparison < additive < multiplicative < unary <
//! power < postfix (call / subscript / attribute).

use crate::parser::ast::*;
use crate::parser::lexer::{LexError, Lexer, Token, TokenKind};
use thiserror::Error;

/// Parser error type
#[derive(Debug, Clone, Error)]
#[error("parse error at line {}, column {}: {message}", location.line, location.column)]
pub struct ParseError {
    pub message: String,
    pub location: SourceLocation,
}

impl From<LexError> for ParseError {
    fn from(err: LexError) -> Self {
        ParseError {
            message: err.message,
            location: err.location,
        }
    }
}

/// Recursive descent parser for the subject language
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(source);
        let tokens = lexer.tokenize()?;
        Ok(Self {
            tokens,
            position: 0,
        })
    }

    /// Parse the entire program (module-level statement list)
    pub fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::default();

        while !self.check(&TokenKind::Eof) {
            if self.match_kind(&TokenKind::Newline) {
                continue;
            }
            self.parse_statement_into(&mut program.body)?;
        }

        Ok(program)
    }

    /// Parse one statement (or one `;`-joined run of simple statements) and
    /// append the results to `out`
    fn parse_statement_into(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        match self.peek_kind() {
            TokenKind::Def => {
                let stmt = self.parse_function_def(false)?;
                out.push(stmt);
            }
            TokenKind::Async => {
                let loc = self.current_location();
                self.advance();
                if !self.check(&TokenKind::Def) {
                    return Err(self.error_at(loc, "expected 'def' after 'async'"));
                }
                let stmt = self.parse_function_def(true)?;
                out.push(stmt);
            }
            TokenKind::Class => {
                let stmt = self.parse_class_def()?;
                out.push(stmt);
            }
            TokenKind::If => {
                let stmt = self.parse_if()?;
                out.push(stmt);
            }
            TokenKind::While => {
                let stmt = self.parse_while()?;
                out.push(stmt);
            }
            TokenKind::For => {
                let stmt = self.parse_for()?;
                out.push(stmt);
            }
            TokenKind::With => {
                let stmt = self.parse_with()?;
                out.push(stmt);
            }
            TokenKind::Try => {
                let stmt = self.parse_try()?;
                out.push(stmt);
            }
            _ => {
                self.parse_simple_line(out)?;
            }
        }
        Ok(())
    }

    /// Parse a run of `;`-separated simple statements terminated by a newline
    fn parse_simple_line(&mut self, out: &mut Vec<Stmt>) -> Result<(), ParseError> {
        loop {
            out.push(self.parse_simple_statement()?);
            if self.match_kind(&TokenKind::Semicolon) {
                if self.check(&TokenKind::Newline) || self.check(&TokenKind::Eof) {
                    break;
                }
                continue;
            }
            break;
        }
        self.expect_newline()?;
        Ok(())
    }

    /// Parse one simple (non-block) statement
    fn parse_simple_statement(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();

        match self.peek_kind() {
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Newline)
                    || self.check(&TokenKind::Semicolon)
                    || self.check(&TokenKind::Eof)
                {
                    None
                } else {
                    Some(self.parse_expr_or_tuple()?)
                };
                Ok(Stmt::Return {
                    value,
                    location: loc,
                })
            }
            TokenKind::Break => {
                self.advance();
                Ok(Stmt::Break { location: loc })
            }
            TokenKind::Continue => {
                self.advance();
                Ok(Stmt::Continue { location: loc })
            }
            TokenKind::Pass => {
                self.advance();
                Ok(Stmt::Pass { location: loc })
            }
            _ => self.parse_expression_statement(loc),
        }
    }

    /// Parse an expression statement, assignment, or augmented assignment
    fn parse_expression_statement(&mut self, loc: SourceLocation) -> Result<Stmt, ParseError> {
        let first = self.parse_expr_or_tuple()?;

        // Chained assignment: a = b = expr
        if self.check(&TokenKind::Assign) {
            let mut targets = vec![first];
            let mut value = None;
            while self.match_kind(&TokenKind::Assign) {
                let next = self.parse_expr_or_tuple()?;
                if self.check(&TokenKind::Assign) {
                    targets.push(next);
                } else {
                    value = Some(next);
                }
            }
            for target in &targets {
                self.check_assignable(target)?;
            }
            return Ok(Stmt::Assign {
                targets,
                value: value.expect("assignment value"),
                location: loc,
            });
        }

        // Augmented assignment
        let aug_op = match self.peek_kind() {
            TokenKind::PlusEq => Some(BinOp::Add),
            TokenKind::MinusEq => Some(BinOp::Sub),
            TokenKind::StarEq => Some(BinOp::Mul),
            TokenKind::SlashEq => Some(BinOp::Div),
            TokenKind::DoubleSlashEq => Some(BinOp::FloorDiv),
            TokenKind::PercentEq => Some(BinOp::Mod),
            _ => None,
        };
        if let Some(op) = aug_op {
            self.advance();
            self.check_assignable(&first)?;
            let value = self.parse_expr_or_tuple()?;
            return Ok(Stmt::AugAssign {
                target: first,
                op,
                value,
                location: loc,
            });
        }

        Ok(Stmt::Expr {
            value: first,
            location: loc,
        })
    }

    /// Reject assignment targets that are not names, subscripts, attributes,
    /// or tuples thereof
    fn check_assignable(&self, target: &Expr) -> Result<(), ParseError> {
        match target {
            Expr::Name { .. } | Expr::Subscript { .. } | Expr::Attribute { .. } => Ok(()),
            Expr::Tuple { elts, .. } => {
                for elt in elts {
                    self.check_assignable(elt)?;
                }
                Ok(())
            }
            other => Err(ParseError {
                message: "cannot assign to this expression".to_string(),
                location: other.location(),
            }),
        }
    }

    // ===== Block statements =====

    fn parse_function_def(&mut self, is_async: bool) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        self.expect(&TokenKind::Def, "expected 'def'")?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen, "expected '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.expect_identifier()?);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
                // Trailing comma
                if self.check(&TokenKind::RParen) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "expected ')' after parameters")?;

        let body = self.parse_suite()?;
        Ok(Stmt::FunctionDef {
            name,
            params,
            body,
            is_async,
            location: loc,
        })
    }

    fn parse_class_def(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        self.expect(&TokenKind::Class, "expected 'class'")?;
        let name = self.expect_identifier()?;

        // Base list is accepted and ignored; only plain classes execute
        if self.match_kind(&TokenKind::LParen) {
            while !self.check(&TokenKind::RParen) {
                if self.check(&TokenKind::Eof) {
                    return Err(self.error_at(loc, "unterminated class base list"));
                }
                self.advance();
            }
            self.expect(&TokenKind::RParen, "expected ')' after class bases")?;
        }

        let body = self.parse_suite()?;
        Ok(Stmt::ClassDef {
            name,
            body,
            location: loc,
        })
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        self.expect(&TokenKind::If, "expected 'if'")?;
        let condition = self.parse_expression()?;
        let body = self.parse_suite()?;
        let orelse = self.parse_else_chain()?;
        Ok(Stmt::If {
            condition,
            body,
            orelse,
            location: loc,
        })
    }

    /// Parse `elif`/`else` after an `if` suite; `elif` becomes a nested `If`
    fn parse_else_chain(&mut self) -> Result<Vec<Stmt>, ParseError> {
        if self.check(&TokenKind::Elif) {
            let loc = self.current_location();
            self.advance();
            let condition = self.parse_expression()?;
            let body = self.parse_suite()?;
            let orelse = self.parse_else_chain()?;
            return Ok(vec![Stmt::If {
                condition,
                body,
                orelse,
                location: loc,
            }]);
        }
        if self.match_kind(&TokenKind::Else) {
            return self.parse_suite();
        }
        Ok(Vec::new())
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        self.expect(&TokenKind::While, "expected 'while'")?;
        let condition = self.parse_expression()?;
        let body = self.parse_suite()?;
        let orelse = if self.match_kind(&TokenKind::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::While {
            condition,
            body,
            orelse,
            location: loc,
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        self.expect(&TokenKind::For, "expected 'for'")?;
        let target = self.parse_target()?;
        self.expect(&TokenKind::In, "expected 'in' in for statement")?;
        let iter = self.parse_expression()?;
        let body = self.parse_suite()?;
        let orelse = if self.match_kind(&TokenKind::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::For {
            target,
            iter,
            body,
            orelse,
            location: loc,
        })
    }

    /// Parse a loop target: a name or a comma-separated tuple of names
    fn parse_target(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let first = self.parse_single_target()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if self.check(&TokenKind::In) {
                break;
            }
            elts.push(self.parse_single_target()?);
        }
        Ok(Expr::Tuple {
            elts,
            location: loc,
        })
    }

    fn parse_single_target(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        if self.match_kind(&TokenKind::LParen) {
            let inner = self.parse_target()?;
            self.expect(&TokenKind::RParen, "expected ')' in target")?;
            return Ok(inner);
        }
        let name = self.expect_identifier()?;
        Ok(Expr::Name {
            id: name,
            location: loc,
        })
    }

    fn parse_with(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        self.expect(&TokenKind::With, "expected 'with'")?;
        let context = self.parse_expression()?;
        let binding = if self.match_kind(&TokenKind::As) {
            Some(self.expect_identifier()?)
        } else {
            None
        };
        let body = self.parse_suite()?;
        Ok(Stmt::With {
            context,
            binding,
            body,
            location: loc,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let loc = self.current_location();
        self.expect(&TokenKind::Try, "expected 'try'")?;
        let body = self.parse_suite()?;

        let mut handlers = Vec::new();
        while self.check(&TokenKind::Except) {
            let handler_loc = self.current_location();
            self.advance();
            let mut type_name = None;
            let mut binding = None;
            if !self.check(&TokenKind::Colon) {
                type_name = Some(self.expect_identifier()?);
                if self.match_kind(&TokenKind::As) {
                    binding = Some(self.expect_identifier()?);
                }
            }
            let handler_body = self.parse_suite()?;
            handlers.push(ExceptHandler {
                type_name,
                binding,
                body: handler_body,
                location: handler_loc,
            });
        }

        let orelse = if !handlers.is_empty() && self.match_kind(&TokenKind::Else) {
            self.parse_suite()?
        } else {
            Vec::new()
        };

        let finalbody = if self.match_kind(&TokenKind::Finally) {
            self.parse_suite()?
        } else {
            Vec::new()
        };

        if handlers.is_empty() && finalbody.is_empty() {
            return Err(self.error_at(loc, "expected 'except' or 'finally' after try block"));
        }

        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
            location: loc,
        })
    }

    /// Parse a suite: `: NEWLINE INDENT stmt+ DEDENT` or `: simple_stmts NEWLINE`
    fn parse_suite(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::Colon, "expected ':'")?;

        let mut body = Vec::new();
        if self.match_kind(&TokenKind::Newline) {
            self.expect(&TokenKind::Indent, "expected an indented block")?;
            while !self.check(&TokenKind::Dedent) && !self.check(&TokenKind::Eof) {
                if self.match_kind(&TokenKind::Newline) {
                    continue;
                }
                self.parse_statement_into(&mut body)?;
            }
            self.expect(&TokenKind::Dedent, "expected dedent to close block")?;
        } else {
            // Single-line suite: `if x: y = 1`
            self.parse_simple_line(&mut body)?;
        }

        if body.is_empty() {
            return Err(ParseError {
                message: "expected at least one statement in block".to_string(),
                location: self.current_location(),
            });
        }
        Ok(body)
    }

    // ===== Expressions =====

    /// Parse an expression, allowing a bare comma-separated tuple
    pub(crate) fn parse_expr_or_tuple(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();
        let first = self.parse_expression()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if self.tuple_element_follows() {
                elts.push(self.parse_expression()?);
            } else {
                break;
            }
        }
        Ok(Expr::Tuple {
            elts,
            location: loc,
        })
    }

    /// Whether the token after a comma starts another tuple element
    fn tuple_element_follows(&self) -> bool {
        !matches!(
            self.peek_kind(),
            TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Semicolon
                | TokenKind::Assign
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::Colon
        )
    }

    /// Parse expression (top-level entry point)
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            let loc = self.current_location();
            self.advance();
            let right = Box::new(self.parse_and()?);
            left = Expr::BoolOp {
                op: BoolOp::Or,
                left: Box::new(left),
                right,
                location: loc,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.check(&TokenKind::And) {
            let loc = self.current_location();
            self.advance();
            let right = Box::new(self.parse_not()?);
            left = Expr::BoolOp {
                op: BoolOp::And,
                left: Box::new(left),
                right,
                location: loc,
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.check(&TokenKind::Not) {
            let loc = self.current_location();
            self.advance();
            let operand = Box::new(self.parse_not()?);
            return Ok(Expr::UnaryOp {
                op: UnaryOp::Not,
                operand,
                location: loc,
            });
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        let op = match self.peek_kind() {
            TokenKind::EqEq => Some(CmpOp::Eq),
            TokenKind::NotEq => Some(CmpOp::NotEq),
            TokenKind::Lt => Some(CmpOp::Lt),
            TokenKind::Le => Some(CmpOp::Le),
            TokenKind::Gt => Some(CmpOp::Gt),
            TokenKind::Ge => Some(CmpOp::Ge),
            TokenKind::In => Some(CmpOp::In),
            TokenKind::Not => {
                // `not in`
                if self.peek_kind_at(1) == Some(&TokenKind::In) {
                    Some(CmpOp::NotIn)
                } else {
                    None
                }
            }
            _ => None,
        };

        if let Some(op) = op {
            let loc = self.current_location();
            self.advance();
            if op == CmpOp::NotIn {
                self.advance(); // consume 'in'
            }
            let right = Box::new(self.parse_additive()?);
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right,
                location: loc,
            });
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let loc = self.current_location();
            self.advance();
            let right = Box::new(self.parse_multiplicative()?);
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right,
                location: loc,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::DoubleSlash => BinOp::FloorDiv,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let loc = self.current_location();
            self.advance();
            let right = Box::new(self.parse_unary()?);
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right,
                location: loc,
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        match self.peek_kind() {
            TokenKind::Minus => {
                let loc = self.current_location();
                self.advance();
                let operand = Box::new(self.parse_unary()?);
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Neg,
                    operand,
                    location: loc,
                })
            }
            TokenKind::Plus => {
                // Unary plus is the identity
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_postfix()?;
        if self.check(&TokenKind::DoubleStar) {
            let loc = self.current_location();
            self.advance();
            // Right-associative; exponent may carry a unary minus
            let right = Box::new(self.parse_unary()?);
            return Ok(Expr::BinaryOp {
                op: BinOp::Pow,
                left: Box::new(base),
                right,
                location: loc,
            });
        }
        Ok(base)
    }

    /// Parse postfix chains: calls, subscripts, attribute access
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_atom()?;

        loop {
            match self.peek_kind() {
                TokenKind::LParen => {
                    let loc = self.current_location();
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expression()?);
                            if !self.match_kind(&TokenKind::Comma) {
                                break;
                            }
                            if self.check(&TokenKind::RParen) {
                                break;
                            }
                        }
                    }
                    self.expect(&TokenKind::RParen, "expected ')' after arguments")?;
                    expr = Expr::Call {
                        func: Box::new(expr),
                        args,
                        location: loc,
                    };
                }
                TokenKind::LBracket => {
                    let loc = self.current_location();
                    self.advance();
                    let index = self.parse_subscript()?;
                    self.expect(&TokenKind::RBracket, "expected ']' after subscript")?;
                    expr = Expr::Subscript {
                        object: Box::new(expr),
                        index: Box::new(index),
                        location: loc,
                    };
                }
                TokenKind::Dot => {
                    let loc = self.current_location();
                    self.advance();
                    let attr = self.expect_identifier()?;
                    expr = Expr::Attribute {
                        object: Box::new(expr),
                        attr,
                        location: loc,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Parse the inside of `[...]`: a plain index or a slice
    fn parse_subscript(&mut self) -> Result<Subscript, ParseError> {
        let lower = if self.check(&TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        if !self.match_kind(&TokenKind::Colon) {
            let index = lower.ok_or_else(|| ParseError {
                message: "expected expression in subscript".to_string(),
                location: self.current_location(),
            })?;
            return Ok(Subscript::Index(index));
        }

        let upper = if self.check(&TokenKind::RBracket) || self.check(&TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expression()?)
        };

        let step = if self.match_kind(&TokenKind::Colon) {
            if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(self.parse_expression()?)
            }
        } else {
            None
        };

        Ok(Subscript::Slice { lower, upper, step })
    }

    /// Parse an atom: literal, name, parenthesized form, display
    fn parse_atom(&mut self) -> Result<Expr, ParseError> {
        let loc = self.current_location();

        let kind = self.peek_kind().clone();
        match kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Constant {
                    value: Constant::Int(n),
                    location: loc,
                })
            }
            TokenKind::Float(x) => {
                self.advance();
                Ok(Expr::Constant {
                    value: Constant::Float(x),
                    location: loc,
                })
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Constant {
                    value: Constant::Str(s),
                    location: loc,
                })
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Constant {
                    value: Constant::Bool(true),
                    location: loc,
                })
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Constant {
                    value: Constant::Bool(false),
                    location: loc,
                })
            }
            TokenKind::None => {
                self.advance();
                Ok(Expr::Constant {
                    value: Constant::None,
                    location: loc,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Name {
                    id: name,
                    location: loc,
                })
            }
            TokenKind::LParen => {
                self.advance();
                if self.match_kind(&TokenKind::RParen) {
                    // Empty tuple
                    return Ok(Expr::Tuple {
                        elts: Vec::new(),
                        location: loc,
                    });
                }
                let inner = self.parse_expr_or_tuple()?;
                self.expect(&TokenKind::RParen, "expected ')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.advance();
                self.parse_list_display(loc)
            }
            TokenKind::LBrace => {
                self.advance();
                self.parse_dict_display(loc)
            }
            other => Err(self.error_at(loc, &format!("unexpected {}", other))),
        }
    }

    /// Parse `[...]` after the opening bracket: list display or comprehension
    fn parse_list_display(&mut self, loc: SourceLocation) -> Result<Expr, ParseError> {
        if self.match_kind(&TokenKind::RBracket) {
            return Ok(Expr::List {
                elts: Vec::new(),
                location: loc,
            });
        }

        let first = self.parse_expression()?;

        // Comprehension: [elt for target in iter if cond]
        if self.match_kind(&TokenKind::For) {
            let target = Box::new(self.parse_target()?);
            self.expect(&TokenKind::In, "expected 'in' in comprehension")?;
            let iter = Box::new(self.parse_expression()?);
            let condition = if self.match_kind(&TokenKind::If) {
                Some(Box::new(self.parse_expression()?))
            } else {
                None
            };
            self.expect(&TokenKind::RBracket, "expected ']' after comprehension")?;
            return Ok(Expr::ListComp {
                elt: Box::new(first),
                target,
                iter,
                condition,
                location: loc,
            });
        }

        let mut elts = vec![first];
        while self.match_kind(&TokenKind::Comma) {
            if self.check(&TokenKind::RBracket) {
                break;
            }
            elts.push(self.parse_expression()?);
        }
        self.expect(&TokenKind::RBracket, "expected ']' after list")?;
        Ok(Expr::List {
            elts,
            location: loc,
        })
    }

    /// Parse `{...}` after the opening brace: dict display
    fn parse_dict_display(&mut self, loc: SourceLocation) -> Result<Expr, ParseError> {
        let mut entries = Vec::new();
        if !self.check(&TokenKind::RBrace) {
            loop {
                let key = self.parse_expression()?;
                self.expect(&TokenKind::Colon, "expected ':' in dict entry")?;
                let value = self.parse_expression()?;
                entries.push((key, value));
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
                if self.check(&TokenKind::RBrace) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBrace, "expected '}' after dict")?;
        Ok(Expr::Dict {
            entries,
            location: loc,
        })
    }

    // ===== Token helpers =====

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.position.min(self.tokens.len() - 1)].kind
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.position + offset).map(|t| &t.kind)
    }

    fn current_location(&self) -> SourceLocation {
        self.tokens[self.position.min(self.tokens.len() - 1)].location
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Result<(), ParseError> {
        if self.match_kind(kind) {
            Ok(())
        } else {
            Err(ParseError {
                message: format!("{}, found {}", message, self.peek_kind()),
                location: self.current_location(),
            })
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        if let TokenKind::Ident(name) = self.peek_kind() {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(ParseError {
                message: format!("expected identifier, found {}", self.peek_kind()),
                location: self.current_location(),
            })
        }
    }

    /// Consume the newline that ends a simple-statement line. EOF and a
    /// closing dedent both terminate a line as well.
    fn expect_newline(&mut self) -> Result<(), ParseError> {
        if self.match_kind(&TokenKind::Newline)
            || self.check(&TokenKind::Eof)
            || self.check(&TokenKind::Dedent)
        {
            Ok(())
        } else {
            Err(ParseError {
                message: format!("expected end of line, found {}", self.peek_kind()),
                location: self.current_location(),
            })
        }
    }

    fn error_at(&self, location: SourceLocation, message: &str) -> ParseError {
        ParseError {
            message: message.to_string(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        Parser::new(source)
            .expect("lexer failed")
            .parse_program()
            .expect("parse failed")
    }

    #[test]
    fn parses_assignment_and_call() {
        let program = parse("x = 1\nprint(x)\n");
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[0], Stmt::Assign { .. }));
        assert!(matches!(program.body[1], Stmt::Expr { .. }));
    }

    #[test]
    fn parses_nested_function_defs() {
        let source = "def outer(arr):\n    def inner(x):\n        return x\n    return inner(arr)\n";
        let program = parse(source);
        let Stmt::FunctionDef { body, .. } = &program.body[0] else {
            panic!("expected function def");
        };
        assert!(matches!(body[0], Stmt::FunctionDef { .. }));
        assert!(matches!(body[1], Stmt::Return { .. }));
    }

    #[test]
    fn elif_desugars_to_nested_if() {
        let source = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
        let program = parse(source);
        let Stmt::If { orelse, .. } = &program.body[0] else {
            panic!("expected if");
        };
        assert_eq!(orelse.len(), 1);
        let Stmt::If { orelse: inner, .. } = &orelse[0] else {
            panic!("expected nested if for elif");
        };
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn parses_slices() {
        let program = parse("a = arr[:mid]\nb = arr[mid:]\nc = arr[1:3]\nd = arr[::2]\n");
        for stmt in &program.body {
            let Stmt::Assign { value, .. } = stmt else {
                panic!("expected assign");
            };
            let Expr::Subscript { index, .. } = value else {
                panic!("expected subscript");
            };
            assert!(matches!(**index, Subscript::Slice { .. }));
        }
    }

    #[test]
    fn parses_tuple_unpacking_assignment() {
        let program = parse("a, b = b, a\n");
        let Stmt::Assign { targets, value, .. } = &program.body[0] else {
            panic!("expected assign");
        };
        assert!(matches!(targets[0], Expr::Tuple { .. }));
        assert!(matches!(value, Expr::Tuple { .. }));
    }

    #[test]
    fn parses_chained_assignment() {
        let program = parse("i = j = 0\n");
        let Stmt::Assign { targets, .. } = &program.body[0] else {
            panic!("expected assign");
        };
        assert_eq!(targets.len(), 2);
    }

    #[test]
    fn parses_list_comprehension() {
        let program = parse("b = [x * 2 for x in arr if x > 0]\n");
        let Stmt::Assign { value, .. } = &program.body[0] else {
            panic!("expected assign");
        };
        assert!(matches!(value, Expr::ListComp { .. }));
    }

    #[test]
    fn parses_try_except_finally() {
        let source =
            "try:\n    x = 1\nexcept ValueError as e:\n    x = 2\nelse:\n    x = 3\nfinally:\n    y = 4\n";
        let program = parse(source);
        let Stmt::Try {
            handlers,
            orelse,
            finalbody,
            ..
        } = &program.body[0]
        else {
            panic!("expected try");
        };
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].type_name.as_deref(), Some("ValueError"));
        assert_eq!(handlers[0].binding.as_deref(), Some("e"));
        assert_eq!(orelse.len(), 1);
        assert_eq!(finalbody.len(), 1);
    }

    #[test]
    fn parses_async_def() {
        let program = parse("async def f():\n    return 1\n");
        let Stmt::FunctionDef { is_async, .. } = &program.body[0] else {
            panic!("expected function def");
        };
        assert!(is_async);
    }

    #[test]
    fn parses_class_with_init() {
        let source = "class Node:\n    def __init__(self, val):\n        self.val = val\n        self.next = None\n";
        let program = parse(source);
        let Stmt::ClassDef { name, body, .. } = &program.body[0] else {
            panic!("expected class def");
        };
        assert_eq!(name, "Node");
        assert!(matches!(body[0], Stmt::FunctionDef { .. }));
    }

    #[test]
    fn parses_single_line_suite() {
        let program = parse("if x: y = 1\n");
        let Stmt::If { body, .. } = &program.body[0] else {
            panic!("expected if");
        };
        assert_eq!(body.len(), 1);
    }

    #[test]
    fn power_is_right_associative() {
        let program = parse("x = 2 ** 3 ** 2\n");
        let Stmt::Assign { value, .. } = &program.body[0] else {
            panic!("expected assign");
        };
        let Expr::BinaryOp { op, right, .. } = value else {
            panic!("expected binop");
        };
        assert_eq!(*op, BinOp::Pow);
        assert!(matches!(**right, Expr::BinaryOp { op: BinOp::Pow, .. }));
    }

    #[test]
    fn rejects_bad_assignment_target() {
        let result = Parser::new("1 = x\n").unwrap().parse_program();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_unclosed_paren() {
        // The unterminated bracket swallows layout to EOF and parsing fails
        let result = Parser::new("x = (1 + 2\n").unwrap().parse_program();
        assert!(result.is_err());
    }
}
