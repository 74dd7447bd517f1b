//! Lexer (tokenizer) for the subject language
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the
//! parser. Blocks are delimited by layout: the lexer measures leading
//! whitespace at the start of each logical line and emits `Indent`/`Dedent`
//! tokens against an indentation stack, plus a `Newline` at the end of each
//! logical line. Layout tokens are suppressed inside `()`/`[]`/`{}` so
//! bracketed constructs may span lines.

use super::ast::SourceLocation;
use std::fmt;

/// Token kinds produced by the lexer
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),

    // Identifiers
    Ident(String),

    // Keywords
    Def,
    Async,
    Class,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    With,
    As,
    Try,
    Except,
    Finally,
    Break,
    Continue,
    Pass,
    And,
    Or,
    Not,
    True,
    False,
    None,

    // Operators
    Plus,          // +
    Minus,         // -
    Star,          // *
    DoubleStar,    // **
    Slash,         // /
    DoubleSlash,   // //
    Percent,       // %
    EqEq,          // ==
    NotEq,         // !=
    Lt,            // <
    Le,            // <=
    Gt,            // >
    Ge,            // >=
    Assign,        // =
    PlusEq,        // +=
    MinusEq,       // -=
    StarEq,        // *=
    SlashEq,       // /=
    DoubleSlashEq, // //=
    PercentEq,     // %=

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    LBrace,    // {
    RBrace,    // }
    Comma,     // ,
    Colon,     // :
    Dot,       // .
    Semicolon, // ;

    // Layout
    Newline,
    Indent,
    Dedent,

    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Int(n) => write!(f, "integer {}", n),
            TokenKind::Float(x) => write!(f, "float {}", x),
            TokenKind::Str(_) => write!(f, "string literal"),
            TokenKind::Ident(name) => write!(f, "identifier '{}'", name),
            TokenKind::Def => write!(f, "'def'"),
            TokenKind::Async => write!(f, "'async'"),
            TokenKind::Class => write!(f, "'class'"),
            TokenKind::Return => write!(f, "'return'"),
            TokenKind::If => write!(f, "'if'"),
            TokenKind::Elif => write!(f, "'elif'"),
            TokenKind::Else => write!(f, "'else'"),
            TokenKind::While => write!(f, "'while'"),
            TokenKind::For => write!(f, "'for'"),
            TokenKind::In => write!(f, "'in'"),
            TokenKind::With => write!(f, "'with'"),
            TokenKind::As => write!(f, "'as'"),
            TokenKind::Try => write!(f, "'try'"),
            TokenKind::Except => write!(f, "'except'"),
            TokenKind::Finally => write!(f, "'finally'"),
            TokenKind::Break => write!(f, "'break'"),
            TokenKind::Continue => write!(f, "'continue'"),
            TokenKind::Pass => write!(f, "'pass'"),
            TokenKind::And => write!(f, "'and'"),
            TokenKind::Or => write!(f, "'or'"),
            TokenKind::Not => write!(f, "'not'"),
            TokenKind::True => write!(f, "'True'"),
            TokenKind::False => write!(f, "'False'"),
            TokenKind::None => write!(f, "'None'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::DoubleStar => write!(f, "'**'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::DoubleSlash => write!(f, "'//'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::EqEq => write!(f, "'=='"),
            TokenKind::NotEq => write!(f, "'!='"),
            TokenKind::Lt => write!(f, "'<'"),
            TokenKind::Le => write!(f, "'<='"),
            TokenKind::Gt => write!(f, "'>'"),
            TokenKind::Ge => write!(f, "'>='"),
            TokenKind::Assign => write!(f, "'='"),
            TokenKind::PlusEq => write!(f, "'+='"),
            TokenKind::MinusEq => write!(f, "'-='"),
            TokenKind::StarEq => write!(f, "'*='"),
            TokenKind::SlashEq => write!(f, "'/='"),
            TokenKind::DoubleSlashEq => write!(f, "'//='"),
            TokenKind::PercentEq => write!(f, "'%='"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Indent => write!(f, "indent"),
            TokenKind::Dedent => write!(f, "dedent"),
            TokenKind::Eof => write!(f, "end of file"),
        }
    }
}

/// A token with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub location: SourceLocation,
}

impl Token {
    fn new(kind: TokenKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

/// Lexer error type
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub location: SourceLocation,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lex error at line {}, column {}: {}",
            self.location.line, self.location.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Tab stops expand to the next multiple of this width when measuring
/// indentation.
const TAB_WIDTH: usize = 8;

/// Layout-sensitive lexer for the subject language
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
    indent_stack: Vec<usize>,
    bracket_depth: usize,
    at_line_start: bool,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            bracket_depth: 0,
            at_line_start: true,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                self.handle_line_start(&mut tokens)?;
                if self.is_at_end() {
                    break;
                }
            }

            if self.is_at_end() {
                // Input ended mid-line (no trailing newline)
                if !self.at_line_start {
                    tokens.push(Token::new(TokenKind::Newline, self.current_location()));
                    self.at_line_start = true;
                }
                break;
            }

            let ch = self.peek().unwrap();
            match ch {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '#' => {
                    self.skip_comment();
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    // Explicit line continuation
                    self.advance();
                    self.advance_newline();
                }
                '\n' => {
                    if self.bracket_depth > 0 {
                        self.advance_newline();
                    } else {
                        let loc = self.current_location();
                        self.advance_newline();
                        tokens.push(Token::new(TokenKind::Newline, loc));
                        self.at_line_start = true;
                    }
                }
                _ => {
                    tokens.push(self.next_token()?);
                }
            }
        }

        // Close any open blocks
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            tokens.push(Token::new(TokenKind::Dedent, self.current_location()));
        }
        tokens.push(Token::new(TokenKind::Eof, self.current_location()));

        Ok(tokens)
    }

    /// Measure indentation at the start of a logical line and emit
    /// Indent/Dedent tokens against the stack. Blank and comment-only lines
    /// produce no layout tokens at all.
    fn handle_line_start(&mut self, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        loop {
            let mut width = 0usize;
            while let Some(ch) = self.peek() {
                match ch {
                    ' ' => {
                        width += 1;
                        self.advance();
                    }
                    '\t' => {
                        width = (width / TAB_WIDTH + 1) * TAB_WIDTH;
                        self.advance();
                    }
                    '\r' => {
                        self.advance();
                    }
                    _ => break,
                }
            }

            match self.peek() {
                // Blank line: swallow and re-measure the next one
                Some('\n') => {
                    self.advance_newline();
                }
                // Comment-only line
                Some('#') => {
                    self.skip_comment();
                    if self.peek() == Some('\n') {
                        self.advance_newline();
                    }
                }
                Option::None => {
                    self.at_line_start = true;
                    return Ok(());
                }
                Some(_) => {
                    let current = *self.indent_stack.last().unwrap();
                    if width > current {
                        self.indent_stack.push(width);
                        tokens.push(Token::new(TokenKind::Indent, self.current_location()));
                    } else if width < current {
                        while *self.indent_stack.last().unwrap() > width {
                            self.indent_stack.pop();
                            tokens.push(Token::new(TokenKind::Dedent, self.current_location()));
                        }
                        if *self.indent_stack.last().unwrap() != width {
                            return Err(LexError {
                                message: "unindent does not match any outer indentation level"
                                    .to_string(),
                                location: self.current_location(),
                            });
                        }
                    }
                    self.at_line_start = false;
                    return Ok(());
                }
            }
        }
    }

    /// Get the next non-layout token
    fn next_token(&mut self) -> Result<Token, LexError> {
        let loc = self.current_location();
        let ch = self.advance().ok_or_else(|| LexError {
            message: "unexpected end of file".to_string(),
            location: loc,
        })?;

        let kind = match ch {
            '"' | '\'' => return self.string_literal(ch, loc),
            '0'..='9' => return self.number_literal(ch, loc),
            'a'..='z' | 'A'..='Z' | '_' => return Ok(self.identifier_or_keyword(ch, loc)),

            '+' => {
                if self.match_char('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.match_char('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.match_char('*') {
                    TokenKind::DoubleStar
                } else if self.match_char('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.match_char('/') {
                    if self.match_char('=') {
                        TokenKind::DoubleSlashEq
                    } else {
                        TokenKind::DoubleSlash
                    }
                } else if self.match_char('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.match_char('=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.match_char('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::NotEq
                } else {
                    return Err(LexError {
                        message: "unexpected character '!'".to_string(),
                        location: loc,
                    });
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '(' => {
                self.bracket_depth += 1;
                TokenKind::LParen
            }
            ')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RParen
            }
            '[' => {
                self.bracket_depth += 1;
                TokenKind::LBracket
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RBracket
            }
            '{' => {
                self.bracket_depth += 1;
                TokenKind::LBrace
            }
            '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                TokenKind::RBrace
            }
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            ';' => TokenKind::Semicolon,

            other => {
                return Err(LexError {
                    message: format!("unexpected character '{}'", other),
                    location: loc,
                });
            }
        };

        Ok(Token::new(kind, loc))
    }

    /// Scan a string literal. Handles both quote characters and triple-quoted
    /// strings (used for docstrings in subject code).
    fn string_literal(&mut self, quote: char, loc: SourceLocation) -> Result<Token, LexError> {
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.advance();
            self.advance();
        }

        let mut text = String::new();
        loop {
            let ch = self.peek().ok_or_else(|| LexError {
                message: "unterminated string literal".to_string(),
                location: loc,
            })?;

            if triple {
                if ch == quote && self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.advance();
                    self.advance();
                    self.advance();
                    break;
                }
                if ch == '\n' {
                    self.advance_newline();
                    text.push('\n');
                    continue;
                }
            } else {
                if ch == quote {
                    self.advance();
                    break;
                }
                if ch == '\n' {
                    return Err(LexError {
                        message: "unterminated string literal".to_string(),
                        location: loc,
                    });
                }
            }

            if ch == '\\' {
                self.advance();
                let escaped = self.advance().ok_or_else(|| LexError {
                    message: "unterminated escape sequence".to_string(),
                    location: loc,
                })?;
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '\\' => text.push('\\'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    '0' => text.push('\0'),
                    '\n' => {
                        // Escaped newline inside a string continues it
                        self.line += 1;
                        self.column = 1;
                    }
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                }
            } else {
                self.advance();
                text.push(ch);
            }
        }

        Ok(Token::new(TokenKind::Str(text), loc))
    }

    /// Scan an integer or float literal
    fn number_literal(&mut self, first: char, loc: SourceLocation) -> Result<Token, LexError> {
        let mut text = String::new();
        text.push(first);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;

        // Fractional part ('.' followed by a digit, so '1.append' stays sane)
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.advance();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        // Exponent
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign_ok = match self.peek_at(1) {
                Some('+') | Some('-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                Option::None => false,
            };
            if sign_ok {
                is_float = true;
                text.push(self.advance().unwrap());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.advance().unwrap());
                }
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_digit() {
                        text.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        if is_float {
            let value = text.parse::<f64>().map_err(|_| LexError {
                message: format!("invalid float literal '{}'", text),
                location: loc,
            })?;
            Ok(Token::new(TokenKind::Float(value), loc))
        } else {
            let value = text.parse::<i64>().map_err(|_| LexError {
                message: format!("integer literal '{}' out of range", text),
                location: loc,
            })?;
            Ok(Token::new(TokenKind::Int(value), loc))
        }
    }

    /// Scan an identifier or keyword
    fn identifier_or_keyword(&mut self, first: char, loc: SourceLocation) -> Token {
        let mut text = String::new();
        text.push(first);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let kind = match text.as_str() {
            "def" => TokenKind::Def,
            "async" => TokenKind::Async,
            "class" => TokenKind::Class,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "with" => TokenKind::With,
            "as" => TokenKind::As,
            "try" => TokenKind::Try,
            "except" => TokenKind::Except,
            "finally" => TokenKind::Finally,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "pass" => TokenKind::Pass,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            _ => TokenKind::Ident(text),
        };

        Token::new(kind, loc)
    }

    // ===== Cursor helpers =====

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        self.column += 1;
        Some(ch)
    }

    /// Consume a '\n' and reset the location to the next line
    fn advance_newline(&mut self) {
        if self.peek() == Some('\n') {
            self.position += 1;
            self.line += 1;
            self.column = 1;
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn current_location(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("tokenize failed")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn simple_assignment() {
        let toks = kinds("x = 1\n");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::Int(1),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn indent_dedent_pairs() {
        let toks = kinds("if x:\n    y = 1\nz = 2\n");
        assert!(toks.contains(&TokenKind::Indent));
        assert!(toks.contains(&TokenKind::Dedent));
        let indents = toks.iter().filter(|k| **k == TokenKind::Indent).count();
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
    }

    #[test]
    fn dedent_emitted_at_eof() {
        let toks = kinds("while x:\n    x = x - 1");
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 1);
        assert_eq!(*toks.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn blank_and_comment_lines_do_not_dedent() {
        let toks = kinds("if x:\n    a = 1\n\n    # note\n    b = 2\n");
        let dedents = toks.iter().filter(|k| **k == TokenKind::Dedent).count();
        assert_eq!(dedents, 1);
    }

    #[test]
    fn newline_suppressed_inside_brackets() {
        let toks = kinds("arr = [1,\n       2]\n");
        let newlines = toks.iter().filter(|k| **k == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn floor_division_tokens() {
        let toks = kinds("mid = n // 2\nn //= 2\n");
        assert!(toks.contains(&TokenKind::DoubleSlash));
        assert!(toks.contains(&TokenKind::DoubleSlashEq));
    }

    #[test]
    fn triple_quoted_string() {
        let toks = kinds("s = \"\"\"two\nlines\"\"\"\n");
        assert!(toks.contains(&TokenKind::Str("two\nlines".into())));
    }

    #[test]
    fn bad_unindent_is_an_error() {
        let result = Lexer::new("if x:\n    a = 1\n  b = 2\n").tokenize();
        assert!(result.is_err());
    }

    #[test]
    fn locations_track_lines() {
        let tokens = Lexer::new("a = 1\nb = 2\n").tokenize().unwrap();
        let b = tokens
            .iter()
            .find(|t| t.kind == TokenKind::Ident("b".into()))
            .unwrap();
        assert_eq!(b.location.line, 2);
        assert_eq!(b.location.column, 1);
    }
}
