//! Script tokenizer
//!
//! Turns source text into a flat token stream for the parser. Tracks line and
//! column so syntax errors point at the offending token.

use super::error::ScriptError;

/// A lexical token kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),

    // Keywords
    Const,
    Let,
    Var,
    Return,
    If,
    Else,
    While,
    True,
    False,
    Null,
    Undefined,
    Typeof,

    // Punctuation
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEq,
    BangEqEq,
    Assign,
    EqEq,
    EqEqEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,
    Question,
    Arrow,

    Eof,
}

impl TokenKind {
    /// Short display form used in syntax error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Number(n) => format!("{}", n),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Const => "const".to_string(),
            TokenKind::Let => "let".to_string(),
            TokenKind::Var => "var".to_string(),
            TokenKind::Return => "return".to_string(),
            TokenKind::If => "if".to_string(),
            TokenKind::Else => "else".to_string(),
            TokenKind::While => "while".to_string(),
            TokenKind::True => "true".to_string(),
            TokenKind::False => "false".to_string(),
            TokenKind::Null => "null".to_string(),
            TokenKind::Undefined => "undefined".to_string(),
            TokenKind::Typeof => "typeof".to_string(),
            TokenKind::Plus => "+".to_string(),
            TokenKind::Minus => "-".to_string(),
            TokenKind::Star => "*".to_string(),
            TokenKind::Slash => "/".to_string(),
            TokenKind::Percent => "%".to_string(),
            TokenKind::Bang => "!".to_string(),
            TokenKind::BangEq => "!=".to_string(),
            TokenKind::BangEqEq => "!==".to_string(),
            TokenKind::Assign => "=".to_string(),
            TokenKind::EqEq => "==".to_string(),
            TokenKind::EqEqEq => "===".to_string(),
            TokenKind::Lt => "<".to_string(),
            TokenKind::Le => "<=".to_string(),
            TokenKind::Gt => ">".to_string(),
            TokenKind::Ge => ">=".to_string(),
            TokenKind::AndAnd => "&&".to_string(),
            TokenKind::OrOr => "||".to_string(),
            TokenKind::LParen => "(".to_string(),
            TokenKind::RParen => ")".to_string(),
            TokenKind::LBracket => "[".to_string(),
            TokenKind::RBracket => "]".to_string(),
            TokenKind::LBrace => "{".to_string(),
            TokenKind::RBrace => "}".to_string(),
            TokenKind::Comma => ",".to_string(),
            TokenKind::Semi => ";".to_string(),
            TokenKind::Colon => ":".to_string(),
            TokenKind::Dot => ".".to_string(),
            TokenKind::Question => "?".to_string(),
            TokenKind::Arrow => "=>".to_string(),
            TokenKind::Eof => "end of script".to_string(),
        }
    }
}

/// A token plus its source position (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub col: u32,
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

/// Tokenize a script source string.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ScriptError> {
    let mut lexer = Lexer {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
    };
    lexer.run()
}

impl Lexer {
    fn run(&mut self) -> Result<Vec<Token>, ScriptError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let line = self.line;
            let col = self.col;
            let Some(c) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    col,
                });
                return Ok(tokens);
            };

            let kind = if c.is_ascii_digit() {
                self.number()?
            } else if c == '"' || c == '\'' {
                self.string(c)?
            } else if c.is_alphabetic() || c == '_' || c == '$' {
                self.ident()
            } else {
                self.punct()?
            };

            tokens.push(Token { kind, line, col });
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), ScriptError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                            None => {
                                return Err(ScriptError::Syntax(format!(
                                    "unterminated comment (line {}, column {})",
                                    line, col
                                )));
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn number(&mut self) -> Result<TokenKind, ScriptError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if matches!(self.peek_at(lookahead), Some(c) if c.is_ascii_digit()) {
                for _ in 0..=lookahead {
                    self.bump();
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| ScriptError::Syntax(format!("invalid number literal '{}'", text)))
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, ScriptError> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(TokenKind::Str(value)),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some('\\') => value.push('\\'),
                    Some('\'') => value.push('\''),
                    Some('"') => value.push('"'),
                    Some('`') => value.push('`'),
                    Some('\n') => {}
                    Some(other) => value.push(other),
                    None => {
                        return Err(ScriptError::Syntax(format!(
                            "unterminated string literal (line {}, column {})",
                            line, col
                        )));
                    }
                },
                Some('\n') | None => {
                    return Err(ScriptError::Syntax(format!(
                        "unterminated string literal (line {}, column {})",
                        line, col
                    )));
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn ident(&mut self) -> TokenKind {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '$') {
            self.bump();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.as_str() {
            "const" => TokenKind::Const,
            "let" => TokenKind::Let,
            "var" => TokenKind::Var,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "undefined" => TokenKind::Undefined,
            "typeof" => TokenKind::Typeof,
            _ => TokenKind::Ident(text),
        }
    }

    fn punct(&mut self) -> Result<TokenKind, ScriptError> {
        let (line, col) = (self.line, self.col);
        let c = self.bump().unwrap_or('\0');
        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            ':' => TokenKind::Colon,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            '!' => {
                if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.peek() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else if self.peek() == Some('=') {
                    self.bump();
                    if self.peek() == Some('=') {
                        self.bump();
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.peek() == Some('&') {
                    self.bump();
                    TokenKind::AndAnd
                } else {
                    return Err(ScriptError::Syntax(format!(
                        "unexpected character '&' (line {}, column {})",
                        line, col
                    )));
                }
            }
            '|' => {
                if self.peek() == Some('|') {
                    self.bump();
                    TokenKind::OrOr
                } else {
                    return Err(ScriptError::Syntax(format!(
                        "unexpected character '|' (line {}, column {})",
                        line, col
                    )));
                }
            }
            other => {
                return Err(ScriptError::Syntax(format!(
                    "unexpected character '{}' (line {}, column {})",
                    other, line, col
                )));
            }
        };
        Ok(kind)
    }
}
