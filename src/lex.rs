use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use tracing::{debug, trace};

use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => fmt_float(*x, f),
        }
    }
}

/// Shortest round-trip digits. Positional for decimal exponents in `-4..16`
/// (with a trailing `.0` on whole values), otherwise `1e+20` / `1.5e-07`.
fn fmt_float(x: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("nan");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "inf" } else { "-inf" });
    }

    let sci = format!("{x:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return write!(f, "{x:?}");
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return write!(f, "{x:?}");
    };

    if (-4..16).contains(&exp) {
        // debug formatting keeps the decimal point on whole floats: 3.0, not 3
        write!(f, "{x:?}")
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        write!(f, "{mantissa}e{sign}{:02}", exp.abs())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    If,
    Else,
    While,
    Int,
    Float,
    Id(String),
    Number(Number),
    Plus,
    Minus,
    Times,
    Divide,
    Eq,
    Lt,
    Gt,
    Assign,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semicolon,
}

impl TokenKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::If => "IF",
            Self::Else => "ELSE",
            Self::While => "WHILE",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Id(_) => "ID",
            Self::Number(_) => "NUMBER",
            Self::Plus => "PLUS",
            Self::Minus => "MINUS",
            Self::Times => "TIMES",
            Self::Divide => "DIVIDE",
            Self::Eq => "EQ",
            Self::Lt => "LT",
            Self::Gt => "GT",
            Self::Assign => "ASSIGN",
            Self::LParen => "LPAREN",
            Self::RParen => "RPAREN",
            Self::LBrace => "LBRACE",
            Self::RBrace => "RBRACE",
            Self::Semicolon => "SEMICOLON",
        }
    }
}

/// Displays the literal value of the token as it appeared in the source.
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Id(name) => return write!(f, "{name}"),
            Self::Number(n) => return write!(f, "{n}"),
            Self::If => "if",
            Self::Else => "else",
            Self::While => "while",
            Self::Int => "int",
            Self::Float => "float",
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Times => "*",
            Self::Divide => "/",
            Self::Eq => "==",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Assign => "=",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::LBrace => "{",
            Self::RBrace => "}",
            Self::Semicolon => ";",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<10} {}", self.kind.name(), self.kind)
    }
}

#[derive(Debug, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub errors: Vec<CompileError>,
}

impl Lexed {
    pub fn render(&self) -> String {
        self.tokens
            .iter()
            .map(Token::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct Lexer<'a> {
    source: &'a str,
    it: Peekable<CharIndices<'a>>,
    out: Lexed,
    start: usize,
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            it: source.char_indices().peekable(),
            out: Lexed::default(),
            start: 0,
            pos: 0,
            line: 1,
        }
    }

    fn make_tokens(mut self) -> Lexed {
        while let Some(ch) = self.consume() {
            match ch {
                ' ' | '\t' | '\r' => (),
                '\n' => self.line += 1,
                '/' if matches!(self.peek(), Some('/')) => self.consume_while(|ch| *ch != '\n'),
                ch if ch.is_ascii_digit() => self.number(),
                ch if ch.is_ascii_alphabetic() || ch == '_' => self.kw_or_id(),
                '=' if matches!(self.peek(), Some('=')) => {
                    self.consume();
                    self.add_token(TokenKind::Eq);
                }
                ch => match map_symbol(ch) {
                    Some(kind) => self.add_token(kind),
                    None => self.illegal(ch),
                },
            }

            self.start = self.pos;
        }

        debug!(
            tokens = self.out.tokens.len(),
            errors = self.out.errors.len(),
            "lexed source"
        );

        self.out
    }

    fn consume(&mut self) -> Option<char> {
        let (i, ch) = self.it.next()?;
        self.pos = i + ch.len_utf8();
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.it.peek().map(|(_, ch)| *ch)
    }

    fn lexeme(&self) -> &'a str {
        &self.source[self.start..self.pos]
    }

    fn add_token(&mut self, kind: TokenKind) {
        let token = Token {
            kind,
            line: self.line,
        };
        trace!(line = token.line, "{token}");
        self.out.tokens.push(token);
    }

    fn illegal(&mut self, ch: char) {
        self.out.errors.push(CompileError::IllegalCharacter {
            ch,
            line: self.line,
        });
    }

    fn consume_while<F>(&mut self, condition: F)
    where
        F: Fn(&char) -> bool,
    {
        while let Some(ch) = self.peek() {
            if condition(&ch) {
                self.consume();
            } else {
                break;
            }
        }
    }

    fn number(&mut self) {
        self.consume_while(|ch| ch.is_ascii_digit());

        // a fraction needs at least one digit after the point
        let mut fraction = self.source[self.pos..].chars();
        let is_float = fraction.next() == Some('.')
            && fraction.next().is_some_and(|ch| ch.is_ascii_digit());

        if is_float {
            self.consume();
            self.consume_while(|ch| ch.is_ascii_digit());
        }

        let lexeme = self.lexeme();
        let number = if is_float {
            lexeme.parse::<f64>().ok().map(Number::Float)
        } else {
            lexeme.parse::<i64>().ok().map(Number::Int)
        };

        match number {
            Some(n) => self.add_token(TokenKind::Number(n)),
            None => self.out.errors.push(CompileError::InvalidNumber {
                literal: lexeme.to_owned(),
                line: self.line,
            }),
        }
    }

    fn kw_or_id(&mut self) {
        self.consume_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_');

        let lexeme = self.lexeme();
        let kind = map_kw(lexeme).unwrap_or_else(|| TokenKind::Id(lexeme.to_owned()));
        self.add_token(kind);
    }
}

fn map_kw(word: &str) -> Option<TokenKind> {
    match word {
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "while" => Some(TokenKind::While),
        "int" => Some(TokenKind::Int),
        "float" => Some(TokenKind::Float),
        _ => None,
    }
}

fn map_symbol(ch: char) -> Option<TokenKind> {
    match ch {
        '+' => Some(TokenKind::Plus),
        '-' => Some(TokenKind::Minus),
        '*' => Some(TokenKind::Times),
        '/' => Some(TokenKind::Divide),
        '<' => Some(TokenKind::Lt),
        '>' => Some(TokenKind::Gt),
        '=' => Some(TokenKind::Assign),
        '(' => Some(TokenKind::LParen),
        ')' => Some(TokenKind::RParen),
        '{' => Some(TokenKind::LBrace),
        '}' => Some(TokenKind::RBrace),
        ';' => Some(TokenKind::Semicolon),
        _ => None,
    }
}

/// Scans the whole source. Illegal characters are recorded and skipped one at
/// a time, so the returned token list always covers everything that did lex.
pub fn tokenize(source: &str) -> Lexed {
    Lexer::new(source).make_tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let lexed = tokenize(source);
        assert!(lexed.errors.is_empty(), "{:?}", lexed.errors);
        lexed.tokens.into_iter().map(|t| t.kind).collect()
    }

    fn single(source: &str) -> TokenKind {
        kinds(source).remove(0)
    }

    #[test]
    fn tokenize_kw() {
        assert_eq!(single("if"), TokenKind::If);
        assert_eq!(single("else"), TokenKind::Else);
        assert_eq!(single("while"), TokenKind::While);
        assert_eq!(single("int"), TokenKind::Int);
        assert_eq!(single("float"), TokenKind::Float);
    }

    #[test]
    fn tokenize_id() {
        assert_eq!(single("x"), TokenKind::Id("x".into()));
        assert_eq!(single("_tmp"), TokenKind::Id("_tmp".into()));
        assert_eq!(single("HasNums123"), TokenKind::Id("HasNums123".into()));
        assert_eq!(single("iffy"), TokenKind::Id("iffy".into()));
        assert_eq!(single("integer"), TokenKind::Id("integer".into()));
    }

    #[test]
    fn tokenize_num() {
        assert_eq!(single("123"), TokenKind::Number(Number::Int(123)));
        assert_eq!(single("000123"), TokenKind::Number(Number::Int(123)));
        assert_eq!(single("12.5"), TokenKind::Number(Number::Float(12.5)));
        assert_eq!(single("3.0"), TokenKind::Number(Number::Float(3.0)));
    }

    #[test]
    fn float_display() {
        let show = |x: f64| Number::Float(x).to_string();

        assert_eq!(show(3.0), "3.0");
        assert_eq!(show(2.5), "2.5");
        assert_eq!(show(0.0001), "0.0001");
        assert_eq!(show(0.00001), "1e-05");
        assert_eq!(show(1e-7), "1e-07");
        assert_eq!(show(1e15), "1000000000000000.0");
        assert_eq!(show(1e16), "1e+16");
        assert_eq!(show(1.5e20), "1.5e+20");
        assert_eq!(show(1e300), "1e+300");
        assert_eq!(show(f64::INFINITY), "inf");
    }

    #[test]
    fn huge_and_tiny_float_literals() {
        let big = format!("1{}.0", "0".repeat(20));
        assert_eq!(single(&big).to_string(), "1e+20");
        assert_eq!(single("0.0000001").to_string(), "1e-07");
    }

    #[test]
    fn trailing_point_is_not_a_fraction() {
        let lexed = tokenize("5.");
        assert_eq!(lexed.tokens[0].kind, TokenKind::Number(Number::Int(5)));
        assert_eq!(
            lexed.errors,
            vec![CompileError::IllegalCharacter { ch: '.', line: 1 }]
        );
    }

    #[test]
    fn overflowing_int_is_reported() {
        let lexed = tokenize("99999999999999999999 ;");
        assert_eq!(lexed.tokens.len(), 1);
        assert!(matches!(
            lexed.errors[0],
            CompileError::InvalidNumber { line: 1, .. }
        ));
    }

    #[test]
    fn tokenize_operators() {
        assert_eq!(
            kinds("+ - * / == < > = ( ) { } ;"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Times,
                TokenKind::Divide,
                TokenKind::Eq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Assign,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Semicolon,
            ]
        );
        assert_eq!(kinds("==="), vec![TokenKind::Eq, TokenKind::Assign]);
        assert_eq!(kinds("a==b").len(), 3);
    }

    #[test]
    fn comments_and_lines() {
        let lexed = tokenize("int a; // a = 1;\n\n  a = 2 / 1;");
        assert!(lexed.errors.is_empty());
        assert_eq!(lexed.tokens.len(), 9);
        assert_eq!(lexed.tokens[2].line, 1);
        assert_eq!(lexed.tokens[3].line, 3);
        assert_eq!(lexed.tokens[6].kind, TokenKind::Divide);
    }

    #[test]
    fn unrecognised_char_is_skipped() {
        let lexed = tokenize("x = 5 @ 2;\n#");
        assert_eq!(
            lexed.errors,
            vec![
                CompileError::IllegalCharacter { ch: '@', line: 1 },
                CompileError::IllegalCharacter { ch: '#', line: 2 },
            ]
        );
        assert_eq!(lexed.tokens.len(), 5);
        assert_eq!(lexed.tokens[3].kind, TokenKind::Number(Number::Int(2)));
    }

    #[test]
    fn non_ascii_is_illegal() {
        let lexed = tokenize("é = 1;");
        assert_eq!(
            lexed.errors,
            vec![CompileError::IllegalCharacter { ch: 'é', line: 1 }]
        );
        assert_eq!(lexed.tokens.len(), 3);
    }

    #[test]
    fn render_listing() {
        let lexed = tokenize("int x;");
        assert_eq!(
            lexed.render(),
            "INT        int\nID         x\nSEMICOLON  ;"
        );
    }
}
