use std::fmt;
use std::iter::Peekable;
use std::slice::Iter;

use tracing::debug;

use crate::error::CompileError;
use crate::lex::{Number, Token, TokenKind};
use crate::symbols::VarType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    /// Binding power: `*` and `/` bind tighter than `+` and `-`. All four are
    /// left-associative.
    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
        }
    }

    fn from_token(kind: &TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Plus => Some(Self::Add),
            TokenKind::Minus => Some(Self::Sub),
            TokenKind::Times => Some(Self::Mul),
            TokenKind::Divide => Some(Self::Div),
            _ => None,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Lt,
    Gt,
}

impl fmt::Display for RelOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "==",
            Self::Lt => "<",
            Self::Gt => ">",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(Number),
    Var(String),
    Binary(BinOp),
}

/// An expression in postfix order, so `a + b * c` is stored as `a b c * +`.
/// Only the parser builds these, so every `Binary` node has two operands
/// before it and the whole sequence reduces to exactly one value.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    postfix: Vec<Node>,
}

impl Expr {
    pub fn nodes(&self) -> &[Node] {
        &self.postfix
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Expr,
    pub op: RelOp,
    pub rhs: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl {
        ty: VarType,
        name: String,
    },
    Assign {
        name: String,
        value: Expr,
    },
    If {
        cond: Condition,
        then_body: Vec<Stmt>,
        else_body: Option<Vec<Stmt>>,
    },
    While {
        cond: Condition,
        body: Vec<Stmt>,
    },
}

/// A fully parsed piece of a compound statement that a syntax error cut short.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Condition(Condition),
    Stmt(Stmt),
}

#[derive(Debug, Default, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
    /// Completed parts of the statement interrupted by a syntax error, in
    /// source order. Empty when parsing succeeded.
    pub fragments: Vec<Fragment>,
}

pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy)]
enum Pending {
    Op(BinOp),
    Open,
}

struct Parser<'a> {
    it: Peekable<Iter<'a, Token>>,
    depth: usize,
    // filled innermost first while an error unwinds, reversed at the end
    salvaged: Vec<Fragment>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            it: tokens.iter().peekable(),
            depth: 0,
            salvaged: vec![],
        }
    }

    fn make_program(mut self) -> (Program, Option<CompileError>) {
        let mut program = Program::default();

        while self.peek().is_some() {
            match self.stmt() {
                Ok(stmt) => program.stmts.push(stmt),
                Err(e) => {
                    program.fragments = std::mem::take(&mut self.salvaged);
                    program.fragments.reverse();
                    debug!(
                        error = %e,
                        parsed = program.stmts.len(),
                        fragments = program.fragments.len(),
                        "parse stopped"
                    );
                    return (program, Some(e));
                }
            }
        }

        (program, None)
    }

    /// Keeps `completed` (given in source order) for lowering after an error.
    fn salvage<I>(&mut self, completed: I)
    where
        I: IntoIterator<Item = Fragment>,
        I::IntoIter: DoubleEndedIterator,
    {
        self.salvaged.extend(completed.into_iter().rev());
    }

    fn consume(&mut self) -> Option<&'a Token> {
        self.it.next()
    }

    fn peek(&mut self) -> Option<&'a TokenKind> {
        self.it.peek().map(|&t| &t.kind)
    }

    fn consume_or_eof(&mut self) -> Result<&'a Token, CompileError> {
        self.consume().ok_or(CompileError::UnexpectedEof)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'a Token, CompileError> {
        let token = self.consume_or_eof()?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(unexpected(token))
        }
    }

    fn ident(&mut self) -> Result<String, CompileError> {
        let token = self.consume_or_eof()?;
        match &token.kind {
            TokenKind::Id(name) => Ok(name.clone()),
            _ => Err(unexpected(token)),
        }
    }

    fn stmt(&mut self) -> Result<Stmt, CompileError> {
        let token = self.consume_or_eof()?;

        match &token.kind {
            TokenKind::Int => self.decl(VarType::Int),
            TokenKind::Float => self.decl(VarType::Float),
            TokenKind::Id(name) => self.assign(name.clone()),
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            _ => Err(unexpected(token)),
        }
    }

    fn decl(&mut self, ty: VarType) -> Result<Stmt, CompileError> {
        let name = self.ident()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Decl { ty, name })
    }

    fn assign(&mut self, name: String) -> Result<Stmt, CompileError> {
        self.expect(TokenKind::Assign)?;
        let value = self.expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::Assign { name, value })
    }

    fn if_stmt(&mut self) -> Result<Stmt, CompileError> {
        let cond = self.paren_condition()?;

        let then_body = match self.block() {
            Ok(body) => body,
            Err(e) => {
                self.salvage([Fragment::Condition(cond)]);
                return Err(e);
            }
        };

        let else_body = if matches!(self.peek(), Some(TokenKind::Else)) {
            self.consume();
            match self.block() {
                Ok(body) => Some(body),
                Err(e) => {
                    let completed: Vec<_> = std::iter::once(Fragment::Condition(cond))
                        .chain(then_body.into_iter().map(Fragment::Stmt))
                        .collect();
                    self.salvage(completed);
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_body,
            else_body,
        })
    }

    fn while_stmt(&mut self) -> Result<Stmt, CompileError> {
        let cond = self.paren_condition()?;

        match self.block() {
            Ok(body) => Ok(Stmt::While { cond, body }),
            Err(e) => {
                self.salvage([Fragment::Condition(cond)]);
                Err(e)
            }
        }
    }

    fn block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let open = self.expect(TokenKind::LBrace)?;
        if self.depth == MAX_NESTING {
            return Err(CompileError::NestedTooDeep {
                limit: MAX_NESTING,
                line: open.line,
            });
        }
        self.depth += 1;

        let mut stmts = vec![];
        while !matches!(self.peek(), Some(TokenKind::RBrace)) {
            match self.stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(e) => {
                    self.salvage(stmts.into_iter().map(Fragment::Stmt));
                    return Err(e);
                }
            }
        }

        self.consume();
        self.depth -= 1;
        Ok(stmts)
    }

    fn paren_condition(&mut self) -> Result<Condition, CompileError> {
        self.expect(TokenKind::LParen)?;
        let cond = self.condition()?;
        self.expect(TokenKind::RParen)?;
        Ok(cond)
    }

    fn condition(&mut self) -> Result<Condition, CompileError> {
        let lhs = self.expr()?;

        let token = self.consume_or_eof()?;
        let op = match token.kind {
            TokenKind::Eq => RelOp::Eq,
            TokenKind::Lt => RelOp::Lt,
            TokenKind::Gt => RelOp::Gt,
            _ => return Err(unexpected(token)),
        };

        let rhs = self.expr()?;
        Ok(Condition { lhs, op, rhs })
    }

    /// Shunting-yard over operands, binary operators and parentheses. The
    /// expression ends at the first token that cannot continue it; a `)` with
    /// no matching `(` is left for the caller.
    fn expr(&mut self) -> Result<Expr, CompileError> {
        let mut postfix = vec![];
        let mut pending: Vec<Pending> = vec![];
        let mut open = 0usize;

        loop {
            let token = self.consume_or_eof()?;
            match &token.kind {
                TokenKind::Number(n) => postfix.push(Node::Number(*n)),
                TokenKind::Id(name) => postfix.push(Node::Var(name.clone())),
                TokenKind::LParen => {
                    pending.push(Pending::Open);
                    open += 1;
                    continue;
                }
                _ => return Err(unexpected(token)),
            }

            while open > 0 && matches!(self.peek(), Some(TokenKind::RParen)) {
                self.consume();
                while let Some(Pending::Op(op)) = pending.pop() {
                    postfix.push(Node::Binary(op));
                }
                open -= 1;
            }

            match self.peek().and_then(BinOp::from_token) {
                Some(op) => {
                    self.consume();
                    while let Some(&Pending::Op(top)) = pending.last() {
                        if top.precedence() < op.precedence() {
                            break;
                        }
                        postfix.push(Node::Binary(top));
                        pending.pop();
                    }
                    pending.push(Pending::Op(op));
                }
                // an open parenthesis is still waiting for its `)`
                None if open > 0 => return Err(unexpected(self.consume_or_eof()?)),
                None => break,
            }
        }

        while let Some(Pending::Op(op)) = pending.pop() {
            postfix.push(Node::Binary(op));
        }

        Ok(Expr { postfix })
    }
}

fn unexpected(token: &Token) -> CompileError {
    CompileError::Syntax {
        near: token.kind.to_string(),
    }
}

/// Parses until the token stream is exhausted or the first syntax error. The
/// returned program holds every top-level statement completed before the
/// error, plus the completed fragments of the statement it interrupted.
pub fn parse(tokens: &[Token]) -> (Program, Option<CompileError>) {
    Parser::new(tokens).make_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex::tokenize;

    fn parse_src(source: &str) -> (Program, Option<CompileError>) {
        let lexed = tokenize(source);
        assert!(lexed.errors.is_empty());
        parse(&lexed.tokens)
    }

    fn single(source: &str) -> Stmt {
        let (mut program, err) = parse_src(source);
        assert_eq!(err, None);
        program.stmts.remove(0)
    }

    fn value(source: &str) -> Expr {
        match single(&format!("x = {source};")) {
            Stmt::Assign { value, .. } => value,
            other => panic!("expected assignment, got {other:?}"),
        }
    }

    fn postfix(source: &str) -> String {
        value(source)
            .nodes()
            .iter()
            .map(|node| match node {
                Node::Number(n) => n.to_string(),
                Node::Var(name) => name.clone(),
                Node::Binary(op) => op.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn parse_decl() {
        assert_eq!(
            single("int x;"),
            Stmt::Decl {
                ty: VarType::Int,
                name: "x".into()
            }
        );
        assert_eq!(
            single("float y;"),
            Stmt::Decl {
                ty: VarType::Float,
                name: "y".into()
            }
        );
    }

    #[test]
    fn parse_atoms() {
        assert_eq!(value("5").nodes(), [Node::Number(Number::Int(5))]);
        assert_eq!(value("2.5").nodes(), [Node::Number(Number::Float(2.5))]);
        assert_eq!(postfix("y"), "y");
        assert_eq!(postfix("((y))"), "y");
    }

    #[test]
    fn mul_binds_tighter() {
        assert_eq!(postfix("a + b * c"), "a b c * +");
        assert_eq!(postfix("a / b - c"), "a b / c -");
        assert_eq!(postfix("(a + b) * c"), "a b + c *");
        assert_eq!(postfix("a * (b - (c + 1)) / 2"), "a b c 1 + - * 2 /");
    }

    #[test]
    fn left_associative() {
        assert_eq!(postfix("a - b - c"), "a b - c -");
        assert_eq!(postfix("a / b * c"), "a b / c *");
        assert_eq!(postfix("a + b * c - d"), "a b c * + d -");
    }

    #[test]
    fn long_and_deep_expressions() {
        let terms = vec!["1"; 20_000].join(" + ");
        assert_eq!(value(&terms).nodes().len(), 2 * 20_000 - 1);

        let depth = 10_000;
        let nested = format!("{}y{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(postfix(&nested), "y");
    }

    #[test]
    fn parse_if_else() {
        let stmt = single("if (a == 1) { b = 2; } else { b = 3; c = 4; }");
        let Stmt::If {
            cond,
            then_body,
            else_body,
        } = stmt
        else {
            panic!("expected if");
        };

        assert_eq!(cond.op, RelOp::Eq);
        assert_eq!(cond.lhs.nodes(), [Node::Var("a".into())]);
        assert_eq!(then_body.len(), 1);
        assert_eq!(else_body.map(|b| b.len()), Some(2));
    }

    #[test]
    fn parse_nested_while() {
        let stmt = single("while (i < 3) { if (i > 1) { i = 0; } i = i + 1; }");
        let Stmt::While { cond, body } = stmt else {
            panic!("expected while");
        };

        assert_eq!(cond.op, RelOp::Lt);
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], Stmt::If { else_body: None, .. }));
    }

    #[test]
    fn empty_program_and_blocks() {
        assert_eq!(parse_src(""), (Program::default(), None));
        assert_eq!(parse_src("while (a < 1) { }").0.stmts.len(), 1);
    }

    #[test]
    fn syntax_error_keeps_prefix() {
        let (program, err) = parse_src("int a; a = 1; a = ; b = 2;");
        assert_eq!(program.stmts.len(), 2);
        assert_eq!(err, Some(CompileError::Syntax { near: ";".into() }));
    }

    #[test]
    fn error_in_block_keeps_completed_parts() {
        let (program, err) = parse_src("int x; while (x < 3) { int x; y = 1; ");
        assert_eq!(err, Some(CompileError::UnexpectedEof));
        assert_eq!(program.stmts.len(), 1);

        assert_eq!(program.fragments.len(), 3);
        assert!(matches!(&program.fragments[0], Fragment::Condition(c) if c.op == RelOp::Lt));
        assert!(matches!(&program.fragments[1], Fragment::Stmt(Stmt::Decl { .. })));
        assert!(matches!(&program.fragments[2], Fragment::Stmt(Stmt::Assign { .. })));
    }

    #[test]
    fn fragments_follow_source_order() {
        let src = "if (a == 1) { b = 1; } else { c = 2; while (d > 0) { e = 3; f = ; } }";
        let (program, err) = parse_src(src);
        assert_eq!(err, Some(CompileError::Syntax { near: ";".into() }));

        let order: Vec<String> = program
            .fragments
            .iter()
            .map(|f| match f {
                Fragment::Condition(c) => format!("cond {}", c.op),
                Fragment::Stmt(Stmt::Assign { name, .. }) => name.clone(),
                Fragment::Stmt(other) => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(order, vec!["cond ==", "b", "c", "cond >", "e"]);
    }

    #[test]
    fn completed_program_has_no_fragments() {
        let (program, err) = parse_src("int a; if (a < 1) { a = 1; } else { a = 2; }");
        assert_eq!(err, None);
        assert!(program.fragments.is_empty());
    }

    #[test]
    fn nesting_limit() {
        let nest = |n: usize| format!("{}{}", "while (a < 1) { ".repeat(n), "} ".repeat(n));

        assert_eq!(parse_src(&nest(MAX_NESTING)).1, None);
        assert_eq!(
            parse_src(&nest(MAX_NESTING + 1)).1,
            Some(CompileError::NestedTooDeep {
                limit: MAX_NESTING,
                line: 1
            })
        );
    }

    #[test]
    fn fails_on_bad_input() {
        let err = |src: &str| parse_src(src).1;

        assert_eq!(err("int 5;"), Some(CompileError::Syntax { near: "5".into() }));
        assert_eq!(err("x = 1"), Some(CompileError::UnexpectedEof));
        assert_eq!(err("if (a < 1) { a = 1;"), Some(CompileError::UnexpectedEof));
        assert_eq!(err("else { }"), Some(CompileError::Syntax { near: "else".into() }));
        // relational operators only appear in conditions
        assert_eq!(err("x = a < b;"), Some(CompileError::Syntax { near: "<".into() }));
        // conditions need exactly one comparison
        assert_eq!(err("if (a) { }"), Some(CompileError::Syntax { near: ")".into() }));
        assert_eq!(err("x = 1.5 2;"), Some(CompileError::Syntax { near: "2".into() }));
        assert_eq!(err("x = (a + 1;"), Some(CompileError::Syntax { near: ";".into() }));
        assert_eq!(err("x = (a;"), Some(CompileError::Syntax { near: ";".into() }));
        assert_eq!(err("x = a +;"), Some(CompileError::Syntax { near: ";".into() }));
        assert_eq!(err("x = ((a)"), Some(CompileError::UnexpectedEof));
    }
}
