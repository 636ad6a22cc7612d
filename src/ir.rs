use std::fmt;

use tracing::{debug, trace};

use crate::error::CompileError;
use crate::lex::Number;
use crate::parse::{BinOp, Condition, Expr, Fragment, Node, Program, RelOp, Stmt};
use crate::symbols::SymbolTable;

/// Order in which control-flow scaffolding is emitted relative to the bodies
/// it surrounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Emission {
    /// Statement bodies first, then the labels and branches of the enclosing
    /// `if`/`while`, as a bottom-up parser would emit them on reduction.
    #[default]
    Reduction,
    /// Top-down program order, with labels reserved before the bodies are
    /// lowered. The output reads as correct control flow.
    Program,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    Var(String),
    Temp(usize),
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "{name}"),
            Self::Temp(n) => write!(f, "t{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Place(Place),
    Number(Number),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Place(p) => write!(f, "{p}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(pub usize);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    Copy(Operand),
    Binary {
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
}

impl fmt::Display for Rhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Copy(src) => write!(f, "{src}"),
            Self::Binary { op, lhs, rhs } => write!(f, "{lhs} {op} {rhs}"),
        }
    }
}

/// A lowered condition: `lhs op rhs` over already computed operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Test {
    pub lhs: Operand,
    pub op: RelOp,
    pub rhs: Operand,
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Assign { dst: Place, rhs: Rhs },
    IfNotGoto { test: Test, target: Label },
    Goto(Label),
    Label(Label),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assign { dst, rhs } => write!(f, "{dst} = {rhs}"),
            Self::IfNotGoto { test, target } => write!(f, "if not {test} goto {target}"),
            Self::Goto(target) => write!(f, "goto {target}"),
            Self::Label(label) => write!(f, "{label}:"),
        }
    }
}

#[derive(Debug, Default)]
pub struct Generated {
    pub code: Vec<Instruction>,
    pub symbols: SymbolTable,
    pub errors: Vec<CompileError>,
}

/// One instruction per line, in emission order.
pub fn render(code: &[Instruction]) -> String {
    code.iter()
        .map(Instruction::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Per-run state. Temporaries and labels share one counter, so their numbers
/// interleave in allocation order.
struct Generator {
    emission: Emission,
    counter: usize,
    out: Generated,
}

impl Generator {
    fn new(emission: Emission) -> Self {
        Self {
            emission,
            counter: 0,
            out: Generated::default(),
        }
    }

    fn finish(self) -> Generated {
        debug!(
            instructions = self.out.code.len(),
            symbols = self.out.symbols.len(),
            errors = self.out.errors.len(),
            "generated intermediate code"
        );
        self.out
    }

    fn next(&mut self) -> usize {
        self.counter += 1;
        self.counter
    }

    fn new_temp(&mut self) -> Place {
        Place::Temp(self.next())
    }

    fn new_label(&mut self) -> Label {
        Label(self.next())
    }

    fn emit(&mut self, ins: Instruction) {
        trace!("{ins}");
        self.out.code.push(ins);
    }

    fn check_declared(&mut self, name: &str) {
        if self.out.symbols.lookup(name).is_none() {
            self.out.errors.push(CompileError::NotDeclared {
                name: name.to_owned(),
            });
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Decl { ty, name } => {
                if let Err(e) = self.out.symbols.declare(name, *ty) {
                    self.out.errors.push(e);
                }
            }
            Stmt::Assign { name, value } => {
                let src = self.expr(value);
                self.check_declared(name);
                self.emit(Instruction::Assign {
                    dst: Place::Var(name.clone()),
                    rhs: Rhs::Copy(src),
                });
            }
            Stmt::If {
                cond,
                then_body,
                else_body,
            } => match self.emission {
                Emission::Reduction => self.if_reduction(cond, then_body, else_body.as_deref()),
                Emission::Program => self.if_program(cond, then_body, else_body.as_deref()),
            },
            Stmt::While { cond, body } => match self.emission {
                Emission::Reduction => self.while_reduction(cond, body),
                Emission::Program => self.while_program(cond, body),
            },
        }
    }

    fn if_reduction(&mut self, cond: &Condition, then_body: &[Stmt], else_body: Option<&[Stmt]>) {
        let test = self.condition(cond);
        self.stmts(then_body);

        match else_body {
            None => {
                let end = self.new_label();
                self.emit(Instruction::IfNotGoto { test, target: end });
                self.emit(Instruction::Label(end));
            }
            Some(else_body) => {
                self.stmts(else_body);

                let else_label = self.new_label();
                let end = self.new_label();
                self.emit(Instruction::IfNotGoto {
                    test,
                    target: else_label,
                });
                self.emit(Instruction::Goto(end));
                self.emit(Instruction::Label(else_label));
                self.emit(Instruction::Label(end));
            }
        }
    }

    fn if_program(&mut self, cond: &Condition, then_body: &[Stmt], else_body: Option<&[Stmt]>) {
        match else_body {
            None => {
                let end = self.new_label();
                let test = self.condition(cond);
                self.emit(Instruction::IfNotGoto { test, target: end });
                self.stmts(then_body);
                self.emit(Instruction::Label(end));
            }
            Some(else_body) => {
                let else_label = self.new_label();
                let end = self.new_label();
                let test = self.condition(cond);
                self.emit(Instruction::IfNotGoto {
                    test,
                    target: else_label,
                });
                self.stmts(then_body);
                self.emit(Instruction::Goto(end));
                self.emit(Instruction::Label(else_label));
                self.stmts(else_body);
                self.emit(Instruction::Label(end));
            }
        }
    }

    fn while_reduction(&mut self, cond: &Condition, body: &[Stmt]) {
        let test = self.condition(cond);
        self.stmts(body);

        let start = self.new_label();
        let end = self.new_label();
        self.emit(Instruction::Label(start));
        self.emit(Instruction::IfNotGoto { test, target: end });
        self.emit(Instruction::Goto(start));
        self.emit(Instruction::Label(end));
    }

    fn while_program(&mut self, cond: &Condition, body: &[Stmt]) {
        let start = self.new_label();
        let end = self.new_label();

        // condition temps are recomputed on every iteration
        self.emit(Instruction::Label(start));
        let test = self.condition(cond);
        self.emit(Instruction::IfNotGoto { test, target: end });
        self.stmts(body);
        self.emit(Instruction::Goto(start));
        self.emit(Instruction::Label(end));
    }

    fn condition(&mut self, cond: &Condition) -> Test {
        let lhs = self.expr(&cond.lhs);
        let rhs = self.expr(&cond.rhs);
        Test {
            lhs,
            op: cond.op,
            rhs,
        }
    }

    fn expr(&mut self, expr: &Expr) -> Operand {
        let mut operands = vec![];

        for node in expr.nodes() {
            let operand = match node {
                Node::Number(n) => Operand::Number(*n),
                Node::Var(name) => {
                    self.check_declared(name);
                    Operand::Place(Place::Var(name.clone()))
                }
                Node::Binary(op) => {
                    let (Some(rhs), Some(lhs)) = (operands.pop(), operands.pop()) else {
                        unreachable!("binary node without two operands");
                    };
                    let dst = self.new_temp();
                    self.emit(Instruction::Assign {
                        dst: dst.clone(),
                        rhs: Rhs::Binary { op: *op, lhs, rhs },
                    });
                    Operand::Place(dst)
                }
            };
            operands.push(operand);
        }

        match (operands.pop(), operands.is_empty()) {
            (Some(value), true) => value,
            _ => unreachable!("expression must reduce to one value"),
        }
    }

    /// Lowers what was completed of a statement cut short by a syntax error.
    fn fragments(&mut self, fragments: &[Fragment]) {
        for fragment in fragments {
            match fragment {
                Fragment::Condition(cond) => {
                    self.condition(cond);
                }
                Fragment::Stmt(stmt) => self.stmt(stmt),
            }
        }
    }
}

/// Lowers `program` into three-address code with a fresh symbol table and
/// counter. Semantic errors are recorded and never suppress emission.
pub fn generate(program: &Program, emission: Emission) -> Generated {
    let mut generator = Generator::new(emission);
    generator.stmts(&program.stmts);
    generator.fragments(&program.fragments);
    generator.finish()
}
