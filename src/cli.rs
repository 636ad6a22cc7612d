use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::{Compilation, Emission, Options};

#[derive(Parser, Debug)]
#[command(name = "minic")]
#[command(about = "Translates a tiny imperative language to three-address code and assembly")]
pub struct Args {
    /// Path to the source file; read from stdin when omitted
    pub file: Option<PathBuf>,

    /// Sections to print. Repeatable; defaults to all of them
    #[arg(long, value_enum)]
    pub emit: Vec<Emit>,

    /// Emission order of the intermediate code
    #[arg(long, value_enum, default_value_t = Order::Reduction)]
    pub order: Order,

    /// Render tokens and symbols as tables
    #[arg(long)]
    pub table: bool,

    /// Log more; -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Emit {
    Tokens,
    Symbols,
    Ir,
    Asm,
    Errors,
    All,
}

impl Emit {
    fn sections(self) -> &'static [Section] {
        match self {
            Self::Tokens => &[Section::Tokens],
            Self::Symbols => &[Section::Symbols],
            Self::Ir => &[Section::Ir],
            Self::Asm => &[Section::Asm],
            Self::Errors => &[Section::Errors],
            Self::All => &Section::ORDERED,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Section {
    Tokens,
    Symbols,
    Ir,
    Asm,
    Errors,
}

impl Section {
    const ORDERED: [Section; 5] = [
        Section::Tokens,
        Section::Symbols,
        Section::Ir,
        Section::Asm,
        Section::Errors,
    ];

    fn title(self) -> &'static str {
        match self {
            Self::Tokens => "tokens",
            Self::Symbols => "symbol table",
            Self::Ir => "intermediate code",
            Self::Asm => "assembly",
            Self::Errors => "errors",
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Order {
    /// Bodies before their control-flow scaffolding
    Reduction,
    /// Top-down program order
    Program,
}

impl From<Order> for Emission {
    fn from(order: Order) -> Self {
        match order {
            Order::Reduction => Emission::Reduction,
            Order::Program => Emission::Program,
        }
    }
}

#[derive(Tabled)]
struct TokenRow {
    kind: &'static str,
    value: String,
    line: usize,
}

#[derive(Tabled)]
struct SymbolRow {
    variable: String,
    #[tabled(rename = "type")]
    ty: String,
}

fn read_source(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("failed to read stdin")?;
            Ok(source)
        }
    }
}

fn token_table(compilation: &Compilation) -> String {
    let rows = compilation.tokens().iter().map(|t| TokenRow {
        kind: t.kind.name(),
        value: t.kind.to_string(),
        line: t.line,
    });
    Table::new(rows).with(Style::sharp()).to_string()
}

fn symbol_table(compilation: &Compilation) -> String {
    let rows = compilation.symbols().iter().map(|(name, ty)| SymbolRow {
        variable: name.to_owned(),
        ty: ty.to_string(),
    });
    Table::new(rows).with(Style::sharp()).to_string()
}

/// Renders the requested sections, each under its own header, in pipeline order.
pub fn render(compilation: &Compilation, emit: &[Emit], table: bool) -> String {
    let wanted = |s: &Section| emit.is_empty() || emit.iter().any(|e| e.sections().contains(s));

    let mut out = vec![];
    for section in Section::ORDERED.into_iter().filter(wanted) {
        let body = match section {
            Section::Tokens if table => token_table(compilation),
            Section::Tokens => compilation.render_tokens(),
            Section::Symbols if table => symbol_table(compilation),
            Section::Symbols => compilation.render_symbols(),
            Section::Ir => compilation.intermediate().to_owned(),
            Section::Asm => compilation.assembly().to_owned(),
            Section::Errors => compilation.render_errors(),
        };
        out.push(format!("--- {} ---\n{}", section.title(), body.trim_end()));
    }

    out.join("\n\n")
}

/// Compiles the selected source and prints the artifacts. Returns whether the
/// compilation reported any errors.
pub fn run(args: &Args) -> Result<bool> {
    let source = read_source(args.file.as_ref())?;

    let options = Options {
        emission: args.order.into(),
    };
    let compilation = crate::compile(&source, options);

    info!(errors = compilation.errors().count(), "compilation finished");

    println!("{}", render(&compilation, &args.emit, args.table));

    Ok(compilation.has_errors())
}
