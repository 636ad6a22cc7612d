pub mod assembler;
pub mod error;
pub mod ir;
pub mod lex;
pub mod parse;
pub mod symbols;

pub mod cli;

use tracing::debug;

pub use error::{CompileError, ErrorKind};
pub use ir::{Emission, Instruction};
use lex::{Lexed, Token};
use symbols::SymbolTable;

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub emission: Emission,
}

/// Result of parsing and lowering one token stream.
#[derive(Debug, Default)]
pub struct Translation {
    pub code: Vec<Instruction>,
    pub symbols: SymbolTable,
    pub errors: Vec<CompileError>,
}

/// Parses `tokens` and generates intermediate code for every statement that
/// parsed. A syntax error is reported after the semantic errors of the
/// statements preceding it.
pub fn translate(tokens: &[Token], emission: Emission) -> Translation {
    let (program, syntax_error) = parse::parse(tokens);
    let generated = ir::generate(&program, emission);

    let mut errors = generated.errors;
    errors.extend(syntax_error);

    Translation {
        code: generated.code,
        symbols: generated.symbols,
        errors,
    }
}

/// Every artifact of one compilation run. Produced even when errors were found.
#[derive(Debug)]
pub struct Compilation {
    pub lexed: Lexed,
    pub translation: Translation,
    intermediate: String,
    assembly: String,
}

impl Compilation {
    pub fn tokens(&self) -> &[Token] {
        &self.lexed.tokens
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.translation.symbols
    }

    pub fn code(&self) -> &[Instruction] {
        &self.translation.code
    }

    /// Lexical errors first, then syntax and semantic errors, each in the
    /// order they were found.
    pub fn errors(&self) -> impl Iterator<Item = &CompileError> {
        self.lexed.errors.iter().chain(&self.translation.errors)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn render_tokens(&self) -> String {
        self.lexed.render()
    }

    pub fn render_symbols(&self) -> String {
        self.translation.symbols.render()
    }

    pub fn intermediate(&self) -> &str {
        &self.intermediate
    }

    pub fn assembly(&self) -> &str {
        &self.assembly
    }

    pub fn render_errors(&self) -> String {
        self.errors()
            .map(CompileError::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn compile(source: &str, options: Options) -> Compilation {
    let lexed = lex::tokenize(source);
    let translation = translate(&lexed.tokens, options.emission);

    let intermediate = ir::render(&translation.code);
    let assembly = assembler::generate(&intermediate);

    let compilation = Compilation {
        lexed,
        translation,
        intermediate,
        assembly,
    };

    debug!(
        emission = ?options.emission,
        tokens = compilation.tokens().len(),
        instructions = compilation.code().len(),
        errors = compilation.errors().count(),
        "compiled"
    );

    compilation
}
