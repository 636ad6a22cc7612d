use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Semantic,
}

/// A single diagnostic. Every variant renders to the text shown to the user;
/// none of them stops the pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Illegal token '{ch}' at line {line}")]
    IllegalCharacter { ch: char, line: usize },

    #[error("Invalid number literal '{literal}' at line {line}")]
    InvalidNumber { literal: String, line: usize },

    #[error("Syntax error near '{near}'")]
    Syntax { near: String },

    #[error("Unexpected end of input")]
    UnexpectedEof,

    #[error("Blocks nested deeper than {limit} levels at line {line}")]
    NestedTooDeep { limit: usize, line: usize },

    #[error("Error: Variable '{name}' already declared")]
    AlreadyDeclared { name: String },

    #[error("Error: '{name}' not declared before use")]
    NotDeclared { name: String },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IllegalCharacter { .. } | Self::InvalidNumber { .. } => ErrorKind::Lexical,
            Self::Syntax { .. } | Self::UnexpectedEof | Self::NestedTooDeep { .. } => {
                ErrorKind::Syntax
            }
            Self::AlreadyDeclared { .. } | Self::NotDeclared { .. } => ErrorKind::Semantic,
        }
    }
}
