use std::collections::HashMap;
use std::fmt;

use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Int,
    Float,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
        }
    }
}

/// Single global scope. Entries keep their declaration order for rendering.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<(String, VarType)>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name`, unless it is already declared, in which case the existing
    /// entry is left untouched.
    pub fn declare(&mut self, name: &str, ty: VarType) -> Result<(), CompileError> {
        if self.index.contains_key(name) {
            return Err(CompileError::AlreadyDeclared {
                name: name.to_owned(),
            });
        }

        self.index.insert(name.to_owned(), self.entries.len());
        self.entries.push((name.to_owned(), ty));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<VarType> {
        self.index.get(name).map(|&i| self.entries[i].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, VarType)> {
        self.entries.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("Variable\tType\n---------------------\n");
        for (name, ty) in self.iter() {
            out.push_str(&format!("{name}\t\t{ty}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_lookup() {
        let mut table = SymbolTable::new();
        assert!(table.declare("x", VarType::Int).is_ok());
        assert!(table.declare("y", VarType::Float).is_ok());

        assert_eq!(table.lookup("x"), Some(VarType::Int));
        assert_eq!(table.lookup("y"), Some(VarType::Float));
        assert_eq!(table.lookup("z"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn redeclaration_keeps_first() {
        let mut table = SymbolTable::new();
        table.declare("x", VarType::Int).unwrap();

        let err = table.declare("x", VarType::Float).unwrap_err();
        assert_eq!(err, CompileError::AlreadyDeclared { name: "x".into() });
        assert_eq!(table.lookup("x"), Some(VarType::Int));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn render_in_declaration_order() {
        let mut table = SymbolTable::new();
        for name in ["zeta", "alpha", "mid"] {
            table.declare(name, VarType::Int).unwrap();
        }
        table.declare("f", VarType::Float).unwrap();

        assert_eq!(
            table.render(),
            "Variable\tType\n---------------------\n\
             zeta\t\tint\nalpha\t\tint\nmid\t\tint\nf\t\tfloat\n"
        );
    }

    #[test]
    fn render_empty() {
        assert_eq!(
            SymbolTable::new().render(),
            "Variable\tType\n---------------------\n"
        );
    }
}
