use std::fmt;

use crate::lang::ast::Node;
use crate::lang::functions::FunctionTable;
use crate::lang::strings::StringTable;
use crate::lang::variables::VariableTable;

/// The three symbol tables filled in by semantic analysis
#[derive(Debug)]
pub struct Tables {
    pub strings: StringTable,
    pub variables: VariableTable,
    pub functions: FunctionTable,
}

impl Tables {
    pub fn new() -> Self {
        Self {
            strings: StringTable::new(),
            variables: VariableTable::new(),
            functions: FunctionTable::new(),
        }
    }
}

impl fmt::Display for Tables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.strings)?;
        writeln!(f)?;
        write!(f, "{}", self.variables)?;
        writeln!(f)?;
        write!(f, "{}", self.functions)
    }
}

/// A resolved program, ready to run
#[derive(Debug)]
pub struct Program {
    pub tables: Tables,
    pub ast: Node,
}
