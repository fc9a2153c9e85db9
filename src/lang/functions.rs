use std::fmt;

use anyhow::{anyhow, bail, Result};

use crate::lang::types::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub line: u32,
    pub arity: usize,
    pub ty: Type,
    /// Position of the declaration inside the program's function list. Set by the linking pass.
    pub decl: Option<usize>,
}

/// Table of declared functions
///
/// Lookup is by name only; there is no overloading.
#[derive(Debug, Default)]
pub struct FunctionTable {
    inner: Vec<Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fresh function
    ///
    /// No duplicate check is made, so call `lookup_func` first
    pub fn add_func(&mut self, name: &str, line: u32, arity: usize, ty: Type) -> usize {
        self.inner.push(Function {
            name: name.to_string(),
            line,
            arity,
            ty,
            decl: None,
        });

        self.inner.len() - 1
    }

    pub fn lookup_func(&self, name: &str) -> Option<usize> {
        self.inner.iter().position(|func| func.name == name)
    }

    pub fn get(&self, idx: usize) -> Result<&Function> {
        self.inner
            .get(idx)
            .ok_or_else(|| anyhow!("Unknown function index: {}", idx))
    }

    /// Bind a function to its declaration in the function list
    ///
    /// A function is bound once. Binding it again to the same declaration is a no-op so a program
    /// can be linked on every run.
    pub fn bind_decl(&mut self, idx: usize, decl: usize) -> Result<()> {
        let func = self
            .inner
            .get_mut(idx)
            .ok_or_else(|| anyhow!("Unknown function index: {}", idx))?;

        match func.decl {
            Some(existing) if existing != decl => bail!(
                "Function '{}' already bound to declaration {}",
                func.name,
                existing
            ),
            _ => func.decl = Some(decl),
        }

        Ok(())
    }

    /// Declaration position of a linked function
    pub fn decl(&self, idx: usize) -> Result<usize> {
        let func = self.get(idx)?;
        func.decl
            .ok_or_else(|| anyhow!("Function '{}' has no linked declaration", func.name))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Display for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Functions table:")?;
        for (i, func) in self.inner.iter().enumerate() {
            writeln!(
                f,
                "Entry {} -- type: {}, name: {}, line: {}, arity: {}",
                i, func.ty, func.name, func.line, func.arity
            )?;
        }

        Ok(())
    }
}

#[test]
fn test_lookup_first_match() {
    let mut ft = FunctionTable::new();
    let f = ft.add_func("f", 1, 1, Type::Int);
    let main = ft.add_func("main", 5, 0, Type::Void);
    let dup = ft.add_func("f", 9, 2, Type::Void);

    assert_eq!(ft.lookup_func("f"), Some(f));
    assert_eq!(ft.lookup_func("main"), Some(main));
    assert_eq!(ft.lookup_func("g"), None);
    assert_ne!(f, dup);
    assert_eq!(ft.len(), 3);
}

#[test]
fn test_bind_decl() {
    let mut ft = FunctionTable::new();
    let f = ft.add_func("f", 1, 0, Type::Void);

    assert!(ft.decl(f).is_err());
    ft.bind_decl(f, 3).unwrap();
    assert_eq!(ft.decl(f).unwrap(), 3);

    // Relinking the same program is fine, pointing elsewhere is not
    ft.bind_decl(f, 3).unwrap();
    assert!(ft.bind_decl(f, 4).is_err());
    assert!(ft.bind_decl(7, 0).is_err());
}

#[test]
fn test_display() {
    let mut ft = FunctionTable::new();
    ft.add_func("main", 2, 0, Type::Void);

    assert_eq!(
        ft.to_string(),
        "Functions table:\nEntry 0 -- type: void, name: main, line: 2, arity: 0\n"
    );
}
