use std::fmt;

use anyhow::{anyhow, ensure, Result};

/// `size` of a scalar variable
pub const SCALAR: i32 = 0;
/// `size` of an array reference parameter
pub const ARRAY_REF: i32 = -1;
/// Address of a reference parameter that has not been bound by a call yet
pub const UNBOUND: i32 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub line: u32,
    pub scope: i32,
    /// `SCALAR`, `ARRAY_REF`, or the length of an array
    pub size: i32,
    pub address: i32,
}

impl Variable {
    pub fn is_scalar(&self) -> bool {
        self.size == SCALAR
    }

    pub fn is_reference(&self) -> bool {
        self.size == ARRAY_REF
    }

    /// Number of memory cells owned by this variable
    pub fn cells(&self) -> usize {
        match self.size {
            SCALAR => 1,
            n if n > 0 => n as usize,
            _ => 0,
        }
    }
}

/// Table of declared variables
///
/// Every variable gets a fixed address in the flat memory when it is added. Addresses come from
/// a counter that only ever grows: scalars take one cell, arrays take one cell per element and
/// reference parameters take nothing until a call binds them.
#[derive(Debug, Default)]
pub struct VariableTable {
    inner: Vec<Variable>,
    next_address: i32,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fresh variable
    ///
    /// No duplicate check is made, so call `lookup_var` first. A second entry with the same name
    /// and scope is never found by `lookup_var`.
    pub fn add_var(&mut self, name: &str, line: u32, scope: i32, size: i32) -> Result<usize> {
        ensure!(size >= ARRAY_REF, "Invalid size {} for variable '{}'", size, name);

        let address = if size == ARRAY_REF {
            UNBOUND
        } else {
            let address = self.next_address;
            self.next_address = address
                .checked_add(if size == SCALAR { 1 } else { size })
                .ok_or_else(|| anyhow!("No address left for variable '{}'", name))?;
            address
        };

        self.inner.push(Variable {
            name: name.to_string(),
            line,
            scope,
            size,
            address,
        });

        Ok(self.inner.len() - 1)
    }

    pub fn lookup_var(&self, name: &str, scope: i32) -> Option<usize> {
        self.inner
            .iter()
            .position(|var| var.name == name && var.scope == scope)
    }

    pub fn get(&self, idx: usize) -> Result<&Variable> {
        self.inner
            .get(idx)
            .ok_or_else(|| anyhow!("Unknown variable index: {}", idx))
    }

    /// Rebind the address of a variable. Calls rebind reference parameters, and framed calls move
    /// parameters and locals.
    pub fn set_address(&mut self, idx: usize, address: i32) -> Result<()> {
        let var = self
            .inner
            .get_mut(idx)
            .ok_or_else(|| anyhow!("Unknown variable index: {}", idx))?;
        var.address = address;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Total number of memory cells handed out so far
    pub fn memory_used(&self) -> usize {
        self.next_address as usize
    }
}

impl fmt::Display for VariableTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Variables table:")?;
        for (i, var) in self.inner.iter().enumerate() {
            writeln!(
                f,
                "Entry {} -- name: {}, line: {}, scope: {}, size: {}, address: {}",
                i, var.name, var.line, var.scope, var.size, var.address
            )?;
        }

        Ok(())
    }
}

#[test]
fn test_address_assignment() {
    let mut vt = VariableTable::new();
    let x = vt.add_var("x", 1, 0, SCALAR).unwrap();
    let v = vt.add_var("v", 2, 0, 3).unwrap();
    let r = vt.add_var("r", 3, 1, ARRAY_REF).unwrap();
    let y = vt.add_var("y", 4, 1, SCALAR).unwrap();

    assert_eq!(vt.get(x).unwrap().address, 0);
    assert_eq!(vt.get(v).unwrap().address, 1);
    assert_eq!(vt.get(r).unwrap().address, UNBOUND);
    assert_eq!(vt.get(y).unwrap().address, 4);
    assert_eq!(vt.memory_used(), 5);

    assert_eq!(vt.get(x).unwrap().cells(), 1);
    assert_eq!(vt.get(v).unwrap().cells(), 3);
    assert_eq!(vt.get(r).unwrap().cells(), 0);
}

#[test]
fn test_address_overflow() {
    let mut vt = VariableTable::new();
    vt.add_var("a", 1, 0, 2_000_000_000).unwrap();
    assert!(vt.add_var("b", 2, 0, 2_000_000_000).is_err());
    assert!(vt.add_var("c", 3, 0, -2).is_err());

    let ok = vt.add_var("d", 4, 0, SCALAR).unwrap();
    assert_eq!(vt.get(ok).unwrap().address, 2_000_000_000);
    assert_eq!(vt.memory_used(), 2_000_000_001);
}

#[test]
fn test_lookup_matches_scope() {
    let mut vt = VariableTable::new();
    let outer = vt.add_var("x", 1, 0, SCALAR).unwrap();
    let inner = vt.add_var("x", 5, 2, SCALAR).unwrap();

    assert_eq!(vt.lookup_var("x", 0), Some(outer));
    assert_eq!(vt.lookup_var("x", 2), Some(inner));
    assert_eq!(vt.lookup_var("x", 1), None);
    assert_eq!(vt.lookup_var("y", 0), None);
}

#[test]
fn test_duplicate_is_shadowed() {
    let mut vt = VariableTable::new();
    let first = vt.add_var("x", 1, 0, SCALAR).unwrap();
    let second = vt.add_var("x", 2, 0, SCALAR).unwrap();

    assert_ne!(first, second);
    assert_eq!(vt.lookup_var("x", 0), Some(first));
    assert_eq!(vt.len(), 2);
}

#[test]
fn test_set_address() {
    let mut vt = VariableTable::new();
    let r = vt.add_var("r", 1, 1, ARRAY_REF).unwrap();
    vt.set_address(r, 7).unwrap();

    assert_eq!(vt.get(r).unwrap().address, 7);
    assert!(vt.set_address(9, 0).is_err());
}

#[test]
fn test_display() {
    let mut vt = VariableTable::new();
    vt.add_var("v", 3, 0, 2).unwrap();

    assert_eq!(
        vt.to_string(),
        "Variables table:\nEntry 0 -- name: v, line: 3, scope: 0, size: 2, address: 0\n"
    );
}
