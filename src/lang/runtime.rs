//! Runtime state of one program run: the flat variable memory and the operand stack.
//!
//! Both have a fixed capacity. Unlike the C-style machines this model comes from, every access
//! is bounds checked and a violation is a fatal runtime error.

use anyhow::{anyhow, bail, Result};

pub const DEFAULT_MEMORY_SIZE: usize = 100;
pub const DEFAULT_STACK_SIZE: usize = 100;

/// Flat, address indexed integer memory
pub struct Memory {
    cells: Vec<i32>,
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0; capacity],
        }
    }

    /// Zero every cell
    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = 0);
    }

    fn cell(&self, addr: i32) -> Result<usize> {
        if addr < 0 || addr as usize >= self.cells.len() {
            bail!(
                "Memory access out of bounds: address {} (capacity {})",
                addr,
                self.cells.len()
            );
        }

        Ok(addr as usize)
    }

    pub fn load(&self, addr: i32) -> Result<i32> {
        Ok(self.cells[self.cell(addr)?])
    }

    pub fn store(&mut self, addr: i32, val: i32) -> Result<()> {
        let cell = self.cell(addr)?;
        self.cells[cell] = val;

        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }
}

/// LIFO stack carrying every intermediate value of an evaluation
pub struct OperandStack {
    values: Vec<i32>,
    capacity: usize,
}

impl OperandStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    pub fn push(&mut self, val: i32) -> Result<()> {
        if self.values.len() == self.capacity {
            bail!("Operand stack overflow (capacity {})", self.capacity);
        }
        self.values.push(val);

        Ok(())
    }

    pub fn pop(&mut self) -> Result<i32> {
        self.values
            .pop()
            .ok_or_else(|| anyhow!("Operand stack underflow"))
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    /// Drop everything above `depth`
    pub fn truncate(&mut self, depth: usize) {
        self.values.truncate(depth);
    }
}

#[test]
fn test_memory() {
    let mut mem = Memory::new(4);
    assert_eq!(mem.capacity(), 4);
    assert_eq!(mem.load(3).unwrap(), 0);

    mem.store(3, 42).unwrap();
    assert_eq!(mem.load(3).unwrap(), 42);

    assert!(mem.load(4).is_err());
    assert!(mem.load(-1).is_err());
    assert!(mem.store(4, 1).is_err());

    mem.reset();
    assert_eq!(mem.load(3).unwrap(), 0);
}

#[test]
fn test_stack() {
    let mut stack = OperandStack::new(2);
    stack.push(1).unwrap();
    stack.push(2).unwrap();
    assert!(stack.push(3).is_err());
    assert_eq!(stack.depth(), 2);

    assert_eq!(stack.pop().unwrap(), 2);
    assert_eq!(stack.pop().unwrap(), 1);
    assert!(stack.pop().is_err());

    stack.push(5).unwrap();
    stack.push(6).unwrap();
    stack.truncate(1);
    assert_eq!(stack.pop().unwrap(), 5);

    stack.push(7).unwrap();
    stack.reset();
    assert_eq!(stack.depth(), 0);
}
