use std::fmt;

use anyhow::{anyhow, Result};

/// Table of string literals
///
/// Literals are kept exactly as the scanner saw them, surrounding quotes and escapes included.
/// Adding a literal that is already present returns the existing index.
#[derive(Debug, Default)]
pub struct StringTable {
    inner: Vec<String>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_string(&mut self, s: &str) -> usize {
        if let Some(idx) = self.inner.iter().position(|existing| existing == s) {
            return idx;
        }

        self.inner.push(s.to_string());
        self.inner.len() - 1
    }

    pub fn get_string(&self, idx: usize) -> Result<&str> {
        self.inner
            .get(idx)
            .map(String::as_str)
            .ok_or_else(|| anyhow!("Unknown string index: {}", idx))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Display for StringTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Strings table:")?;
        for (i, s) in self.inner.iter().enumerate() {
            writeln!(f, "Entry {} -- {}", i, s)?;
        }

        Ok(())
    }
}

#[test]
fn test_add_string_dedup() {
    let mut st = StringTable::new();
    let hello = st.add_string("\"hello\"");
    let again = st.add_string("\"hello\"");
    let world = st.add_string("\"world\"");

    assert_eq!(hello, again);
    assert_eq!(hello, 0);
    assert_eq!(world, 1);
    assert_eq!(st.len(), 2);
    assert_eq!(st.get_string(world).unwrap(), "\"world\"");
    assert!(st.get_string(2).is_err());
}

#[test]
fn test_display() {
    let mut st = StringTable::new();
    st.add_string("\"a\"");
    st.add_string("\"b\\n\"");

    assert_eq!(
        st.to_string(),
        "Strings table:\nEntry 0 -- \"a\"\nEntry 1 -- \"b\\n\"\n"
    );
}
