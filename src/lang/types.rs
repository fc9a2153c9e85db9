use std::convert::TryFrom;
use std::fmt;

use anyhow::{bail, Error, Result};

/// Declared return type of a function
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Type {
    Int,
    Void,
}

impl TryFrom<&str> for Type {
    type Error = Error;

    fn try_from(t: &str) -> Result<Self> {
        Ok(match t {
            "int" => Self::Int,
            "void" => Self::Void,
            _ => bail!("Unknown type: {}", t),
        })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Void => write!(f, "void"),
        }
    }
}

#[test]
fn test_type_names() {
    assert_eq!(Type::try_from("int").unwrap(), Type::Int);
    assert_eq!(Type::try_from("void").unwrap(), Type::Void);
    assert!(Type::try_from("float").is_err());
    assert_eq!(Type::Int.to_string(), "int");
    assert_eq!(Type::Void.to_string(), "void");
}
