pub mod ast;
pub mod dot;
pub mod eval;
pub mod functions;
pub mod parse;
pub mod program;
pub mod runtime;
pub mod strings;
pub mod types;
pub mod variables;
