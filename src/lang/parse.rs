//! Loader for program images.
//!
//! Scanning, parsing and semantic analysis happen elsewhere. What reaches the interpreter is an
//! image of their result: the filled in symbol tables followed by the resolved syntax tree.
//!
//! ```text
//! # string: raw literal up to the end of the line
//! string "hello\n"
//! # var: name, line, scope, size
//! var v 3 1 10
//! # func: name, line, arity, type
//! func main 2 0 void
//! ast
//! (func_list
//!   (func_decl
//!     (func_header (func_name 0) (param_list))
//!     (func_body (var_list (var_decl 0))
//!       (block (= (var_use 0 (num 0)) (num 5))))))
//! ```
//!
//! Table entries are added in order through the regular table operations, so the indices a tree
//! refers to are the positions of the entries in the image (identical string literals share an
//! index). A tree node is `(label [data] children...)` where `label` is the node kind's label.
//! Only kinds that carry data take the `data` field. Comments take whole lines in the table
//! section and may follow a node in the tree.

use std::convert::TryFrom;
use std::iter::FromIterator;
use std::str::FromStr;

use anyhow::{anyhow, bail, ensure, Context, Result};
use pom::parser::{call, end, none_of, one_of, sym, Parser};

use crate::lang::ast::{Node, NodeKind};
use crate::lang::program::{Program, Tables};
use crate::lang::types::Type;

const AST_MARKER: &str = "ast";

/// Whitespace and comments
fn space<'a>() -> Parser<'a, char, ()> {
    let comment = sym('#') * none_of("\n").repeat(0..);

    (one_of(" \t\r\n").discard() | comment.discard())
        .repeat(0..)
        .discard()
}

fn number<'a>() -> Parser<'a, char, i32> {
    let integer = one_of("0123456789").repeat(1..);

    (sym('-').opt() + integer)
        .collect()
        .map(String::from_iter)
        .convert(|s| i32::from_str(&s))
}

fn label<'a>() -> Parser<'a, char, String> {
    none_of(" \t\r\n()#").repeat(1..).map(String::from_iter)
}

fn build_node(label: &str, data: Option<i32>, children: Vec<Node>) -> Result<Node> {
    let kind = NodeKind::try_from(label)?;

    match (kind.has_data(), data) {
        (true, None) => bail!("'{}' node needs data", kind),
        (true, Some(d)) => Node::new(kind, d, children),
        (false, None) => Node::subtree(kind, children),
        (false, Some(d)) => bail!("'{}' node carries no data, got {}", kind, d),
    }
}

fn node<'a>() -> Parser<'a, char, Node> {
    let data = space() * number();
    let children = (space() * call(node)).repeat(0..);
    let parser = sym('(') * space() * label() + data.opt() + children - space() - sym(')');

    parser.convert(|((label, data), children)| build_node(&label, data, children))
}

fn parse_ast(input: &str) -> Result<Node> {
    let input: Vec<char> = input.chars().collect();
    let tree = space() * node() - space() - end();

    tree.parse(&input)
        .map_err(|e| anyhow!("Failed to parse syntax tree: {}", e))
}

fn fields<'s, const N: usize>(rest: &'s str, what: &str) -> Result<[&'s str; N]> {
    let parts: Vec<&str> = rest.split_whitespace().collect();
    ensure!(
        parts.len() == N,
        "'{}' entry takes {} fields, got {}",
        what,
        N,
        parts.len()
    );

    let mut out = [""; N];
    out.copy_from_slice(&parts);

    Ok(out)
}

fn load_entry(tables: &mut Tables, line: &str) -> Result<()> {
    let (keyword, rest) = match line.find(char::is_whitespace) {
        Some(pos) => (&line[..pos], line[pos..].trim()),
        None => (line, ""),
    };

    match keyword {
        "string" => {
            tables.strings.add_string(rest);
        }
        "var" => {
            let [name, line, scope, size] = fields::<4>(rest, keyword)?;
            let line = u32::from_str(line)?;
            let scope = i32::from_str(scope)?;
            let size = i32::from_str(size)?;

            if tables.variables.lookup_var(name, scope).is_some() {
                bail!("Variable '{}' already declared in scope {}", name, scope);
            }
            tables.variables.add_var(name, line, scope, size)?;
        }
        "func" => {
            let [name, line, arity, ty] = fields::<4>(rest, keyword)?;
            let line = u32::from_str(line)?;
            let arity = usize::from_str(arity)?;
            let ty = Type::try_from(ty)?;

            if tables.functions.lookup_func(name).is_some() {
                bail!("Function '{}' already declared", name);
            }
            tables.functions.add_func(name, line, arity, ty);
        }
        k => bail!("Unknown entry: {}", k),
    }

    Ok(())
}

/// Load a program image
pub fn parse(input: &str) -> Result<Program> {
    let mut tables = Tables::new();
    let mut lines = input.lines().enumerate();

    loop {
        let (lineno, line) = lines
            .next()
            .ok_or_else(|| anyhow!("Missing '{}' section", AST_MARKER))?;
        let line = line.trim();

        if line == AST_MARKER {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        load_entry(&mut tables, line).with_context(|| format!("line {}", lineno + 1))?;
    }

    let rest: Vec<&str> = lines.map(|(_, line)| line).collect();
    let ast = parse_ast(&rest.join("\n"))?;

    Ok(Program { tables, ast })
}

#[test]
fn test_number() {
    let data = vec![("0", 0), ("-0", 0), ("2342", 2342), ("-2342", -2342)];

    for (input, expected) in data {
        let input: Vec<char> = input.chars().collect();
        assert_eq!(number().parse(&input), Ok(expected));
    }

    for input in vec!["abc", "-", "99999999999"] {
        let input: Vec<char> = input.chars().collect();
        assert!((number() - end()).parse(&input).is_err());
    }
}

#[test]
fn test_node() {
    let data = vec![
        ("(num 5)", Node::num(5)),
        ("( num   -5 )", Node::num(-5)),
        ("(input)", Node::input()),
        (
            "(+ (num 1) (var_use 2))",
            Node::binary(NodeKind::Plus, Node::num(1), Node::var_use(2)),
        ),
        (
            "(= (var_use 0 (num 1)) # store\n (input))",
            Node::assign(Node::var_index(0, Node::num(1)), Node::input()),
        ),
        ("(fcall 3 (arg_list))", Node::call(3, vec![])),
        ("(return)", Node::ret(None)),
    ];

    for (input, expected) in data {
        assert_eq!(parse_ast(input).unwrap(), expected, "{}", input);
    }

    for input in vec![
        "(num)",
        "(block 3)",
        "(+ (num 1))",
        "(bogus)",
        "(num 1",
        "(num 1) (num 2)",
    ] {
        assert!(parse_ast(input).is_err(), "{}", input);
    }
}

#[test]
fn test_entries() {
    let image = r#"
# tables
string "hi\n"
string "hi\n"
string "bye"
var x 1 0 0
var v 2 0 4
var a 3 1 -1
func f 3 1 int
func main 5 0 void
ast
(block)
"#;

    let program = parse(image).unwrap();
    let tables = &program.tables;

    assert_eq!(tables.strings.len(), 2);
    assert_eq!(tables.strings.get_string(1).unwrap(), "\"bye\"");
    assert_eq!(tables.variables.len(), 3);
    assert_eq!(tables.variables.get(1).unwrap().address, 1);
    assert_eq!(tables.variables.get(2).unwrap().address, -1);
    assert_eq!(tables.functions.get(0).unwrap().ty, Type::Int);
    assert_eq!(tables.functions.lookup_func("main"), Some(1));
    assert_eq!(program.ast, Node::block(vec![]));
}

#[test]
fn test_bad_images() {
    let images = vec![
        "string \"x\"\n",
        "var x 1 0\nast\n(block)",
        "var x 1 0 0\nvar x 2 0 0\nast\n(block)",
        "func f 1 0 float\nast\n(block)",
        "func f 1 0 int\nfunc f 2 0 int\nast\n(block)",
        "label x\nast\n(block)",
        "ast\n(block",
        "var a 1 0 -2\nast\n(block)",
        "var a 1 0 2000000000\nvar b 1 0 2000000000\nast\n(block)",
    ];

    for image in images {
        assert!(parse(image).is_err(), "{}", image);
    }

    let err = parse("var x 1 0 0\nvar y one 0 0\nast\n(block)").unwrap_err();
    assert_eq!(err.to_string(), "line 2");
}

#[test]
fn test_run_image() {
    use crate::input::ReaderInput;
    use crate::lang::eval::{Eval, EvalConfig};

    let image = r#"
string "v[1] = "
var v 2 1 3
func main 1 0 void
ast
(func_list
  (func_decl
    (func_header (func_name 0) (param_list))
    (func_body
      (var_list (var_decl 0))
      (block
        (= (var_use 0 (num 0)) (num 5))
        (= (var_use 0 (num 1)) (+ (var_use 0 (num 0)) (num 1)))
        (write (string 0))
        (output (var_use 0 (num 1)))))))
"#;

    let mut program = parse(image).unwrap();
    let mut output = Vec::new();
    let mut input = ReaderInput::new("".as_bytes());
    Eval::new(&mut program.tables, &mut output, &mut input, EvalConfig::default())
        .run(&program.ast)
        .unwrap();

    assert_eq!(String::from_utf8(output).expect("Output not utf-8"), "v[1] = 6\n");
}

#[test]
fn test_demos() {
    use crate::input::ReaderInput;
    use crate::lang::eval::{Eval, EvalConfig};

    let tests = vec![
        (include_str!("../../demos/array_sum.ast"), "", "sum = 14\n"),
        (include_str!("../../demos/factorial.ast"), "5\n", "input: 120\n"),
    ];

    for (image, stdin, expected) in tests {
        let mut program = parse(image).unwrap();
        let mut output = Vec::new();
        let mut input = ReaderInput::new(stdin.as_bytes());
        Eval::new(&mut program.tables, &mut output, &mut input, EvalConfig::default())
            .run(&program.ast)
            .unwrap();

        assert_eq!(String::from_utf8(output).expect("Output not utf-8"), expected);
    }
}
