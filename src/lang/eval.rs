use std::convert::TryFrom;
use std::io::Write;

use anyhow::{anyhow, bail, ensure, Result};
use log::{debug, info, trace, warn};

use crate::input::IntSource;
use crate::lang::ast::{Node, NodeKind};
use crate::lang::program::Tables;
use crate::lang::runtime::{Memory, OperandStack, DEFAULT_MEMORY_SIZE, DEFAULT_STACK_SIZE};

const INPUT_PROMPT: &str = "input: ";

/// How function invocations treat the fixed addresses of their parameters and locals
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CallMode {
    /// Every invocation of a function uses the same cells, so a recursive call clobbers the
    /// locals of the invocation that made it
    Shared,
    /// Each invocation moves the parameters and locals of the callee to fresh cells above the
    /// statically assigned ones, giving every invocation its own storage
    Framed,
}

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub memory_size: usize,
    pub stack_size: usize,
    pub call_mode: CallMode,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            stack_size: DEFAULT_STACK_SIZE,
            call_mode: CallMode::Shared,
        }
    }
}

/// Internal control flow result
///
/// `return` has to unwind out of blocks and loops up to the function call that runs the body.
#[derive(Debug, PartialEq)]
enum Flow {
    Normal,
    Return,
}

/// Variables relocated by one invocation in `CallMode::Framed`
struct Frame {
    /// (variable index, address before the call)
    saved: Vec<(usize, i32)>,
    /// First free frame cell before the call
    top: usize,
}

/// Strip the quotes of a string literal and expand `\n`
pub fn format_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    let mut chars = literal.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => (),
            '\\' if chars.peek() == Some(&'n') => {
                chars.next();
                out.push('\n');
            }
            c => out.push(c),
        }
    }

    out
}

pub struct Eval<'a> {
    tables: &'a mut Tables,
    sink: &'a mut dyn Write,
    input: &'a mut dyn IntSource,
    memory: Memory,
    stack: OperandStack,
    call_mode: CallMode,
    /// First memory cell not used by a frame. Frames live above the static variables.
    frame_top: usize,
    /// Set once the program's function list has been linked
    func_list: Option<&'a Node>,
}

impl<'a> Eval<'a> {
    /// Create a new `Eval` instance
    ///
    /// `sink` is where program output goes, eg. `output` and `write` statements and the `input`
    /// prompt.
    ///
    /// `input` answers `input` expressions
    pub fn new(
        tables: &'a mut Tables,
        sink: &'a mut dyn Write,
        input: &'a mut dyn IntSource,
        config: EvalConfig,
    ) -> Self {
        Self {
            tables,
            sink,
            input,
            memory: Memory::new(config.memory_size),
            stack: OperandStack::new(config.stack_size),
            call_mode: config.call_mode,
            frame_top: 0,
            func_list: None,
        }
    }

    /// Run a program
    ///
    /// A function list root is linked and its `main` function executed. Any other root is
    /// evaluated as is.
    pub fn run(&mut self, root: &'a Node) -> Result<()> {
        let needed = self.tables.variables.memory_used();
        ensure!(
            needed <= self.memory.capacity(),
            "Program needs {} memory cells, only {} available",
            needed,
            self.memory.capacity()
        );

        self.memory.reset();
        self.stack.reset();
        self.frame_top = needed;

        if root.kind() == NodeKind::FuncList {
            self.run_main(root)?;
        } else {
            self.eval_node(root)?;
        }

        self.sink.flush()?;

        Ok(())
    }

    /// Bind every declaration in the function list to its table entry
    fn link(&mut self, func_list: &'a Node) -> Result<()> {
        for (pos, decl) in func_list.children().iter().enumerate() {
            ensure!(
                decl.kind() == NodeKind::FunctionDecl,
                "Expected '{}' in function list, got '{}'",
                NodeKind::FunctionDecl,
                decl.kind()
            );

            let name = decl.child(0)?.child(0)?;
            ensure!(
                name.kind() == NodeKind::FunctionName,
                "Expected '{}' in function header, got '{}'",
                NodeKind::FunctionName,
                name.kind()
            );

            let idx = name.index()?;
            self.tables.functions.bind_decl(idx, pos)?;
            info!(
                "Linked function '{}' to declaration {}",
                self.tables.functions.get(idx)?.name,
                pos
            );
        }

        self.func_list = Some(func_list);

        Ok(())
    }

    fn run_main(&mut self, func_list: &'a Node) -> Result<()> {
        trace!("{}", func_list.kind());
        self.link(func_list)?;

        let main = self
            .tables
            .functions
            .lookup_func("main")
            .ok_or_else(|| anyhow!("No main function found"))?;

        self.invoke(main)
    }

    /// Evaluate a node that must leave exactly its value on the stack
    fn eval_expr(&mut self, node: &Node) -> Result<()> {
        match self.eval_node(node)? {
            Flow::Normal => Ok(()),
            Flow::Return => bail!("'{}' inside an expression", NodeKind::Return),
        }
    }

    fn eval_binop(&mut self, node: &Node) -> Result<()> {
        self.eval_expr(node.child(0)?)?;
        self.eval_expr(node.child(1)?)?;

        let r = self.stack.pop()?;
        let l = self.stack.pop()?;

        let res = match node.kind() {
            NodeKind::Plus => l
                .checked_add(r)
                .ok_or_else(|| anyhow!("{} + {} overflows", l, r))?,
            NodeKind::Minus => l
                .checked_sub(r)
                .ok_or_else(|| anyhow!("{} - {} overflows", l, r))?,
            NodeKind::Times => l
                .checked_mul(r)
                .ok_or_else(|| anyhow!("{} * {} overflows", l, r))?,
            NodeKind::Over => {
                if r == 0 {
                    bail!("Divide by zero");
                }

                l.checked_div(r)
                    .ok_or_else(|| anyhow!("{} / {} overflows", l, r))?
            }
            NodeKind::Eq => (l == r) as i32,
            NodeKind::Neq => (l != r) as i32,
            NodeKind::Lt => (l < r) as i32,
            NodeKind::Le => (l <= r) as i32,
            NodeKind::Gt => (l > r) as i32,
            NodeKind::Ge => (l >= r) as i32,
            k => bail!("Invalid kind: {}!", k),
        };

        self.stack.push(res)
    }

    /// Array offsets are either a literal or the value of a variable
    fn eval_offset(&mut self, offset: &Node) -> Result<i32> {
        match offset.kind() {
            NodeKind::IntVal | NodeKind::VarUse => {
                self.eval_expr(offset)?;
                self.stack.pop()
            }
            k => bail!("Invalid array offset expression: '{}'", k),
        }
    }

    /// Memory address a `var_use` node refers to
    fn address_of(&mut self, node: &Node) -> Result<i32> {
        ensure!(
            node.kind() == NodeKind::VarUse,
            "Expected '{}', got '{}'",
            NodeKind::VarUse,
            node.kind()
        );

        let base = self.tables.variables.get(node.index()?)?.address;
        match node.children() {
            [] => Ok(base),
            [offset] => {
                let offset = self.eval_offset(offset)?;
                base.checked_add(offset)
                    .ok_or_else(|| anyhow!("Address {} + {} overflows", base, offset))
            }
            _ => bail!("'{}' node takes at most one index", node.kind()),
        }
    }

    fn eval_var_use(&mut self, node: &Node) -> Result<()> {
        let var = self.tables.variables.get(node.index()?)?;

        // Naming an array (or array reference) without an index yields its base address
        if node.children().is_empty() && !var.is_scalar() {
            let address = var.address;
            return self.stack.push(address);
        }

        let addr = self.address_of(node)?;
        let val = self.memory.load(addr)?;
        self.stack.push(val)
    }

    fn eval_assign(&mut self, node: &Node) -> Result<()> {
        self.eval_expr(node.child(1)?)?;
        let addr = self.address_of(node.child(0)?)?;
        let val = self.stack.pop()?;

        self.memory.store(addr, val)
    }

    fn eval_stmt(&mut self, stmt: &Node) -> Result<Flow> {
        let depth = self.stack.depth();
        let flow = self.eval_node(stmt)?;

        // A call used as a statement throws its result away
        if stmt.kind() == NodeKind::FunctionCall {
            self.stack.truncate(depth);
        }

        Ok(flow)
    }

    fn eval_block(&mut self, node: &Node) -> Result<Flow> {
        for stmt in node.children() {
            if self.eval_stmt(stmt)? == Flow::Return {
                return Ok(Flow::Return);
            }
        }

        Ok(Flow::Normal)
    }

    fn eval_if(&mut self, node: &Node) -> Result<Flow> {
        self.eval_expr(node.child(0)?)?;
        let test = self.stack.pop()?;

        if test == 1 {
            self.eval_stmt(node.child(1)?)
        } else if test == 0 && node.children().len() == 3 {
            self.eval_stmt(node.child(2)?)
        } else {
            Ok(Flow::Normal)
        }
    }

    fn eval_while(&mut self, node: &Node) -> Result<Flow> {
        let cond = node.child(0)?;
        let body = node.child(1)?;

        self.eval_expr(cond)?;
        let mut test = self.stack.pop()?;
        while test != 0 {
            if self.eval_stmt(body)? == Flow::Return {
                return Ok(Flow::Return);
            }

            self.eval_expr(cond)?;
            test = self.stack.pop()?;
        }

        Ok(Flow::Normal)
    }

    fn eval_input(&mut self) -> Result<()> {
        let val = match self.input.read_int(INPUT_PROMPT, &mut *self.sink)? {
            Some(v) => v,
            None => {
                warn!("Malformed input token");
                eprintln!("Invalid input, using 0");
                0
            }
        };

        self.stack.push(val)
    }

    fn eval_output(&mut self, node: &Node) -> Result<()> {
        self.eval_expr(node.child(0)?)?;
        let val = self.stack.pop()?;
        writeln!(self.sink, "{}", val)?;

        Ok(())
    }

    fn eval_write(&mut self, node: &Node) -> Result<()> {
        let literal = node.child(0)?;
        ensure!(
            literal.kind() == NodeKind::StrVal,
            "Expected '{}' in '{}', got '{}'",
            NodeKind::StrVal,
            node.kind(),
            literal.kind()
        );

        let text = format_literal(self.tables.strings.get_string(literal.index()?)?);
        write!(self.sink, "{}", text)?;

        Ok(())
    }

    fn eval_return(&mut self, node: &Node) -> Result<Flow> {
        if let Some(expr) = node.children().first() {
            self.eval_expr(expr)?;
        }

        Ok(Flow::Return)
    }

    fn eval_call(&mut self, node: &Node) -> Result<()> {
        let idx = node.index()?;
        let args = node.child(0)?;
        ensure!(
            args.kind() == NodeKind::ArgList,
            "Expected '{}' in '{}', got '{}'",
            NodeKind::ArgList,
            node.kind(),
            args.kind()
        );

        let func = self.tables.functions.get(idx)?;
        ensure!(
            args.children().len() == func.arity,
            "Function '{}' takes {} arguments, got {}",
            func.name,
            func.arity,
            args.children().len()
        );

        // Arguments are pushed left to right
        for arg in args.children() {
            self.eval_expr(arg)?;
        }

        self.invoke(idx)
    }

    /// Run the declaration of a linked function. Its arguments are already on the stack.
    fn invoke(&mut self, idx: usize) -> Result<()> {
        let pos = self.tables.functions.decl(idx)?;
        let func_list = self
            .func_list
            .ok_or_else(|| anyhow!("Program has not been linked"))?;

        let decl = func_list.child(pos)?;
        let header = decl.child(0)?;
        let body = decl.child(1)?;
        ensure!(
            header.kind() == NodeKind::FunctionHeader && body.kind() == NodeKind::FunctionBody,
            "Malformed declaration of function '{}'",
            self.tables.functions.get(idx)?.name
        );

        info!("Calling '{}'", self.tables.functions.get(idx)?.name);

        let frame = match self.call_mode {
            CallMode::Framed => Some(self.push_frame(header, body)?),
            CallMode::Shared => None,
        };

        self.bind_params(header.child(1)?)?;
        let res = self.eval_body(body);

        if let Some(frame) = frame {
            self.pop_frame(frame)?;
        }

        res
    }

    /// Pop one argument per parameter, last declared parameter first
    fn bind_params(&mut self, params: &Node) -> Result<()> {
        ensure!(
            params.kind() == NodeKind::ParamList,
            "Expected '{}', got '{}'",
            NodeKind::ParamList,
            params.kind()
        );

        for param in params.children().iter().rev() {
            ensure!(
                param.kind() == NodeKind::VarDecl,
                "Expected '{}' in '{}', got '{}'",
                NodeKind::VarDecl,
                params.kind(),
                param.kind()
            );

            let idx = param.index()?;
            let val = self.stack.pop()?;
            let var = self.tables.variables.get(idx)?;

            if var.is_reference() {
                debug!("Binding reference '{}' to address {}", var.name, val);
                self.tables.variables.set_address(idx, val)?;
            } else if var.is_scalar() {
                debug!("Binding '{}' = {}", var.name, val);
                let address = var.address;
                self.memory.store(address, val)?;
            } else {
                bail!("Array parameter '{}' must be a reference", var.name);
            }
        }

        Ok(())
    }

    fn eval_body(&mut self, body: &Node) -> Result<()> {
        // Locals need no setup, memory starts zeroed
        self.eval_node(body.child(0)?)?;
        self.eval_node(body.child(1)?)?;

        Ok(())
    }

    /// Move the parameters and locals of a function to fresh, zeroed cells
    ///
    /// The previous addresses are kept in the returned frame. Reference parameters are only
    /// remembered; binding them is left to `bind_params`.
    fn push_frame(&mut self, header: &Node, body: &Node) -> Result<Frame> {
        let mut frame = Frame {
            saved: Vec::new(),
            top: self.frame_top,
        };

        let params = header.child(1)?.children();
        let locals = body.child(0)?.children();
        for decl in params.iter().chain(locals) {
            let idx = decl.index()?;
            let var = self.tables.variables.get(idx)?;
            frame.saved.push((idx, var.address));
            if var.is_reference() {
                continue;
            }

            let cells = var.cells();
            ensure!(
                self.frame_top + cells <= self.memory.capacity(),
                "Out of memory for a frame of '{}'",
                var.name
            );

            let base = i32::try_from(self.frame_top)?;
            for addr in base..base + cells as i32 {
                self.memory.store(addr, 0)?;
            }
            self.tables.variables.set_address(idx, base)?;
            self.frame_top += cells;
        }

        Ok(frame)
    }

    fn pop_frame(&mut self, frame: Frame) -> Result<()> {
        for (idx, address) in frame.saved.into_iter().rev() {
            self.tables.variables.set_address(idx, address)?;
        }
        self.frame_top = frame.top;

        Ok(())
    }

    fn eval_node(&mut self, node: &Node) -> Result<Flow> {
        trace!("{}", node.kind());

        match node.kind() {
            k if k.is_binary() => self.eval_binop(node)?,
            NodeKind::IntVal | NodeKind::StrVal => self.stack.push(node.data())?,
            NodeKind::VarUse => self.eval_var_use(node)?,
            NodeKind::Assign => self.eval_assign(node)?,
            NodeKind::Block | NodeKind::StatementList => return self.eval_block(node),
            NodeKind::If => return self.eval_if(node),
            NodeKind::While => return self.eval_while(node),
            // Nothing to do, memory was zeroed when the run started
            NodeKind::VarDecl | NodeKind::VarList => (),
            NodeKind::Input => self.eval_input()?,
            NodeKind::Output => self.eval_output(node)?,
            NodeKind::Write => self.eval_write(node)?,
            NodeKind::Return => return self.eval_return(node),
            NodeKind::FunctionCall => self.eval_call(node)?,
            NodeKind::ArgList => {
                for arg in node.children() {
                    self.eval_expr(arg)?;
                }
            }
            k => bail!("Invalid kind: {}!", k),
        }

        Ok(Flow::Normal)
    }
}

#[cfg(test)]
use crate::input::ReaderInput;
#[cfg(test)]
use crate::lang::types::Type;
#[cfg(test)]
use crate::lang::variables::{ARRAY_REF, SCALAR, UNBOUND};

#[cfg(test)]
fn run_with(tables: &mut Tables, ast: &Node, stdin: &str, config: EvalConfig) -> Result<String> {
    let mut output = Vec::new();
    let mut input = ReaderInput::new(stdin.as_bytes());
    {
        let mut eval = Eval::new(tables, &mut output, &mut input, config);
        eval.run(ast)?;
    }

    Ok(String::from_utf8(output).expect("Output not utf-8"))
}

#[cfg(test)]
fn run(tables: &mut Tables, ast: &Node) -> Result<String> {
    run_with(tables, ast, "", EvalConfig::default())
}

/// Wrap statements into `void main() { <locals> <stmts> }`
#[cfg(test)]
fn main_only(tables: &mut Tables, locals: &[usize], stmts: Vec<Node>) -> Node {
    let main = tables.functions.add_func("main", 1, 0, Type::Void);
    Node::func_list(vec![Node::func_decl(main, &[], locals, Node::block(stmts))])
}

#[test]
fn test_binops() {
    let tests = vec![
        (NodeKind::Plus, 5, 5, 10),
        (NodeKind::Minus, 100, 3, 97),
        (NodeKind::Times, 100, 3, 300),
        (NodeKind::Over, 99, 3, 33),
        (NodeKind::Over, 100, 3, 33),
        (NodeKind::Over, -7, 2, -3),
        (NodeKind::Over, 7, -2, -3),
        (NodeKind::Eq, 1, 1, 1),
        (NodeKind::Eq, 1, 2, 0),
        (NodeKind::Neq, 1, 2, 1),
        (NodeKind::Lt, 1, 3, 1),
        (NodeKind::Lt, 3, 3, 0),
        (NodeKind::Le, 3, 3, 1),
        (NodeKind::Gt, 3, 3, 0),
        (NodeKind::Gt, 4, 3, 1),
        (NodeKind::Ge, 3, 3, 1),
        (NodeKind::Ge, 2, 3, 0),
    ];

    for (op, l, r, expected) in tests {
        let mut tables = Tables::new();
        let ast = Node::block(vec![Node::output(Node::binary(
            op,
            Node::num(l),
            Node::num(r),
        ))]);

        assert_eq!(
            run(&mut tables, &ast).unwrap(),
            format!("{}\n", expected),
            "{} {} {}",
            l,
            op,
            r
        );
    }
}

#[test]
fn test_operand_order() {
    // (10 - 3) - 2 and 10 - (3 - 2) must differ
    let mut tables = Tables::new();
    let ast = Node::block(vec![
        Node::output(Node::binary(
            NodeKind::Minus,
            Node::binary(NodeKind::Minus, Node::num(10), Node::num(3)),
            Node::num(2),
        )),
        Node::output(Node::binary(
            NodeKind::Minus,
            Node::num(10),
            Node::binary(NodeKind::Minus, Node::num(3), Node::num(2)),
        )),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "5\n9\n");
}

#[test]
fn test_arithmetic_errors() {
    let mut tables = Tables::new();
    let ast = Node::output(Node::binary(NodeKind::Over, Node::num(1), Node::num(0)));
    let err = run(&mut tables, &ast).unwrap_err();
    assert_eq!(err.to_string(), "Divide by zero");

    let ast = Node::output(Node::binary(
        NodeKind::Plus,
        Node::num(i32::MAX),
        Node::num(1),
    ));
    assert!(run(&mut tables, &ast).is_err());

    let ast = Node::output(Node::binary(
        NodeKind::Over,
        Node::num(i32::MIN),
        Node::num(-1),
    ));
    assert!(run(&mut tables, &ast).is_err());
}

#[test]
fn test_array_access() {
    let mut tables = Tables::new();
    let v = tables.variables.add_var("v", 1, 1, 3).unwrap();
    let ast = main_only(
        &mut tables,
        &[v],
        vec![
            Node::assign(Node::var_index(v, Node::num(0)), Node::num(5)),
            Node::assign(
                Node::var_index(v, Node::num(1)),
                Node::binary(
                    NodeKind::Plus,
                    Node::var_index(v, Node::num(0)),
                    Node::num(1),
                ),
            ),
            Node::output(Node::var_index(v, Node::num(1))),
        ],
    );

    assert_eq!(run(&mut tables, &ast).unwrap(), "6\n");
}

#[test]
fn test_array_layout() {
    let mut tables = Tables::new();
    let x = tables.variables.add_var("x", 1, 1, SCALAR).unwrap();
    let v = tables.variables.add_var("v", 2, 1, 4).unwrap();
    let i = tables.variables.add_var("i", 3, 1, SCALAR).unwrap();
    let ast = main_only(
        &mut tables,
        &[x, v, i],
        vec![
            // i = 0; while (i < 4) { v[i] = i * 10; i = i + 1; }
            Node::while_loop(
                Node::binary(NodeKind::Lt, Node::var_use(i), Node::num(4)),
                Node::block(vec![
                    Node::assign(
                        Node::var_index(v, Node::var_use(i)),
                        Node::binary(NodeKind::Times, Node::var_use(i), Node::num(10)),
                    ),
                    Node::assign(
                        Node::var_use(i),
                        Node::binary(NodeKind::Plus, Node::var_use(i), Node::num(1)),
                    ),
                ]),
            ),
            // Bare array name is its base address
            Node::output(Node::var_use(v)),
            Node::output(Node::var_index(v, Node::num(3))),
            Node::output(Node::var_use(i)),
            Node::output(Node::var_use(x)),
        ],
    );

    assert_eq!(run(&mut tables, &ast).unwrap(), "1\n30\n4\n0\n");
}

#[test]
fn test_invalid_offset() {
    let mut tables = Tables::new();
    let v = tables.variables.add_var("v", 1, 1, 3).unwrap();
    let ast = main_only(
        &mut tables,
        &[v],
        vec![Node::output(Node::var_index(
            v,
            Node::binary(NodeKind::Plus, Node::num(1), Node::num(1)),
        ))],
    );

    let err = run(&mut tables, &ast).unwrap_err();
    assert!(err.to_string().contains("Invalid array offset"));
}

#[test]
fn test_if() {
    let mut tables = Tables::new();
    let yes = tables.strings.add_string("\"yes\"");
    let no = tables.strings.add_string("\"no\"");
    let ast = Node::block(vec![
        Node::if_then(
            Node::binary(NodeKind::Eq, Node::num(1), Node::num(2)),
            Node::write(yes),
        ),
        Node::if_else(
            Node::binary(NodeKind::Eq, Node::num(1), Node::num(2)),
            Node::write(yes),
            Node::write(no),
        ),
        Node::if_else(
            Node::binary(NodeKind::Le, Node::num(1), Node::num(2)),
            Node::write(yes),
            Node::write(no),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "noyes");
}

#[test]
fn test_while_iterations() {
    for k in 0..4 {
        let mut tables = Tables::new();
        let i = tables.variables.add_var("i", 1, 1, SCALAR).unwrap();
        let ast = main_only(
            &mut tables,
            &[i],
            vec![Node::while_loop(
                Node::binary(NodeKind::Lt, Node::var_use(i), Node::num(k)),
                Node::block(vec![
                    Node::output(Node::var_use(i)),
                    Node::assign(
                        Node::var_use(i),
                        Node::binary(NodeKind::Plus, Node::var_use(i), Node::num(1)),
                    ),
                ]),
            )],
        );

        let expected: String = (0..k).map(|n| format!("{}\n", n)).collect();
        assert_eq!(run(&mut tables, &ast).unwrap(), expected);
    }
}

#[test]
fn test_write() {
    let mut tables = Tables::new();
    let s = tables.strings.add_string("\"a\\nb\"");
    let t = tables.strings.add_string("\"tab\\there\\n\"");
    let ast = Node::block(vec![Node::write(s), Node::write(t)]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "a\nbtab\\there\n");
}

#[test]
fn test_format_literal() {
    assert_eq!(format_literal("\"hello\""), "hello");
    assert_eq!(format_literal("\"a\\nb\""), "a\nb");
    assert_eq!(format_literal("\"\\\""), "\\");
    assert_eq!(format_literal("\"x\\n\\n\""), "x\n\n");
    assert_eq!(format_literal(""), "");
}

#[test]
fn test_input() {
    let mut tables = Tables::new();
    let x = tables.variables.add_var("x", 1, 1, SCALAR).unwrap();
    let ast = main_only(
        &mut tables,
        &[x],
        vec![
            Node::assign(Node::var_use(x), Node::input()),
            Node::output(Node::binary(NodeKind::Times, Node::var_use(x), Node::num(2))),
            Node::output(Node::input()),
            Node::output(Node::input()),
        ],
    );

    let out = run_with(&mut tables, &ast, "21\nnope\n", EvalConfig::default()).unwrap();
    assert_eq!(out, "input: 42\ninput: 0\ninput: 0\n");
}

#[test]
fn test_function_call() {
    // int f(int x) { return x * 2; }  main: output f(21);
    let mut tables = Tables::new();
    let x = tables.variables.add_var("x", 1, 1, SCALAR).unwrap();
    let f = tables.functions.add_func("f", 1, 1, Type::Int);
    let main = tables.functions.add_func("main", 2, 0, Type::Void);

    let ast = Node::func_list(vec![
        Node::func_decl(
            f,
            &[x],
            &[],
            Node::block(vec![Node::ret(Some(Node::binary(
                NodeKind::Times,
                Node::var_use(x),
                Node::num(2),
            )))]),
        ),
        Node::func_decl(
            main,
            &[],
            &[],
            Node::block(vec![Node::output(Node::call(f, vec![Node::num(21)]))]),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "42\n");
}

#[test]
fn test_argument_order() {
    // int sub(int a, int b) { return a - b; }
    let mut tables = Tables::new();
    let a = tables.variables.add_var("a", 1, 1, SCALAR).unwrap();
    let b = tables.variables.add_var("b", 1, 1, SCALAR).unwrap();
    let sub = tables.functions.add_func("sub", 1, 2, Type::Int);
    let main = tables.functions.add_func("main", 2, 0, Type::Void);

    let ast = Node::func_list(vec![
        Node::func_decl(
            sub,
            &[a, b],
            &[],
            Node::block(vec![Node::ret(Some(Node::binary(
                NodeKind::Minus,
                Node::var_use(a),
                Node::var_use(b),
            )))]),
        ),
        Node::func_decl(
            main,
            &[],
            &[],
            Node::block(vec![Node::output(Node::call(
                sub,
                vec![Node::num(10), Node::num(3)],
            ))]),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "7\n");
}

#[test]
fn test_by_value_and_by_reference() {
    // void f(int x, int a[]) { x = 100; a[1] = x; }
    // main: y = 3; f(y, v); output y; output v[1];
    let mut tables = Tables::new();
    let x = tables.variables.add_var("x", 1, 1, SCALAR).unwrap();
    let a = tables.variables.add_var("a", 1, 1, ARRAY_REF).unwrap();
    let y = tables.variables.add_var("y", 2, 2, SCALAR).unwrap();
    let v = tables.variables.add_var("v", 2, 2, 2).unwrap();
    let f = tables.functions.add_func("f", 1, 2, Type::Void);
    let main = tables.functions.add_func("main", 2, 0, Type::Void);

    let ast = Node::func_list(vec![
        Node::func_decl(
            f,
            &[x, a],
            &[],
            Node::block(vec![
                Node::assign(Node::var_use(x), Node::num(100)),
                Node::assign(Node::var_index(a, Node::num(1)), Node::var_use(x)),
            ]),
        ),
        Node::func_decl(
            main,
            &[],
            &[y, v],
            Node::block(vec![
                Node::assign(Node::var_use(y), Node::num(3)),
                Node::call(f, vec![Node::var_use(y), Node::var_use(v)]),
                Node::output(Node::var_use(y)),
                Node::output(Node::var_index(v, Node::num(1))),
            ]),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "3\n100\n");
    let v_base = tables.variables.get(v).unwrap().address;
    assert_eq!(tables.variables.get(a).unwrap().address, v_base);
}

#[test]
fn test_return_ends_function() {
    let mut tables = Tables::new();
    let i = tables.variables.add_var("i", 1, 1, SCALAR).unwrap();
    let f = tables.functions.add_func("f", 1, 0, Type::Int);
    let main = tables.functions.add_func("main", 2, 0, Type::Void);

    // int f() { while (1) { i = i + 1; if (i == 3) return i; } output 99; }
    let ast = Node::func_list(vec![
        Node::func_decl(
            f,
            &[],
            &[i],
            Node::block(vec![
                Node::while_loop(
                    Node::num(1),
                    Node::block(vec![
                        Node::assign(
                            Node::var_use(i),
                            Node::binary(NodeKind::Plus, Node::var_use(i), Node::num(1)),
                        ),
                        Node::if_then(
                            Node::binary(NodeKind::Eq, Node::var_use(i), Node::num(3)),
                            Node::ret(Some(Node::var_use(i))),
                        ),
                    ]),
                ),
                Node::output(Node::num(99)),
            ]),
        ),
        Node::func_decl(
            main,
            &[],
            &[],
            Node::block(vec![Node::output(Node::call(f, vec![]))]),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "3\n");
}

#[test]
fn test_call_statement_discards_result() {
    let mut tables = Tables::new();
    let i = tables.variables.add_var("i", 1, 2, SCALAR).unwrap();
    let one = tables.functions.add_func("one", 1, 0, Type::Int);
    let main = tables.functions.add_func("main", 2, 0, Type::Void);

    let ast = Node::func_list(vec![
        Node::func_decl(
            one,
            &[],
            &[],
            Node::block(vec![Node::ret(Some(Node::num(1)))]),
        ),
        Node::func_decl(
            main,
            &[],
            &[i],
            Node::block(vec![
                Node::while_loop(
                    Node::binary(NodeKind::Lt, Node::var_use(i), Node::num(500)),
                    Node::block(vec![
                        Node::call(one, vec![]),
                        Node::assign(
                            Node::var_use(i),
                            Node::binary(NodeKind::Plus, Node::var_use(i), Node::num(1)),
                        ),
                    ]),
                ),
                Node::output(Node::var_use(i)),
            ]),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "500\n");
}

/// int fact(int n) { if (n <= 1) return 1; return fact(n - 1) * n; }
#[cfg(test)]
fn factorial_program(tables: &mut Tables, arg: i32) -> Node {
    let n = tables.variables.add_var("n", 1, 1, SCALAR).unwrap();
    let fact = tables.functions.add_func("fact", 1, 1, Type::Int);
    let main = tables.functions.add_func("main", 2, 0, Type::Void);

    Node::func_list(vec![
        Node::func_decl(
            fact,
            &[n],
            &[],
            Node::block(vec![
                Node::if_then(
                    Node::binary(NodeKind::Le, Node::var_use(n), Node::num(1)),
                    Node::ret(Some(Node::num(1))),
                ),
                Node::ret(Some(Node::binary(
                    NodeKind::Times,
                    Node::call(
                        fact,
                        vec![Node::binary(NodeKind::Minus, Node::var_use(n), Node::num(1))],
                    ),
                    Node::var_use(n),
                ))),
            ]),
        ),
        Node::func_decl(
            main,
            &[],
            &[],
            Node::block(vec![Node::output(Node::call(fact, vec![Node::num(arg)]))]),
        ),
    ])
}

#[test]
fn test_recursion_shares_locals() {
    // Every invocation of `fact` shares `n`, which is 1 by the time the products are taken
    let mut tables = Tables::new();
    let ast = factorial_program(&mut tables, 5);

    assert_eq!(run(&mut tables, &ast).unwrap(), "1\n");
}

#[test]
fn test_recursion_framed() {
    let mut tables = Tables::new();
    let ast = factorial_program(&mut tables, 5);
    let config = EvalConfig {
        call_mode: CallMode::Framed,
        ..EvalConfig::default()
    };

    assert_eq!(run_with(&mut tables, &ast, "", config).unwrap(), "120\n");
}

#[test]
fn test_framed_writes_through_reference() {
    // void fill(int a[], int d) {
    //     int loc[1];
    //     if (d == 1) { fill(loc, 0); output loc[0]; } else a[0] = 7;
    // }
    // main: fill(dummy, 1);
    let mut tables = Tables::new();
    let dummy = tables.variables.add_var("dummy", 1, 0, 1).unwrap();
    let a = tables.variables.add_var("a", 2, 1, ARRAY_REF).unwrap();
    let d = tables.variables.add_var("d", 2, 1, SCALAR).unwrap();
    let loc = tables.variables.add_var("loc", 3, 2, 1).unwrap();
    let fill = tables.functions.add_func("fill", 2, 2, Type::Void);
    let main = tables.functions.add_func("main", 6, 0, Type::Void);

    let ast = Node::func_list(vec![
        Node::func_decl(
            fill,
            &[a, d],
            &[loc],
            Node::block(vec![Node::if_else(
                Node::binary(NodeKind::Eq, Node::var_use(d), Node::num(1)),
                Node::block(vec![
                    Node::call(fill, vec![Node::var_use(loc), Node::num(0)]),
                    Node::output(Node::var_index(loc, Node::num(0))),
                ]),
                Node::assign(Node::var_index(a, Node::num(0)), Node::num(7)),
            )]),
        ),
        Node::func_decl(
            main,
            &[],
            &[],
            Node::block(vec![Node::call(fill, vec![Node::var_use(dummy), Node::num(1)])]),
        ),
    ]);

    let config = EvalConfig {
        call_mode: CallMode::Framed,
        ..EvalConfig::default()
    };
    assert_eq!(run_with(&mut tables, &ast, "", config).unwrap(), "7\n");

    // Every frame is gone once the run is over
    assert_eq!(tables.variables.get(d).unwrap().address, 1);
    assert_eq!(tables.variables.get(loc).unwrap().address, 2);
    assert_eq!(tables.variables.get(a).unwrap().address, UNBOUND);

    assert_eq!(run(&mut tables, &ast).unwrap(), "7\n");
}

#[test]
fn test_framed_out_of_memory() {
    // void down() { int x; down(); }
    let mut tables = Tables::new();
    let x = tables.variables.add_var("x", 1, 1, SCALAR).unwrap();
    let down = tables.functions.add_func("down", 1, 0, Type::Void);
    let main = tables.functions.add_func("main", 2, 0, Type::Void);
    let ast = Node::func_list(vec![
        Node::func_decl(down, &[], &[x], Node::block(vec![Node::call(down, vec![])])),
        Node::func_decl(main, &[], &[], Node::block(vec![Node::call(down, vec![])])),
    ]);
    let config = EvalConfig {
        call_mode: CallMode::Framed,
        ..EvalConfig::default()
    };

    let err = run_with(&mut tables, &ast, "", config).unwrap_err();
    assert_eq!(err.to_string(), "Out of memory for a frame of 'x'");
}

#[test]
fn test_forward_reference_param() {
    // void g(int b[]) { b[1] = 9; }  void f(int a[]) { g(a); }
    // main: f(v); output v[1];
    let mut tables = Tables::new();
    let b = tables.variables.add_var("b", 1, 1, ARRAY_REF).unwrap();
    let a = tables.variables.add_var("a", 2, 2, ARRAY_REF).unwrap();
    let v = tables.variables.add_var("v", 3, 3, 2).unwrap();
    let g = tables.functions.add_func("g", 1, 1, Type::Void);
    let f = tables.functions.add_func("f", 2, 1, Type::Void);
    let main = tables.functions.add_func("main", 3, 0, Type::Void);

    let ast = Node::func_list(vec![
        Node::func_decl(
            g,
            &[b],
            &[],
            Node::block(vec![Node::assign(
                Node::var_index(b, Node::num(1)),
                Node::num(9),
            )]),
        ),
        Node::func_decl(f, &[a], &[], Node::block(vec![Node::call(g, vec![Node::var_use(a)])])),
        Node::func_decl(
            main,
            &[],
            &[v],
            Node::block(vec![
                Node::call(f, vec![Node::var_use(v)]),
                Node::output(Node::var_index(v, Node::num(1))),
            ]),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "9\n");
    let v_base = tables.variables.get(v).unwrap().address;
    assert_eq!(tables.variables.get(a).unwrap().address, v_base);
    assert_eq!(tables.variables.get(b).unwrap().address, v_base);

    let config = EvalConfig {
        call_mode: CallMode::Framed,
        ..EvalConfig::default()
    };
    assert_eq!(run_with(&mut tables, &ast, "", config).unwrap(), "9\n");
}

#[test]
fn test_call_as_single_statement_body() {
    // int one() { i = i + 1; return 1; }
    // main: while (i < 500) one(); if (i == 500) one(); else output 0;
    //       if (i == 0) output 0; else one(); output i;
    let mut tables = Tables::new();
    let i = tables.variables.add_var("i", 1, 0, SCALAR).unwrap();
    let one = tables.functions.add_func("one", 2, 0, Type::Int);
    let main = tables.functions.add_func("main", 3, 0, Type::Void);

    let ast = Node::func_list(vec![
        Node::func_decl(
            one,
            &[],
            &[],
            Node::block(vec![
                Node::assign(
                    Node::var_use(i),
                    Node::binary(NodeKind::Plus, Node::var_use(i), Node::num(1)),
                ),
                Node::ret(Some(Node::num(1))),
            ]),
        ),
        Node::func_decl(
            main,
            &[],
            &[],
            Node::block(vec![
                Node::while_loop(
                    Node::binary(NodeKind::Lt, Node::var_use(i), Node::num(500)),
                    Node::call(one, vec![]),
                ),
                Node::if_else(
                    Node::binary(NodeKind::Eq, Node::var_use(i), Node::num(500)),
                    Node::call(one, vec![]),
                    Node::output(Node::num(0)),
                ),
                Node::if_else(
                    Node::binary(NodeKind::Eq, Node::var_use(i), Node::num(0)),
                    Node::output(Node::num(0)),
                    Node::call(one, vec![]),
                ),
                Node::output(Node::var_use(i)),
            ]),
        ),
    ]);

    assert_eq!(run(&mut tables, &ast).unwrap(), "502\n");
}

#[test]
fn test_missing_main() {
    let mut tables = Tables::new();
    let f = tables.functions.add_func("f", 1, 0, Type::Void);
    let out = tables.strings.add_string("\"ran\"");
    let ast = Node::func_list(vec![Node::func_decl(
        f,
        &[],
        &[],
        Node::block(vec![Node::write(out)]),
    )]);

    let mut output = Vec::new();
    let mut input = ReaderInput::new("".as_bytes());
    let res = Eval::new(&mut tables, &mut output, &mut input, EvalConfig::default()).run(&ast);

    assert_eq!(res.unwrap_err().to_string(), "No main function found");
    assert!(output.is_empty());
}

#[test]
fn test_arity_mismatch() {
    let mut tables = Tables::new();
    let f = tables.functions.add_func("f", 1, 1, Type::Void);
    let x = tables.variables.add_var("x", 1, 1, SCALAR).unwrap();
    let main = tables.functions.add_func("main", 2, 0, Type::Void);
    let ast = Node::func_list(vec![
        Node::func_decl(f, &[x], &[], Node::block(vec![])),
        Node::func_decl(main, &[], &[], Node::block(vec![Node::call(f, vec![])])),
    ]);

    let err = run(&mut tables, &ast).unwrap_err();
    assert_eq!(err.to_string(), "Function 'f' takes 1 arguments, got 0");
}

#[test]
fn test_invalid_kind() {
    let mut tables = Tables::new();
    let ast = Node::block(vec![Node::func_list(vec![])]);

    let err = run(&mut tables, &ast).unwrap_err();
    assert_eq!(err.to_string(), "Invalid kind: func_list!");
}

#[test]
fn test_memory_too_small() {
    let mut tables = Tables::new();
    tables.variables.add_var("big", 1, 0, 200).unwrap();
    let ast = Node::block(vec![]);

    assert!(run(&mut tables, &ast).is_err());

    let config = EvalConfig {
        memory_size: 200,
        ..EvalConfig::default()
    };
    assert!(run_with(&mut tables, &ast, "", config).is_ok());
}

#[test]
fn test_runs_reset_state() {
    let mut tables = Tables::new();
    let x = tables.variables.add_var("x", 1, 1, SCALAR).unwrap();
    let ast = main_only(
        &mut tables,
        &[x],
        vec![
            Node::output(Node::var_use(x)),
            Node::assign(Node::var_use(x), Node::num(9)),
        ],
    );

    let mut output = Vec::new();
    let mut input = ReaderInput::new("".as_bytes());
    {
        let mut eval = Eval::new(&mut tables, &mut output, &mut input, EvalConfig::default());
        eval.run(&ast).unwrap();
        eval.run(&ast).unwrap();
    }

    assert_eq!(String::from_utf8(output).expect("Output not utf-8"), "0\n0\n");
}
