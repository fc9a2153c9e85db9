use std::convert::TryFrom;
use std::fmt;

use anyhow::{anyhow, bail, ensure, Error, Result};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NodeKind {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Times,
    /// `/`
    Over,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// Integer literal, `data` is the value
    IntVal,
    /// String literal, `data` is the string table index
    StrVal,
    /// `data` is the variable table index
    VarDecl,
    VarList,
    /// `data` is the variable table index. Optional child is the array offset.
    VarUse,
    /// (lvalue, rvalue)
    Assign,
    Block,
    StatementList,
    /// (condition, then, [else])
    If,
    /// (condition, body)
    While,
    Input,
    Output,
    Write,
    Return,
    FuncList,
    /// (header, body)
    FunctionDecl,
    /// (name, param_list)
    FunctionHeader,
    /// `data` is the function table index
    FunctionName,
    ParamList,
    /// (var_list, block)
    FunctionBody,
    /// `data` is the function table index. Only child is the argument list.
    FunctionCall,
    ArgList,
}

/// Number of children a node kind requires
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Shape {
    Exact(usize),
    /// Inclusive range
    Between(usize, usize),
    Any,
}

impl Shape {
    fn accepts(&self, count: usize) -> bool {
        match *self {
            Shape::Exact(n) => count == n,
            Shape::Between(lo, hi) => lo <= count && count <= hi,
            Shape::Any => true,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Exact(n) => write!(f, "{}", n),
            Shape::Between(lo, hi) => write!(f, "{} to {}", lo, hi),
            Shape::Any => write!(f, "any number of"),
        }
    }
}

const ALL_KINDS: [NodeKind; 32] = [
    NodeKind::Plus,
    NodeKind::Minus,
    NodeKind::Times,
    NodeKind::Over,
    NodeKind::Eq,
    NodeKind::Neq,
    NodeKind::Lt,
    NodeKind::Le,
    NodeKind::Gt,
    NodeKind::Ge,
    NodeKind::IntVal,
    NodeKind::StrVal,
    NodeKind::VarDecl,
    NodeKind::VarList,
    NodeKind::VarUse,
    NodeKind::Assign,
    NodeKind::Block,
    NodeKind::StatementList,
    NodeKind::If,
    NodeKind::While,
    NodeKind::Input,
    NodeKind::Output,
    NodeKind::Write,
    NodeKind::Return,
    NodeKind::FuncList,
    NodeKind::FunctionDecl,
    NodeKind::FunctionHeader,
    NodeKind::FunctionName,
    NodeKind::ParamList,
    NodeKind::FunctionBody,
    NodeKind::FunctionCall,
    NodeKind::ArgList,
];

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Plus => "+",
            NodeKind::Minus => "-",
            NodeKind::Times => "*",
            NodeKind::Over => "/",
            NodeKind::Eq => "==",
            NodeKind::Neq => "!=",
            NodeKind::Lt => "<",
            NodeKind::Le => "<=",
            NodeKind::Gt => ">",
            NodeKind::Ge => ">=",
            NodeKind::IntVal => "num",
            NodeKind::StrVal => "string",
            NodeKind::VarDecl => "var_decl",
            NodeKind::VarList => "var_list",
            NodeKind::VarUse => "var_use",
            NodeKind::Assign => "=",
            NodeKind::Block => "block",
            NodeKind::StatementList => "stmt_list",
            NodeKind::If => "if",
            NodeKind::While => "while",
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::Write => "write",
            NodeKind::Return => "return",
            NodeKind::FuncList => "func_list",
            NodeKind::FunctionDecl => "func_decl",
            NodeKind::FunctionHeader => "func_header",
            NodeKind::FunctionName => "func_name",
            NodeKind::ParamList => "param_list",
            NodeKind::FunctionBody => "func_body",
            NodeKind::FunctionCall => "fcall",
            NodeKind::ArgList => "arg_list",
        }
    }

    /// Whether `data` means anything for this kind
    pub fn has_data(&self) -> bool {
        matches!(
            self,
            NodeKind::IntVal
                | NodeKind::StrVal
                | NodeKind::VarDecl
                | NodeKind::VarUse
                | NodeKind::FunctionName
                | NodeKind::FunctionCall
        )
    }

    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            NodeKind::Plus
                | NodeKind::Minus
                | NodeKind::Times
                | NodeKind::Over
                | NodeKind::Eq
                | NodeKind::Neq
                | NodeKind::Lt
                | NodeKind::Le
                | NodeKind::Gt
                | NodeKind::Ge
        )
    }

    pub fn shape(&self) -> Shape {
        match self {
            k if k.is_binary() => Shape::Exact(2),
            NodeKind::IntVal
            | NodeKind::StrVal
            | NodeKind::VarDecl
            | NodeKind::Input
            | NodeKind::FunctionName => Shape::Exact(0),
            NodeKind::VarUse | NodeKind::Return => Shape::Between(0, 1),
            NodeKind::Output | NodeKind::Write | NodeKind::FunctionCall => Shape::Exact(1),
            NodeKind::Assign
            | NodeKind::While
            | NodeKind::FunctionDecl
            | NodeKind::FunctionHeader
            | NodeKind::FunctionBody => Shape::Exact(2),
            NodeKind::If => Shape::Between(2, 3),
            _ => Shape::Any,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl TryFrom<&str> for NodeKind {
    type Error = Error;

    fn try_from(label: &str) -> Result<Self> {
        ALL_KINDS
            .iter()
            .find(|kind| kind.label() == label)
            .copied()
            .ok_or_else(|| anyhow!("Unknown node kind: {}", label))
    }
}

/// A node of a resolved syntax tree
///
/// Every node owns its children. Table indices in `data` have already been resolved by
/// semantic analysis.
#[derive(Debug, PartialEq, Clone)]
pub struct Node {
    kind: NodeKind,
    data: i32,
    children: Vec<Node>,
}

impl Node {
    /// Build a node, checking that the number of children fits the kind
    pub fn new(kind: NodeKind, data: i32, children: Vec<Node>) -> Result<Self> {
        let shape = kind.shape();
        ensure!(
            shape.accepts(children.len()),
            "'{}' node takes {} children, got {}",
            kind,
            shape,
            children.len()
        );
        if !kind.has_data() && data != 0 {
            bail!("'{}' node carries no data, got {}", kind, data);
        }

        Ok(Self {
            kind,
            data,
            children,
        })
    }

    /// Build a node without data
    pub fn subtree(kind: NodeKind, children: Vec<Node>) -> Result<Self> {
        Self::new(kind, 0, children)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn data(&self) -> i32 {
        self.data
    }

    /// `data` as a table index
    pub fn index(&self) -> Result<usize> {
        if self.data < 0 {
            bail!("'{}' node has negative table index {}", self.kind, self.data);
        }

        Ok(self.data as usize)
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child(&self, idx: usize) -> Result<&Node> {
        self.children
            .get(idx)
            .ok_or_else(|| anyhow!("'{}' node has no child {}", self.kind, idx))
    }
}

/// Builders for trees written out by hand
#[cfg(test)]
impl Node {
    fn leaf(kind: NodeKind, data: i32) -> Self {
        Self {
            kind,
            data,
            children: Vec::new(),
        }
    }

    fn branch(kind: NodeKind, children: Vec<Node>) -> Self {
        Self {
            kind,
            data: 0,
            children,
        }
    }

    pub fn num(value: i32) -> Self {
        Self::leaf(NodeKind::IntVal, value)
    }

    pub fn string(idx: usize) -> Self {
        Self::leaf(NodeKind::StrVal, idx as i32)
    }

    pub fn var_decl(idx: usize) -> Self {
        Self::leaf(NodeKind::VarDecl, idx as i32)
    }

    pub fn var_use(idx: usize) -> Self {
        Self::leaf(NodeKind::VarUse, idx as i32)
    }

    /// `var[offset]`
    pub fn var_index(idx: usize, offset: Node) -> Self {
        Self {
            kind: NodeKind::VarUse,
            data: idx as i32,
            children: vec![offset],
        }
    }

    /// Panics if `op` is not an arithmetic or comparison operator
    pub fn binary(op: NodeKind, lhs: Node, rhs: Node) -> Self {
        assert!(op.is_binary(), "'{}' is not a binary operator", op);
        Self::branch(op, vec![lhs, rhs])
    }

    pub fn assign(lhs: Node, rhs: Node) -> Self {
        Self::branch(NodeKind::Assign, vec![lhs, rhs])
    }

    pub fn block(stmts: Vec<Node>) -> Self {
        Self::branch(NodeKind::Block, stmts)
    }

    pub fn if_then(cond: Node, then: Node) -> Self {
        Self::branch(NodeKind::If, vec![cond, then])
    }

    pub fn if_else(cond: Node, then: Node, otherwise: Node) -> Self {
        Self::branch(NodeKind::If, vec![cond, then, otherwise])
    }

    pub fn while_loop(cond: Node, body: Node) -> Self {
        Self::branch(NodeKind::While, vec![cond, body])
    }

    pub fn input() -> Self {
        Self::branch(NodeKind::Input, Vec::new())
    }

    pub fn output(expr: Node) -> Self {
        Self::branch(NodeKind::Output, vec![expr])
    }

    pub fn write(string_idx: usize) -> Self {
        Self::branch(NodeKind::Write, vec![Self::string(string_idx)])
    }

    pub fn ret(expr: Option<Node>) -> Self {
        Self::branch(NodeKind::Return, expr.into_iter().collect())
    }

    pub fn call(func_idx: usize, args: Vec<Node>) -> Self {
        Self {
            kind: NodeKind::FunctionCall,
            data: func_idx as i32,
            children: vec![Self::branch(NodeKind::ArgList, args)],
        }
    }

    /// Full function declaration
    ///
    /// `params` and `locals` are variable table indices, `body` is the statement block
    pub fn func_decl(func_idx: usize, params: &[usize], locals: &[usize], body: Node) -> Self {
        let name = Self::leaf(NodeKind::FunctionName, func_idx as i32);
        let params = params.iter().map(|&p| Self::var_decl(p)).collect();
        let header = Self::branch(
            NodeKind::FunctionHeader,
            vec![name, Self::branch(NodeKind::ParamList, params)],
        );
        let locals = locals.iter().map(|&l| Self::var_decl(l)).collect();
        let body = Self::branch(
            NodeKind::FunctionBody,
            vec![Self::branch(NodeKind::VarList, locals), body],
        );

        Self::branch(NodeKind::FunctionDecl, vec![header, body])
    }

    pub fn func_list(decls: Vec<Node>) -> Self {
        Self::branch(NodeKind::FuncList, decls)
    }
}

#[test]
fn test_labels_round_trip() {
    for kind in ALL_KINDS.iter() {
        assert_eq!(NodeKind::try_from(kind.label()).unwrap(), *kind);
    }
    assert!(NodeKind::try_from("ERROR!!").is_err());
}

#[test]
fn test_shape_checked() {
    assert!(Node::subtree(NodeKind::Plus, vec![Node::num(1)]).is_err());
    assert!(Node::subtree(NodeKind::Plus, vec![Node::num(1), Node::num(2)]).is_ok());
    assert!(Node::subtree(NodeKind::If, vec![Node::num(1)]).is_err());
    assert!(Node::subtree(NodeKind::If, vec![Node::num(1), Node::block(vec![])]).is_ok());
    assert!(Node::new(NodeKind::VarUse, 0, vec![Node::num(0), Node::num(1)]).is_err());
    assert!(Node::new(NodeKind::Block, 3, vec![]).is_err());
    assert!(Node::new(NodeKind::IntVal, -5, vec![]).is_ok());

    let many = (0..500).map(Node::num).collect();
    assert_eq!(Node::subtree(NodeKind::Block, many).unwrap().children().len(), 500);
}

#[test]
fn test_subtree_shape() {
    let err = Node::subtree(NodeKind::Assign, vec![]).unwrap_err();
    assert!(err.to_string().contains("'=' node takes 2 children"));

    assert!(Node::subtree(NodeKind::Return, vec![Node::num(1)]).is_ok());
    assert!(Node::subtree(NodeKind::Return, vec![Node::num(1), Node::num(2)]).is_err());

    let block = Node::subtree(NodeKind::Block, vec![Node::input()]).unwrap();
    assert_eq!(block.child(0).unwrap().kind(), NodeKind::Input);
    assert!(block.child(1).is_err());
}

#[test]
fn test_func_decl_layout() {
    let decl = Node::func_decl(2, &[0, 1], &[3], Node::block(vec![]));

    let header = decl.child(0).unwrap();
    assert_eq!(header.kind(), NodeKind::FunctionHeader);
    assert_eq!(header.child(0).unwrap().kind(), NodeKind::FunctionName);
    assert_eq!(header.child(0).unwrap().data(), 2);
    assert_eq!(header.child(1).unwrap().children().len(), 2);

    let body = decl.child(1).unwrap();
    assert_eq!(body.kind(), NodeKind::FunctionBody);
    assert_eq!(body.child(0).unwrap().children(), &[Node::var_decl(3)]);
    assert_eq!(body.child(1).unwrap().kind(), NodeKind::Block);
}
