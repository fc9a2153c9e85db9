//! Render a syntax tree as a graphviz digraph. Purely diagnostic.

use std::io::Write;

use anyhow::Result;

use crate::lang::ast::{Node, NodeKind};
use crate::lang::program::Tables;

struct GraphWriter<'a> {
    sink: &'a mut dyn Write,
    tables: &'a Tables,
    verbose: bool,
    node_count: u32,
}

impl<'a> GraphWriter<'a> {
    /// Annotation naming the symbol a node refers to
    fn annotation(&self, node: &Node) -> Option<String> {
        let idx = node.index().ok()?;

        match node.kind() {
            NodeKind::VarUse | NodeKind::VarDecl => {
                let var = self.tables.variables.get(idx).ok()?;
                Some(format!("({}, scope = {})", var.name, var.scope))
            }
            NodeKind::FunctionCall | NodeKind::FunctionName => {
                let func = self.tables.functions.get(idx).ok()?;
                Some(format!("({})", func.name))
            }
            _ => None,
        }
    }

    fn write_node(&mut self, node: &Node) -> Result<u32> {
        let id = self.node_count;
        self.node_count += 1;

        let mut label = node.kind().to_string();
        if node.kind().has_data() {
            label += &format!(",{}", node.data());
        }
        if self.verbose {
            if let Some(note) = self.annotation(node) {
                label += &note;
            }
        }

        writeln!(self.sink, "node{}[label=\"{}\"];", id, label.replace('"', "\\\""))?;

        for child in node.children() {
            let child_id = self.write_node(child)?;
            writeln!(self.sink, "node{} -> node{};", id, child_id)?;
        }

        Ok(id)
    }
}

/// Write `root` as a digraph to `sink`
///
/// `verbose` annotates variables and functions with their names from `tables`
pub fn render(root: &Node, tables: &Tables, verbose: bool, sink: &mut dyn Write) -> Result<()> {
    writeln!(sink, "digraph {{")?;
    writeln!(sink, "graph [ordering=\"out\"];")?;

    let mut writer = GraphWriter {
        sink,
        tables,
        verbose,
        node_count: 0,
    };
    writer.write_node(root)?;

    writeln!(writer.sink, "}}")?;

    Ok(())
}

#[test]
fn test_render() {
    let tables = Tables::new();
    let ast = Node::output(Node::binary(NodeKind::Plus, Node::num(1), Node::num(2)));

    let mut output = Vec::new();
    render(&ast, &tables, false, &mut output).unwrap();

    let expected = "digraph {\n\
                    graph [ordering=\"out\"];\n\
                    node0[label=\"output\"];\n\
                    node1[label=\"+\"];\n\
                    node2[label=\"num,1\"];\n\
                    node1 -> node2;\n\
                    node3[label=\"num,2\"];\n\
                    node1 -> node3;\n\
                    node0 -> node1;\n\
                    }\n";
    assert_eq!(String::from_utf8(output).expect("Output not utf-8"), expected);
}

#[test]
fn test_render_verbose() {
    let mut tables = Tables::new();
    let x = tables.variables.add_var("x", 1, 3, 0).unwrap();
    let ast = Node::var_use(x);

    let mut output = Vec::new();
    render(&ast, &tables, true, &mut output).unwrap();

    let output = String::from_utf8(output).expect("Output not utf-8");
    assert!(output.contains("node0[label=\"var_use,0(x, scope = 3)\"];"));
}
