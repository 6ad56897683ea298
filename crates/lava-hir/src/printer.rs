//! GraphViz DOT printer (§4.8): renders a graph's control-flow skeleton
//! plus, for each control-flow node, the expression/effect trees hanging
//! off it, as one `digraph IR { ... }` string. Grounded on
//! `original_source/src/cbase/graph-printer.cc`'s `DotPrinter`.
//!
//! The source hand-switches over every expression kind to build a label
//! (`RenderExprOperand`'s ~30-case `switch`). Every node kind here already
//! derives `Debug`, so a label is just that derived representation with
//! DOT's quote/backslash/newline escaped -- one rendering rule instead of
//! a case per node kind, with the same one-record-per-node output.

use std::fmt::Write as _;

use crate::graph::Graph;
use crate::id::NodeId;
use crate::node::{ControlFlowKind, NodeKind};

/// Which edges to draw off of each rendered expression, matching
/// `GraphPrinter::Option`'s `EFFECT_CHAIN`/`OPERAND_CHAIN`/`ALL_CHAIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Operand,
    Effect,
    All,
}

impl Chain {
    fn render_operand(self) -> bool {
        matches!(self, Chain::Operand | Chain::All)
    }

    fn render_effect(self) -> bool {
        matches!(self, Chain::Effect | Chain::All)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PrintOptions {
    pub chain: Chain,
}

impl Default for PrintOptions {
    fn default() -> Self {
        PrintOptions { chain: Chain::All }
    }
}

fn node_name(id: NodeId) -> String {
    format!("n{}", id.0)
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_of(graph: &Graph, id: NodeId) -> String {
    match graph.get(id) {
        Ok(kind) => escape(&format!("{:?}", kind)),
        Err(_) => format!("<dead {}>", id),
    }
}

/// The control operand(s) a control-flow node directly carries (§3.1
/// encodes the predecessor edge as an operand; `If`/`Return` additionally
/// carry a value expression worth rendering as a child).
fn control_value_roots(kind: &ControlFlowKind) -> Vec<NodeId> {
    match kind {
        ControlFlowKind::If { cond, .. } => vec![*cond],
        ControlFlowKind::Return { value, .. } => vec![*value],
        _ => Vec::new(),
    }
}

/// Renders `digraph IR { ... }` for the whole graph: every control-flow
/// node as a red box connected to its predecessor(s) by a bold blue edge,
/// plus (per `opt`) the operand/effect trees of whatever value
/// expressions that node carries or that are attached to it as phis.
pub fn print(graph: &Graph, opt: PrintOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph IR {{");

    let order = graph.control_flow_rpo();
    let mut seen_control = vec![false; graph.ceiling() as usize];
    let mut seen_expr = vec![false; graph.ceiling() as usize];

    for &node in &order {
        render_control_node(graph, node, &mut out, &mut seen_control);
    }
    for (from, _, to) in control_edges(graph, &order) {
        let _ = writeln!(
            out,
            "  {} -> {}[color=blue style=bold]",
            node_name(from),
            node_name(to)
        );
    }
    for &node in &order {
        let Ok(kind) = graph.get(node) else { continue };
        let NodeKind::ControlFlow(cf) = kind else { continue };
        for root in control_value_roots(cf) {
            render_expr(graph, root, &mut out, &mut seen_expr, opt);
            let _ = writeln!(out, "  {} -> {}", node_name(node), node_name(root));
        }
        for phi in phis_attached_to(graph, node) {
            render_expr(graph, phi, &mut out, &mut seen_expr, opt);
            let _ = writeln!(out, "  {} -> {}[style=dashed]", node_name(node), node_name(phi));
        }
    }

    let _ = writeln!(out, "}}");
    out
}

fn phis_attached_to(graph: &Graph, region: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    for i in 0..graph.ceiling() {
        let id = NodeId(i);
        let region_of = match graph.get(id) {
            Ok(NodeKind::Expr(crate::node::ExprKind::Phi { region, .. })) => Some(*region),
            Ok(NodeKind::Effect(crate::node::EffectKind::EffectPhi { region, .. })) => Some(*region),
            _ => None,
        };
        if region_of == Some(region) {
            out.push(id);
        }
    }
    out
}

/// `(from, slot, to)` predecessor -> node pairs, derived the same way
/// `control_flow_rpo` walks forward successors, just read in reverse.
fn control_edges(graph: &Graph, order: &[NodeId]) -> Vec<(NodeId, u16, NodeId)> {
    let mut edges = Vec::new();
    for &node in order {
        let Ok(NodeKind::ControlFlow(kind)) = graph.get(node) else { continue };
        for (slot, pred) in control_predecessors(kind).into_iter().enumerate() {
            edges.push((pred, slot as u16, node));
        }
    }
    edges
}

fn control_predecessors(kind: &ControlFlowKind) -> Vec<NodeId> {
    match kind {
        ControlFlowKind::Start | ControlFlowKind::End | ControlFlowKind::OsrStart | ControlFlowKind::OsrEnd => {
            Vec::new()
        }
        ControlFlowKind::Region(preds) => preds.to_vec(),
        ControlFlowKind::If { region, .. } => vec![*region],
        ControlFlowKind::IfTrue(x)
        | ControlFlowKind::IfFalse(x)
        | ControlFlowKind::Jump(x)
        | ControlFlowKind::LoopHeader(x)
        | ControlFlowKind::Loop(x)
        | ControlFlowKind::LoopExit(x)
        | ControlFlowKind::Success(x)
        | ControlFlowKind::Fail(x)
        | ControlFlowKind::Trap(x) => vec![*x],
        ControlFlowKind::Return { region, .. } => vec![*region],
    }
}

fn render_control_node(graph: &Graph, node: NodeId, out: &mut String, seen: &mut [bool]) {
    if seen[node.index()] {
        return;
    }
    seen[node.index()] = true;
    let label = label_of(graph, node);
    let _ = writeln!(
        out,
        "  {}[shape=box style=bold color=red label=\"{}\"]",
        node_name(node),
        label
    );
}

fn render_expr(graph: &Graph, root: NodeId, out: &mut String, seen: &mut [bool], opt: PrintOptions) {
    if seen[root.index()] {
        return;
    }
    seen[root.index()] = true;

    let is_effect = matches!(graph.get(root), Ok(NodeKind::Effect(_)));
    let label = label_of(graph, root);
    if is_effect {
        let _ = writeln!(out, "  {}[style=bold color=purple label=\"{}\"]", node_name(root), label);
    } else {
        let _ = writeln!(out, "  {}[label=\"{}\"]", node_name(root), label);
    }

    if opt.chain.render_operand() {
        if let Ok(kind) = graph.get(root) {
            for (slot, operand) in kind.operands().iter().enumerate() {
                render_expr(graph, *operand, out, seen, opt);
                let _ = writeln!(out, "  {} -> {}[label={}]", node_name(root), node_name(*operand), slot);
            }
        }
    }
    if opt.chain.render_effect() {
        if let Ok(Some(effect)) = graph.effect_edge(root) {
            render_expr(graph, effect, out, seen, opt);
            let _ = writeln!(
                out,
                "  {} -> {}[style=bold color=green]",
                node_name(root),
                node_name(effect)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ExprKind;

    #[test]
    fn prints_a_digraph_wrapper() {
        let mut g = Graph::new();
        g.new_start().unwrap();
        let out = print(&g, PrintOptions::default());
        assert!(out.starts_with("digraph IR {\n"));
        assert!(out.trim_end().ends_with('}'));
    }

    #[test]
    fn renders_control_flow_nodes_as_red_boxes() {
        let mut g = Graph::new();
        let start = g.new_start().unwrap();
        let region = g.new_region(&[start]);
        let out = print(&g, PrintOptions::default());
        assert!(out.contains(&format!("{}[shape=box", node_name(region))));
    }

    #[test]
    fn renders_the_if_condition_as_a_child_expr() {
        let mut g = Graph::new();
        let start = g.new_start().unwrap();
        let cond = g.new_expr(ExprKind::Boolean(true));
        let if_node = g.new_node(NodeKind::ControlFlow(ControlFlowKind::If { cond, region: start }));
        let out = print(&g, PrintOptions::default());
        assert!(out.contains(&format!("{} -> {}", node_name(if_node), node_name(cond))));
    }

    #[test]
    fn operand_only_chain_omits_effect_edges() {
        let mut g = Graph::new();
        let start = g.new_start().unwrap();
        let object = g.new_expr(ExprKind::Arg(0));
        let key = g.new_expr(ExprKind::Arg(1));
        let find = g.new_expr(ExprKind::ObjectFind { object, key, effect: start });
        let opt = PrintOptions { chain: Chain::Operand };
        let out = print(&g, opt);
        assert!(!out.contains(&format!("{} -> {}[style=bold color=green]", node_name(find), node_name(start))));
    }
}
