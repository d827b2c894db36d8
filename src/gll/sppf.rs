// --------------------------------
// Shared Packed Parse Forest (SPPF)
// --------------------------------
//
// Symbol and intermediate nodes are interned by (label, left, right), packed
// nodes by (parent, slot, pivot). Two derivations of the same span therefore
// always end up as packed children of one node. Nonterminal and intermediate
// labels carry the arguments of the call they were derived in, so calls of a
// parameterised nonterminal with different arguments never share a node.

use rustc_hash::FxHashMap;
use std::fmt;

use super::slots::{GrammarGraph, NtId, SlotId, TermId};
use crate::datadependent::Value;

type HashMap<K, V> = FxHashMap<K, V>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SPPFNodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackedId(pub usize);

/// Interned argument list of a parameterised call
pub type ArgsId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeLabel {
    Terminal(TermId),
    /// Nonterminal, with the arguments it was called with
    Nonterminal(NtId, Option<ArgsId>),
    /// Partially recognised rule body, labeled with the slot after the last
    /// recognised symbol and the arguments of the enclosing call
    Intermediate(SlotId, Option<ArgsId>),
}

#[derive(Debug, Clone)]
pub struct SPPFNode {
    pub label: NodeLabel,
    pub left: usize,
    pub right: usize,
    pub packed: Vec<PackedId>,
}

impl SPPFNode {
    pub fn is_ambiguous(&self) -> bool {
        self.packed.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct PackedNode {
    pub parent: SPPFNodeId,
    pub slot: SlotId,
    pub pivot: usize,
    pub left: Option<SPPFNodeId>,
    pub right: SPPFNodeId,
}

#[derive(Debug, Clone, Default)]
pub struct SPPF {
    nodes: Vec<SPPFNode>,
    packed_nodes: Vec<PackedNode>,
    lookup_nodes: HashMap<(NodeLabel, usize, usize), SPPFNodeId>,
    lookup_packs: HashMap<(SPPFNodeId, SlotId, usize), PackedId>,
    arguments: Vec<Vec<Value>>,
    lookup_arguments: HashMap<Vec<Value>, ArgsId>,
}

impl SPPF {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.packed_nodes.clear();
        self.lookup_nodes.clear();
        self.lookup_packs.clear();
        self.arguments.clear();
        self.lookup_arguments.clear();
    }

    /// Intern the evaluated arguments of a call
    pub fn intern_arguments(&mut self, values: &[Value]) -> ArgsId {
        if let Some(&id) = self.lookup_arguments.get(values) {
            return id;
        }
        let id = self.arguments.len();
        self.arguments.push(values.to_vec());
        self.lookup_arguments.insert(values.to_vec(), id);
        id
    }

    pub fn arguments(&self, id: ArgsId) -> &[Value] {
        &self.arguments[id]
    }

    /// Find or create a node
    pub fn find(&mut self, label: NodeLabel, left: usize, right: usize) -> SPPFNodeId {
        let nodes = &mut self.nodes;
        *self
            .lookup_nodes
            .entry((label, left, right))
            .or_insert_with(|| {
                let new_id = SPPFNodeId(nodes.len());
                nodes.push(SPPFNode {
                    label,
                    left,
                    right,
                    packed: Vec::new(),
                });
                new_id
            })
    }

    /// Look a node up without creating it
    pub fn lookup(&self, label: NodeLabel, left: usize, right: usize) -> Option<SPPFNodeId> {
        self.lookup_nodes.get(&(label, left, right)).copied()
    }

    pub fn terminal(&mut self, terminal: TermId, left: usize, right: usize) -> SPPFNodeId {
        self.find(NodeLabel::Terminal(terminal), left, right)
    }

    pub fn nonterminal(
        &mut self,
        nt: NtId,
        args: Option<ArgsId>,
        left: usize,
        right: usize,
    ) -> SPPFNodeId {
        self.find(NodeLabel::Nonterminal(nt, args), left, right)
    }

    pub fn intermediate(
        &mut self,
        slot: SlotId,
        args: Option<ArgsId>,
        left: usize,
        right: usize,
    ) -> SPPFNodeId {
        self.find(NodeLabel::Intermediate(slot, args), left, right)
    }

    /// Attach a derivation to `parent`. The pivot is the left child's right
    /// extent, or the right child's left extent when there is no left child.
    /// Returns the packed node and whether it is new.
    pub fn add_packed(
        &mut self,
        parent: SPPFNodeId,
        slot: SlotId,
        left: Option<SPPFNodeId>,
        right: SPPFNodeId,
    ) -> (PackedId, bool) {
        let pivot = match left {
            Some(id) => self.nodes[id.0].right,
            None => self.nodes[right.0].left,
        };
        if let Some(&existing) = self.lookup_packs.get(&(parent, slot, pivot)) {
            return (existing, false);
        }
        let pack_id = PackedId(self.packed_nodes.len());
        self.packed_nodes.push(PackedNode {
            parent,
            slot,
            pivot,
            left,
            right,
        });
        self.lookup_packs.insert((parent, slot, pivot), pack_id);
        self.nodes[parent.0].packed.push(pack_id);
        (pack_id, true)
    }

    /// The node for a body that has recognised `right` after `left`:
    /// `right` itself at the start of a body, otherwise an intermediate node
    /// of the call with arguments `args`
    pub fn get_node(
        &mut self,
        slot: SlotId,
        args: Option<ArgsId>,
        left: Option<SPPFNodeId>,
        right: SPPFNodeId,
    ) -> SPPFNodeId {
        match left {
            None => right,
            Some(w) => {
                let l = self.nodes[w.0].left;
                let r = self.nodes[right.0].right;
                let node = self.intermediate(slot, args, l, r);
                self.add_packed(node, slot, Some(w), right);
                node
            }
        }
    }

    pub fn get(&self, id: SPPFNodeId) -> &SPPFNode {
        &self.nodes[id.0]
    }

    pub fn packed(&self, id: PackedId) -> &PackedNode {
        &self.packed_nodes[id.0]
    }

    pub fn packed_children(&self, id: SPPFNodeId) -> impl Iterator<Item = &PackedNode> {
        self.nodes[id.0].packed.iter().map(|p| &self.packed_nodes[p.0])
    }

    pub fn nodes(&self) -> impl Iterator<Item = (SPPFNodeId, &SPPFNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (SPPFNodeId(i), n))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn packed_count(&self) -> usize {
        self.packed_nodes.len()
    }

    pub fn count_terminals(&self) -> usize {
        self.count(|l| matches!(l, NodeLabel::Terminal(_)))
    }

    pub fn count_nonterminals(&self) -> usize {
        self.count(|l| matches!(l, NodeLabel::Nonterminal(..)))
    }

    pub fn count_intermediates(&self) -> usize {
        self.count(|l| matches!(l, NodeLabel::Intermediate(..)))
    }

    pub fn ambiguous_nodes(&self) -> Vec<SPPFNodeId> {
        self.nodes()
            .filter(|(_, n)| n.is_ambiguous())
            .map(|(id, _)| id)
            .collect()
    }

    fn count<F: Fn(NodeLabel) -> bool>(&self, pred: F) -> usize {
        self.nodes.iter().filter(|n| pred(n.label)).count()
    }

    /// Human readable name of a node, e.g. `E [0, 3)` or `E(1, 0) [0, 3)`
    pub fn describe(&self, id: SPPFNodeId, graph: &GrammarGraph) -> String {
        let node = self.get(id);
        let args = match node.label {
            NodeLabel::Nonterminal(_, Some(args)) => {
                let values: Vec<String> = self.arguments(args).iter().map(|v| v.to_string()).collect();
                format!("({})", values.join(", "))
            }
            _ => String::new(),
        };
        format!("{}{} [{}, {})", label_name(node.label, graph), args, node.left, node.right)
    }

    /// Graphviz rendering of the forest
    pub fn to_dot(&self, graph: &GrammarGraph) -> String {
        let mut out = String::from("digraph sppf {\n");
        for (id, node) in self.nodes() {
            let shape = match node.label {
                NodeLabel::Intermediate(..) => "box",
                _ => "ellipse",
            };
            out.push_str(&format!(
                "  n{} [label=\"{}\", shape={}];\n",
                id.0,
                self.describe(id, graph).replace('"', "\\\""),
                shape
            ));
            for &pack_id in &node.packed {
                let pack = self.packed(pack_id);
                out.push_str(&format!("  p{} [label=\"{}\", shape=point];\n", pack_id.0, pack.pivot));
                out.push_str(&format!("  n{} -> p{};\n", id.0, pack_id.0));
                if let Some(left) = pack.left {
                    out.push_str(&format!("  p{} -> n{};\n", pack_id.0, left.0));
                }
                out.push_str(&format!("  p{} -> n{};\n", pack_id.0, pack.right.0));
            }
        }
        out.push_str("}\n");
        out
    }
}

pub fn label_name(label: NodeLabel, graph: &GrammarGraph) -> String {
    match label {
        NodeLabel::Terminal(t) => graph.terminal(t).to_string(),
        NodeLabel::Nonterminal(nt, _) => graph.nonterminal_name(nt).to_string(),
        NodeLabel::Intermediate(slot, _) => graph.slot(slot).to_string(),
    }
}

impl fmt::Display for SPPFNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
