// ----------------------------------
// Graph Structured Stack
// ----------------------------------
//
// A GSS node stands for "nonterminal called at position i (with these
// arguments)". Edges point back to the caller's node and remember the call
// site, the SPPF node built before the call and the caller's environment.
// Popped elements record every right extent (and return value) the node has
// derived so far, so that late edges can be replayed against them.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::fmt;

use super::slots::{GrammarGraph, NtId, SlotId};
use super::sppf::SPPFNodeId;
use crate::datadependent::{Environment, Value};

type HashMap<K, V> = FxHashMap<K, V>;
type HashSet<K> = FxHashSet<K>;

pub type GSSNodeId = usize;

/// GSS nodes are identified by (nonterminal, i, evaluated arguments)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GSSNodeKey {
    pub nonterminal: NtId,
    pub i: usize,
    pub arguments: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GSSEdge {
    pub dst: GSSNodeId,
    /// Slot holding the nonterminal transition that made the call. Its
    /// destination is the return slot.
    pub call: SlotId,
    pub sppf_node: Option<SPPFNodeId>,
    pub env: Environment,
}

/// Return point of a cyclic edge (destination is the node itself and no
/// SPPF node has been built yet)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnPoint {
    pub call: SlotId,
    pub env: Environment,
}

#[derive(Debug, Clone, Default)]
enum PrimaryEdge {
    #[default]
    Empty,
    Edge(GSSEdge),
    Cyclic(SmallVec<[ReturnPoint; 2]>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoppedElement {
    /// Nonterminal SPPF node spanning [i, right)
    pub sppf_node: SPPFNodeId,
    pub right: usize,
    pub value: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct GSSNode {
    pub id: GSSNodeId,
    pub key: GSSNodeKey,
    primary: PrimaryEdge,
    rest_edges: Vec<GSSEdge>,
    first_popped: Option<PoppedElement>,
    rest_popped: HashMap<(usize, Option<Value>), PoppedElement>,
}

impl GSSNode {
    fn new(id: GSSNodeId, key: GSSNodeKey) -> Self {
        GSSNode {
            id,
            key,
            primary: PrimaryEdge::Empty,
            rest_edges: Vec::new(),
            first_popped: None,
            rest_popped: HashMap::default(),
        }
    }

    pub fn nonterminal(&self) -> NtId {
        self.key.nonterminal
    }

    pub fn i(&self) -> usize {
        self.key.i
    }

    pub fn edge_count(&self) -> usize {
        let primary = match &self.primary {
            PrimaryEdge::Empty => 0,
            PrimaryEdge::Edge(_) => 1,
            PrimaryEdge::Cyclic(points) => points.len(),
        };
        primary + self.rest_edges.len()
    }

    /// All incoming edges, cyclic return points expanded into self-loops
    pub fn edges(&self) -> Vec<GSSEdge> {
        let mut edges = Vec::with_capacity(self.edge_count());
        match &self.primary {
            PrimaryEdge::Empty => {}
            PrimaryEdge::Edge(edge) => edges.push(edge.clone()),
            PrimaryEdge::Cyclic(points) => edges.extend(points.iter().map(|p| GSSEdge {
                dst: self.id,
                call: p.call,
                sppf_node: None,
                env: p.env.clone(),
            })),
        }
        edges.extend(self.rest_edges.iter().cloned());
        edges
    }

    pub fn popped_count(&self) -> usize {
        self.first_popped.iter().count() + self.rest_popped.len()
    }

    pub fn popped_elements(&self) -> Vec<PoppedElement> {
        let mut popped: Vec<PoppedElement> = self.first_popped.iter().cloned().collect();
        let mut rest: Vec<&PoppedElement> = self.rest_popped.values().collect();
        // Deterministic replay order
        rest.sort_by_key(|p| (p.right, p.sppf_node));
        popped.extend(rest.into_iter().cloned());
        popped
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self.primary, PrimaryEdge::Cyclic(_))
    }

    fn add_edge(&mut self, edge: GSSEdge) {
        let cyclic = edge.dst == self.id && edge.sppf_node.is_none();
        if cyclic {
            let point = ReturnPoint {
                call: edge.call,
                env: edge.env,
            };
            match std::mem::take(&mut self.primary) {
                PrimaryEdge::Cyclic(mut points) => {
                    points.push(point);
                    self.primary = PrimaryEdge::Cyclic(points);
                }
                PrimaryEdge::Edge(previous) => {
                    self.rest_edges.push(previous);
                    self.primary = PrimaryEdge::Cyclic(SmallVec::from_elem(point, 1));
                }
                PrimaryEdge::Empty => {
                    self.primary = PrimaryEdge::Cyclic(SmallVec::from_elem(point, 1));
                }
            }
        } else if matches!(self.primary, PrimaryEdge::Empty) {
            self.primary = PrimaryEdge::Edge(edge);
        } else {
            self.rest_edges.push(edge);
        }
    }

    fn add_popped(&mut self, popped: PoppedElement) -> bool {
        match &self.first_popped {
            None => {
                self.first_popped = Some(popped);
                true
            }
            Some(first) if first.right == popped.right && first.value == popped.value => false,
            Some(_) => {
                let key = (popped.right, popped.value.clone());
                if self.rest_popped.contains_key(&key) {
                    return false;
                }
                self.rest_popped.insert(key, popped);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GSS {
    nodes: Vec<GSSNode>,
    lookup: HashMap<GSSNodeKey, GSSNodeId>,
    edge_set: HashSet<(GSSNodeId, GSSEdge)>,
}

impl GSS {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.lookup.clear();
        self.edge_set.clear();
    }

    pub fn find(&self, key: &GSSNodeKey) -> Option<GSSNodeId> {
        self.lookup.get(key).copied()
    }

    /// Find or create; the flag tells whether the node is new
    pub fn get_or_create(&mut self, key: GSSNodeKey) -> (GSSNodeId, bool) {
        if let Some(id) = self.find(&key) {
            return (id, false);
        }
        let new_id = self.nodes.len();
        self.lookup.insert(key.clone(), new_id);
        self.nodes.push(GSSNode::new(new_id, key));
        (new_id, true)
    }

    /// Add an edge into `source`. Returns false if the same edge exists.
    pub fn add_edge(&mut self, source: GSSNodeId, edge: GSSEdge) -> bool {
        if !self.edge_set.insert((source, edge.clone())) {
            return false;
        }
        self.nodes[source].add_edge(edge);
        true
    }

    /// Record a derived result. Returns false when a result with the same
    /// right extent and value was already recorded.
    pub fn add_popped(&mut self, node: GSSNodeId, popped: PoppedElement) -> bool {
        self.nodes[node].add_popped(popped)
    }

    pub fn get(&self, id: GSSNodeId) -> &GSSNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_set.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GSSNode> {
        self.nodes.iter()
    }

    pub fn describe(&self, id: GSSNodeId, graph: &GrammarGraph) -> String {
        let node = self.get(id);
        let name = graph.nonterminal_name(node.nonterminal());
        match &node.key.arguments {
            Some(args) => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                format!("{}({})@{}", name, args.join(", "), node.i())
            }
            None => format!("{}@{}", name, node.i()),
        }
    }
}

impl fmt::Display for GSSNodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}@{}", self.nonterminal, self.i)
    }
}
