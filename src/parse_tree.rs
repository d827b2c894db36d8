use rustc_hash::FxHashSet;
use std::fmt;

use crate::error::{GLLError, Result};
use crate::gll::sppf::{label_name, NodeLabel, SPPFNodeId, SPPF};
use crate::gll::GrammarGraph;
use crate::input::Input;

type HashSet<K> = FxHashSet<K>;

#[derive(Debug, Clone, PartialEq)]
pub enum ParseSymbol {
    NonTerminal(String),
    Terminal(String),
}

impl fmt::Display for ParseSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseSymbol::NonTerminal(s) => write!(f, "{}", s),
            ParseSymbol::Terminal(s) => write!(f, "'{}'", s),
        }
    }
}

/// A parse tree node: (name, children)
#[derive(Debug, Clone, PartialEq)]
pub struct ParseTree {
    pub name: ParseSymbol,
    pub children: Vec<ParseTree>,
}

impl ParseTree {
    pub fn new(name: ParseSymbol, children: Vec<ParseTree>) -> Self {
        ParseTree { name, children }
    }

    pub fn from_str(name: &str, children: Vec<ParseTree>) -> Self {
        ParseTree {
            name: ParseSymbol::NonTerminal(name.to_string()),
            children,
        }
    }

    /// Create a leaf node (no children)
    pub fn leaf(name: &str) -> Self {
        ParseTree {
            name: ParseSymbol::Terminal(name.to_string()),
            children: Vec::new(),
        }
    }

    /// Extract the derivation rooted at `root`.
    ///
    /// Intermediate nodes are flattened into their parent, terminal leaves
    /// carry the matched text and ε-derivations become an `ε` leaf. A node
    /// with more than one packed child yields `GLLError::Ambiguous`; a node
    /// that derives itself yields `GLLError::Cyclic`.
    pub fn from_sppf(
        sppf: &SPPF,
        graph: &GrammarGraph,
        input: &dyn Input,
        root: SPPFNodeId,
    ) -> Result<ParseTree> {
        let mut builder = TreeBuilder {
            sppf,
            graph,
            input,
            path: HashSet::default(),
        };
        builder.symbol(root)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    /// Number of nodes in the tree
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }

    /// Concatenated text of the terminal leaves, ε leaves excluded
    pub fn yield_string(&self) -> String {
        let mut out = String::new();
        self.collect_yield(&mut out);
        out
    }

    fn collect_yield(&self, out: &mut String) {
        match &self.name {
            ParseSymbol::Terminal(s) if self.children.is_empty() => {
                if s != EPSILON_LEAF {
                    out.push_str(s);
                }
            }
            _ => self.children.iter().for_each(|c| c.collect_yield(out)),
        }
    }

    /// Pretty print the tree with indentation
    pub fn pretty_print(&self) -> String {
        self.pretty_print_indent(0)
    }

    fn pretty_print_indent(&self, indent: usize) -> String {
        let prefix = "  ".repeat(indent);
        if self.children.is_empty() {
            format!("{}{}", prefix, self.name)
        } else {
            let children_str: Vec<String> = self
                .children
                .iter()
                .map(|c| c.pretty_print_indent(indent + 1))
                .collect();
            format!("{}({}\n{})", prefix, self.name, children_str.join("\n"))
        }
    }

    /// Display tree as ASCII art with box-drawing characters
    /// Output format:
    ///
    /// ```text
    /// E
    /// ├─ E
    /// │   └─ 'a'
    /// ├─ '+'
    /// └─ E
    ///     └─ 'a'
    /// ```
    pub fn display(&self) -> String {
        let mut lines = Vec::new();
        self.build_display(&mut lines, String::new(), true, true);
        lines.join("\n")
    }

    fn build_display(&self, lines: &mut Vec<String>, prefix: String, is_last: bool, is_root: bool) {
        if is_root {
            lines.push(self.name.to_string());
        } else {
            let connector = if is_last { "└─ " } else { "├─ " };
            lines.push(format!("{}{}{}", prefix, connector, self.name));
        }

        let child_prefix = if is_root {
            String::new()
        } else if is_last {
            format!("{}    ", prefix)
        } else {
            format!("{}│   ", prefix)
        };

        let num_children = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            child.build_display(lines, child_prefix.clone(), i == num_children - 1, false);
        }
    }

    /// Nested tuple rendering: ('name', [('child1', []), ('child2', [])])
    pub fn to_tuple_string(&self) -> String {
        if self.children.is_empty() {
            format!("('{}', [])", self.name)
        } else {
            let children_str: Vec<String> =
                self.children.iter().map(|c| c.to_tuple_string()).collect();
            format!("('{}', [{}])", self.name, children_str.join(", "))
        }
    }
}

pub const EPSILON_LEAF: &str = "ε";

struct TreeBuilder<'a> {
    sppf: &'a SPPF,
    graph: &'a GrammarGraph,
    input: &'a dyn Input,
    /// Nodes on the path from the root to the current node
    path: HashSet<SPPFNodeId>,
}

impl TreeBuilder<'_> {
    fn symbol(&mut self, id: SPPFNodeId) -> Result<ParseTree> {
        let node = self.sppf.get(id);
        let (left, right) = (node.left, node.right);
        match node.label {
            NodeLabel::Terminal(t) if self.graph.terminal(t).is_epsilon() => {
                Ok(ParseTree::leaf(EPSILON_LEAF))
            }
            NodeLabel::Terminal(_) => Ok(ParseTree::leaf(&self.input.substring(left, right))),
            label => {
                let mut children = Vec::new();
                self.children(id, &mut children)?;
                Ok(ParseTree::from_str(&label_name(label, self.graph), children))
            }
        }
    }

    /// Push the children of the single derivation of `id`, descending
    /// through intermediate nodes
    fn children(&mut self, id: SPPFNodeId, out: &mut Vec<ParseTree>) -> Result<()> {
        let sppf = self.sppf;
        let node = sppf.get(id);
        if self.path.contains(&id) {
            return Err(self.error(id, true));
        }
        let pack = match node.packed.as_slice() {
            [] => return Ok(()),
            [pack] => sppf.packed(*pack),
            _ => return Err(self.error(id, false)),
        };

        self.path.insert(id);
        for child in pack.left.into_iter().chain(std::iter::once(pack.right)) {
            if let NodeLabel::Intermediate(..) = sppf.get(child).label {
                self.children(child, out)?;
            } else {
                out.push(self.symbol(child)?);
            }
        }
        self.path.remove(&id);
        Ok(())
    }

    fn error(&self, id: SPPFNodeId, cyclic: bool) -> GLLError {
        let node = self.sppf.get(id);
        let label = label_name(node.label, self.graph);
        let (left, right) = (node.left, node.right);
        if cyclic {
            GLLError::Cyclic { label, left, right }
        } else {
            GLLError::Ambiguous { label, left, right }
        }
    }
}

/// Macro for convenient tree construction
/// Usage: tree!("S", [tree!("A"), tree!("B", [tree!("c")])])
#[macro_export]
macro_rules! tree {
    // Leaf node
    ($name:expr) => {
        $crate::parse_tree::ParseTree::leaf($name)
    };
    // Node with children
    ($name:expr, [$($child:expr),* $(,)?]) => {
        $crate::parse_tree::ParseTree::from_str($name, vec![$($child),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammars::{GrammarBuilder, Symbol};
    use crate::input::TextInput;
    use crate::terminals::Terminal;

    #[test]
    fn test_leaf() {
        let leaf = ParseTree::leaf("x");
        assert_eq!(leaf.name, ParseSymbol::Terminal("x".to_string()));
        assert!(leaf.is_leaf());
    }

    #[test]
    fn test_macro() {
        let tree = tree!("S", [tree!("A", [tree!("a")]), tree!("B", [tree!("b")])]);

        assert_eq!(tree.name, ParseSymbol::NonTerminal("S".to_string()));
        assert_eq!(tree.num_children(), 2);
        assert_eq!(tree.size(), 5);
        assert_eq!(tree.yield_string(), "ab");
    }

    #[test]
    fn test_display() {
        let tree = tree!("E", [tree!("E", [tree!("a")]), tree!("+"), tree!("E", [tree!("a")])]);

        println!("ASCII tree:\n{}", tree.display());
        println!("Tuple format:\n{}", tree.to_tuple_string());
        assert_eq!(
            tree.display(),
            "E\n├─ E\n│   └─ 'a'\n├─ '+'\n└─ E\n    └─ 'a'"
        );
    }

    fn self_loop_graph() -> GrammarGraph {
        let grammar = GrammarBuilder::new("loop")
            .rule("S", vec![Symbol::nt("S")])
            .rule("S", vec![Symbol::t('a')])
            .build();
        GrammarGraph::build(&grammar).unwrap()
    }

    #[test]
    fn test_from_sppf_flattens_intermediates() {
        let graph = self_loop_graph();
        let input = TextInput::new("aa");
        let s = graph.nonterminal_id("S").unwrap();
        let a = graph.terminal_id(&Terminal::Char('a')).unwrap();
        // Any slot works as a packed label here
        let slot = graph.nonterminal(s).first_slots[1];

        let mut sppf = SPPF::new();
        let a0 = sppf.terminal(a, 0, 1);
        let a1 = sppf.terminal(a, 1, 2);
        let inner = sppf.get_node(slot, None, Some(a0), a1);
        let root = sppf.nonterminal(s, None, 0, 2);
        sppf.add_packed(root, slot, None, inner);

        let tree = ParseTree::from_sppf(&sppf, &graph, &input, root).unwrap();
        assert_eq!(tree, tree!("S", [tree!("a"), tree!("a")]));
    }

    #[test]
    fn test_from_sppf_detects_cycle() {
        let graph = self_loop_graph();
        let input = TextInput::new("a");
        let s = graph.nonterminal_id("S").unwrap();
        let slot = graph.nonterminal(s).first_slots[0];

        let mut sppf = SPPF::new();
        let root = sppf.nonterminal(s, None, 0, 1);
        sppf.add_packed(root, slot, None, root);

        let err = ParseTree::from_sppf(&sppf, &graph, &input, root).unwrap_err();
        println!("{}", err);
        assert!(matches!(err, GLLError::Cyclic { left: 0, right: 1, .. }));
    }

    #[test]
    fn test_from_sppf_detects_ambiguity() {
        let graph = self_loop_graph();
        let input = TextInput::new("a");
        let s = graph.nonterminal_id("S").unwrap();
        let a = graph.terminal_id(&Terminal::Char('a')).unwrap();
        let first = graph.nonterminal(s).first_slots[0];
        let second = graph.nonterminal(s).first_slots[1];

        let mut sppf = SPPF::new();
        let leaf = sppf.terminal(a, 0, 1);
        let root = sppf.nonterminal(s, None, 0, 1);
        sppf.add_packed(root, first, None, root);
        sppf.add_packed(root, second, None, leaf);

        let err = ParseTree::from_sppf(&sppf, &graph, &input, root).unwrap_err();
        assert!(matches!(err, GLLError::Ambiguous { .. }));
    }

}
