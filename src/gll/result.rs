// Parse results and statistics

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::slots::{GrammarGraph, SlotId};
use super::sppf::{SPPFNodeId, SPPF};
use crate::error::Result;
use crate::input::Input;
use crate::parse_tree::ParseTree;

/// Aggregate counts of one parse. Timings are kept out so that two runs can
/// be compared with `==`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStatistics {
    pub descriptors: usize,
    pub gss_nodes: usize,
    pub gss_edges: usize,
    pub nonterminal_nodes: usize,
    pub terminal_nodes: usize,
    pub intermediate_nodes: usize,
    pub packed_nodes: usize,
    pub ambiguous_nodes: usize,
}

impl fmt::Display for ParseStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "descriptors: {}, GSS nodes: {}, GSS edges: {}, nonterminal nodes: {}, \
             terminal nodes: {}, intermediate nodes: {}, packed nodes: {}, ambiguous nodes: {}",
            self.descriptors,
            self.gss_nodes,
            self.gss_edges,
            self.nonterminal_nodes,
            self.terminal_nodes,
            self.intermediate_nodes,
            self.packed_nodes,
            self.ambiguous_nodes
        )
    }
}

#[derive(Debug)]
pub struct ParseSuccess {
    /// Start symbol node spanning the whole input
    pub root: SPPFNodeId,
    pub sppf: SPPF,
    pub statistics: ParseStatistics,
    pub elapsed: Duration,
}

impl ParseSuccess {
    pub fn is_ambiguous(&self) -> bool {
        self.statistics.ambiguous_nodes > 0
    }

    /// Extract the single parse tree. Fails on ambiguous forests.
    pub fn tree(&self, graph: &GrammarGraph, input: &dyn Input) -> Result<ParseTree> {
        ParseTree::from_sppf(&self.sppf, graph, input, self.root)
    }
}

/// Best-effort diagnostic: the rightmost point the parser reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// Slot reached, `None` when the start call itself had no viable
    /// alternative
    pub slot: Option<SlotId>,
    /// Dotted rule of `slot`
    pub label: String,
    pub position: usize,
    pub line: usize,
    pub column: usize,
    /// GSS node active at that point, e.g. `E@2`
    pub gss_node: String,
    pub statistics: ParseStatistics,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {} (position {}): in {} while parsing {}",
            self.line, self.column, self.position, self.label, self.gss_node
        )
    }
}

#[derive(Debug)]
pub enum ParseResult {
    Success(ParseSuccess),
    Failure(ParseFailure),
}

impl ParseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success(_))
    }

    pub fn success(&self) -> Option<&ParseSuccess> {
        match self {
            ParseResult::Success(s) => Some(s),
            ParseResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ParseFailure> {
        match self {
            ParseResult::Success(_) => None,
            ParseResult::Failure(f) => Some(f),
        }
    }

    pub fn statistics(&self) -> &ParseStatistics {
        match self {
            ParseResult::Success(s) => &s.statistics,
            ParseResult::Failure(f) => &f.statistics,
        }
    }
}
