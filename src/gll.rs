// ----------------------------------
// GLL Parser
// ----------------------------------
//
// The runtime owns the registers of the algorithm (current slot, input
// position, GSS node, SPPF node, environment) and the three per-parse
// stores. One loop drains the descriptor worklist; everything else happens
// synchronously inside descriptor execution.

pub mod descriptor;
pub mod gss;
pub mod result;
pub mod slots;
pub mod sppf;

use smallvec::SmallVec;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use crate::config::Configuration;
use crate::datadependent::{
    left_extent_name, right_extent_name, DefaultEvaluator, Environment, EvalResult, Evaluator,
    Expr, Value,
};
use crate::error::{GLLError, Result};
use crate::grammars::Condition;
use crate::input::{Input, TextInput};

pub use descriptor::{Descriptor, DescriptorScheduler};
pub use gss::{GSSEdge, GSSNodeId, GSSNodeKey, PoppedElement, GSS};
pub use result::{ParseFailure, ParseResult, ParseStatistics, ParseSuccess};
pub use slots::{BodySlot, GrammarGraph, NonterminalSlot, NtId, SlotId, SlotKind, TermId, Transition};
pub use sppf::{ArgsId, NodeLabel, PackedId, SPPFNode, SPPFNodeId, SPPF};

/// Rightmost point reached, for failure reports
#[derive(Debug, Clone, Copy)]
struct Rightmost {
    slot: Option<SlotId>,
    i: usize,
    sn: Option<GSSNodeId>,
}

pub struct GLLParser<'g> {
    graph: &'g GrammarGraph,
    config: Configuration,
    evaluator: Arc<dyn Evaluator>,

    scheduler: DescriptorScheduler,
    gss: GSS,
    sppf: SPPF,

    // Global context
    /// Grammar slot
    gn: SlotId,
    /// Input position
    i: usize,
    /// GSS node index
    sn: GSSNodeId,
    /// SPPF node index
    dn: Option<SPPFNodeId>,
    env: Environment,

    rightmost: Option<Rightmost>,
}

impl<'g> GLLParser<'g> {
    pub fn new(graph: &'g GrammarGraph) -> Self {
        Self::with_config(graph, Configuration::default())
    }

    pub fn with_config(graph: &'g GrammarGraph, config: Configuration) -> Self {
        GLLParser {
            graph,
            scheduler: DescriptorScheduler::new(config.scheduling, config.shortcut),
            env: Environment::empty(config.environment),
            config,
            evaluator: Arc::new(DefaultEvaluator),
            gss: GSS::new(),
            sppf: SPPF::new(),
            gn: 0,
            i: 0,
            sn: 0,
            dn: None,
            rightmost: None,
        }
    }

    /// Replace the expression evaluator used by conditions, arguments and
    /// return values
    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn graph(&self) -> &'g GrammarGraph {
        self.graph
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// GSS of the last parse
    pub fn gss(&self) -> &GSS {
        &self.gss
    }

    fn initialisation(&mut self) {
        self.scheduler.clear();
        self.gss.clear();
        self.sppf.clear();
        self.gn = 0;
        self.i = 0;
        self.sn = 0;
        self.dn = None;
        self.env = Environment::empty(self.config.environment);
        self.rightmost = None;
    }

    pub fn parse_str(&mut self, text: &str) -> Result<ParseResult> {
        self.parse(&TextInput::new(text))
    }

    /// Parse `input` from the graph's start symbol.
    ///
    /// `Ok(Failure)` means the input is not in the language; `Err` means the
    /// grammar itself is broken (e.g. a condition that is not boolean).
    pub fn parse(&mut self, input: &dyn Input) -> Result<ParseResult> {
        let started = Instant::now();
        let graph = self.graph;
        self.initialisation();

        let start = graph.start();
        debug!(
            grammar = %graph.name,
            start = graph.nonterminal_name(start),
            input_length = input.len(),
            "parse started"
        );

        let start_env = Environment::empty(self.config.environment);
        if self.create(input, start, None, start_env)?.is_none() {
            self.rightmost = Some(Rightmost {
                slot: None,
                i: 0,
                sn: None,
            });
        }

        while self.dequeue_descriptor() {
            trace!(slot = %graph.slot(self.gn), i = self.i, gss = self.sn, "descriptor");
            self.record_position();
            self.execute(input)?;
        }

        let statistics = self.statistics();
        let root = self
            .sppf
            .lookup(NodeLabel::Nonterminal(start, None), 0, input.len());
        let elapsed = started.elapsed();
        debug!(success = root.is_some(), %statistics, ?elapsed, "parse finished");

        Ok(match root {
            Some(root) => ParseResult::Success(ParseSuccess {
                root,
                sppf: std::mem::take(&mut self.sppf),
                statistics,
                elapsed,
            }),
            None => ParseResult::Failure(self.failure(input, statistics)),
        })
    }

    /// Get the next descriptor and unload its fields into the registers.
    /// Returns false if the worklist is empty.
    fn dequeue_descriptor(&mut self) -> bool {
        match self.scheduler.dequeue_descriptor() {
            Some(desc) => {
                self.gn = desc.gn;
                self.i = desc.i;
                self.sn = desc.sn;
                self.dn = desc.dn;
                self.env = desc.env;
                true
            }
            None => false,
        }
    }

    /// Run the current slot's transitions until the thread of control calls
    /// a nonterminal, pops, or is rejected
    fn execute(&mut self, input: &dyn Input) -> Result<()> {
        let graph = self.graph;
        loop {
            let slot = graph.slot(self.gn);
            let Some(transition) = &slot.transition else {
                if let SlotKind::Epsilon(_) = slot.kind {
                    self.dn = Some(self.sppf.terminal(graph.epsilon(), self.i, self.i));
                }
                return self.ret(input);
            };

            match transition {
                Transition::Terminal {
                    terminal,
                    pre,
                    post,
                    label,
                    dest,
                } => {
                    if !self.check_conditions(input, pre, self.i, self.i, &self.env)? {
                        return Ok(());
                    }
                    let Some(right) = graph.terminal(*terminal).match_at(input, self.i) else {
                        self.record_position();
                        return Ok(());
                    };
                    let env = match label {
                        Some(x) => self.env.declare([
                            (left_extent_name(x), Value::from(self.i)),
                            (right_extent_name(x), Value::from(right)),
                            (x.clone(), Value::Str(input.substring(self.i, right))),
                        ]),
                        None => self.env.clone(),
                    };
                    if !self.check_conditions(input, post, self.i, right, &env)? {
                        return Ok(());
                    }
                    let leaf = self.sppf.terminal(*terminal, self.i, right);
                    let args = self.call_arguments(self.sn);
                    self.dn = Some(self.sppf.get_node(*dest, args, self.dn, leaf));
                    self.i = right;
                    self.gn = *dest;
                    self.env = env;
                }
                Transition::Nonterminal {
                    callee,
                    arguments,
                    pre,
                    label,
                    ..
                } => {
                    if !self.check_conditions(input, pre, self.i, self.i, &self.env)? {
                        return Ok(());
                    }
                    let env = match label {
                        Some(x) => self.env.declare([(left_extent_name(x), Value::from(self.i))]),
                        None => self.env.clone(),
                    };
                    let arguments = if graph.nonterminal(*callee).parameters.is_empty() {
                        None
                    } else {
                        Some(
                            arguments
                                .iter()
                                .map(|arg| self.evaluator.evaluate(arg, &env))
                                .collect::<EvalResult<Vec<Value>>>()?,
                        )
                    };
                    return self.call(input, *callee, arguments, env);
                }
                Transition::Conditional {
                    condition,
                    dest,
                    if_false,
                } => {
                    self.gn = if self.evaluate_condition(condition, &self.env)? {
                        *dest
                    } else {
                        *if_false
                    };
                }
            }
        }
    }

    /// Create the GSS node for calling `nt` at the current position, and
    /// schedule the alternatives whose lookahead admits the next symbol.
    /// Returns `None` when no alternative can start here (dead call).
    fn create(
        &mut self,
        input: &dyn Input,
        nt: NtId,
        arguments: Option<Vec<Value>>,
        callee_env: Environment,
    ) -> Result<Option<GSSNodeId>> {
        let graph = self.graph;
        let key = GSSNodeKey {
            nonterminal: nt,
            i: self.i,
            arguments,
        };
        if let Some(id) = self.gss.find(&key) {
            return Ok(Some(id));
        }

        let next = input.next_symbol(self.i);
        let first_slots: SmallVec<[SlotId; 4]> = graph
            .nonterminal(nt)
            .first_slots
            .iter()
            .copied()
            .filter(|&s| graph.slot(s).lookahead.test(next))
            .collect();
        if first_slots.is_empty() {
            trace!(nonterminal = graph.nonterminal_name(nt), i = self.i, "dead call");
            return Ok(None);
        }

        let (id, _) = self.gss.get_or_create(key);
        trace!(node = %self.gss.describe(id, graph), "GSS node created");
        for gn in first_slots {
            self.scheduler.queue_descriptor(Descriptor {
                gn,
                i: self.i,
                sn: id,
                dn: None,
                env: callee_env.clone(),
            });
        }
        Ok(Some(id))
    }

    /// Call `callee` from the current slot, replaying results the callee
    /// node has already produced
    fn call(
        &mut self,
        input: &dyn Input,
        callee: NtId,
        arguments: Option<Vec<Value>>,
        env: Environment,
    ) -> Result<()> {
        let graph = self.graph;
        let callee_env = match &arguments {
            Some(values) => Environment::empty(self.config.environment).declare(
                graph
                    .nonterminal(callee)
                    .parameters
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned()),
            ),
            None => Environment::empty(self.config.environment),
        };

        let Some(node) = self.create(input, callee, arguments, callee_env)? else {
            self.record_position();
            return Ok(());
        };

        let edge = GSSEdge {
            dst: self.sn,
            call: self.gn,
            sppf_node: self.dn,
            env,
        };
        if !self.gss.add_edge(node, edge.clone()) {
            return Ok(());
        }
        trace!(
            from = %self.gss.describe(node, graph),
            to = %self.gss.describe(self.sn, graph),
            call = %graph.slot(self.gn),
            "GSS edge added"
        );

        let callee_node = self.gss.get(node);
        let left = callee_node.i();
        let popped = callee_node.popped_elements();
        let single = popped.len() == 1;
        for element in &popped {
            self.propagate(input, &edge, left, element, single)?;
        }
        Ok(())
    }

    /// Pop: the current GSS node's nonterminal has been derived up to `i`
    fn ret(&mut self, input: &dyn Input) -> Result<()> {
        let graph = self.graph;
        let slot = graph.slot(self.gn);
        let head = slot.head;

        let child = match self.dn {
            Some(dn) => dn,
            None => self.sppf.terminal(graph.epsilon(), self.i, self.i),
        };
        let left = self.gss.get(self.sn).i();
        let args = self.call_arguments(self.sn);
        let node = self.sppf.nonterminal(head, args, left, self.i);
        self.sppf.add_packed(node, self.gn, None, child);

        let value = match &slot.returns {
            Some(expr) => Some(self.evaluator.evaluate(expr, &self.env)?),
            None => None,
        };
        let element = PoppedElement {
            sppf_node: node,
            right: self.i,
            value,
        };
        if !self.gss.add_popped(self.sn, element.clone()) {
            return Ok(());
        }
        trace!(node = %self.gss.describe(self.sn, graph), right = self.i, "pop");

        let edges = self.gss.get(self.sn).edges();
        let single = edges.len() == 1;
        for edge in &edges {
            self.propagate(input, edge, left, &element, single)?;
        }
        Ok(())
    }

    /// Continue the caller behind `edge` with a result of the callee.
    /// Pop-conditions and the return slot's lookahead may reject it.
    fn propagate(
        &mut self,
        input: &dyn Input,
        edge: &GSSEdge,
        left: usize,
        element: &PoppedElement,
        immediate: bool,
    ) -> Result<()> {
        let graph = self.graph;
        let Some(Transition::Nonterminal {
            post, label, dest, ..
        }) = &graph.slot(edge.call).transition
        else {
            return Ok(());
        };
        let right = element.right;

        let env = match label {
            Some(x) => edge.env.declare([
                (x.clone(), element.value.clone().unwrap_or_default()),
                (right_extent_name(x), Value::from(right)),
            ]),
            None => edge.env.clone(),
        };
        if !self.check_conditions(input, post, left, right, &env)? {
            return Ok(());
        }
        if !graph.slot(*dest).lookahead.test(input.next_symbol(right)) {
            return Ok(());
        }

        let args = self.call_arguments(edge.dst);
        let dn = self.sppf.get_node(*dest, args, edge.sppf_node, element.sppf_node);
        let desc = Descriptor {
            gn: *dest,
            i: right,
            sn: edge.dst,
            dn: Some(dn),
            env,
        };
        if immediate {
            self.scheduler.queue_immediate(desc);
        } else {
            self.scheduler.queue_descriptor(desc);
        }
        Ok(())
    }

    /// Interned arguments of the call behind GSS node `sn`
    fn call_arguments(&mut self, sn: GSSNodeId) -> Option<ArgsId> {
        match self.gss.get(sn).key.arguments.as_deref() {
            Some(values) => Some(self.sppf.intern_arguments(values)),
            None => None,
        }
    }

    fn check_conditions(
        &self,
        input: &dyn Input,
        conditions: &[Condition],
        left: usize,
        right: usize,
        env: &Environment,
    ) -> Result<bool> {
        for condition in conditions {
            if !condition.holds(input, left, right, env, self.evaluator.as_ref())? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate_condition(&self, condition: &Expr, env: &Environment) -> Result<bool> {
        match self.evaluator.evaluate(condition, env)? {
            Value::Bool(b) => Ok(b),
            other => Err(GLLError::NotBoolean {
                expression: condition.to_string(),
                value: other.to_string(),
            }),
        }
    }

    fn record_position(&mut self) {
        let sn = (!self.gss.is_empty()).then_some(self.sn);
        match self.rightmost {
            Some(r) if r.i >= self.i => {}
            _ => {
                self.rightmost = Some(Rightmost {
                    slot: Some(self.gn),
                    i: self.i,
                    sn,
                })
            }
        }
    }

    fn statistics(&self) -> ParseStatistics {
        ParseStatistics {
            descriptors: self.scheduler.seen_count(),
            gss_nodes: self.gss.len(),
            gss_edges: self.gss.edge_count(),
            nonterminal_nodes: self.sppf.count_nonterminals(),
            terminal_nodes: self.sppf.count_terminals(),
            intermediate_nodes: self.sppf.count_intermediates(),
            packed_nodes: self.sppf.packed_count(),
            ambiguous_nodes: self.sppf.ambiguous_nodes().len(),
        }
    }

    fn failure(&self, input: &dyn Input, statistics: ParseStatistics) -> ParseFailure {
        let graph = self.graph;
        let rightmost = self.rightmost.unwrap_or(Rightmost {
            slot: None,
            i: 0,
            sn: None,
        });
        let (line, column) = input.line_column(rightmost.i);
        let gss_node = match rightmost.sn {
            Some(sn) => self.gss.describe(sn, graph),
            None => format!("{}@{}", graph.nonterminal_name(graph.start()), 0),
        };
        let label = match rightmost.slot {
            Some(slot) => graph.slot(slot).to_string(),
            None => graph.nonterminal_name(graph.start()).to_string(),
        };
        ParseFailure {
            slot: rightmost.slot,
            label,
            position: rightmost.i,
            line,
            column,
            gss_node,
            statistics,
        }
    }
}

#[cfg(test)]
#[path = "gll/gll_tests.rs"]
mod tests;
