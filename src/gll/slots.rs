// Grammar slot graph - the compiled, read-only form of a grammar
//
// Every nonterminal gets a `NonterminalSlot` listing the first slot of each
// alternative. Every dotted position of a rule is a `BodySlot`; the slot
// after the last symbol is an end slot and empty alternatives get a single
// epsilon slot. Symbols become transitions between consecutive slots.

use rustc_hash::FxHashMap;
use std::fmt;
use tracing::warn;

use crate::datadependent::Expr;
use crate::error::{GrammarError, Result};
use crate::first_follow::{FirstFollowSets, LookaheadSet};
use crate::grammars::{Condition, Grammar, Rule, Symbol, SymbolKind, SymbolTable};
use crate::terminals::Terminal;

type HashMap<K, V> = FxHashMap<K, V>;

pub type SlotId = usize;
pub type NtId = usize;
pub type TermId = usize;

#[derive(Debug, Clone)]
pub struct NonterminalSlot {
    pub id: NtId,
    pub name: String,
    pub parameters: Vec<String>,
    pub first_slots: Vec<SlotId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Body,
    /// Dot after the last symbol; reaching it pops
    End(NtId),
    /// The only slot of an empty alternative
    Epsilon(NtId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Terminal {
        terminal: TermId,
        pre: Vec<Condition>,
        post: Vec<Condition>,
        label: Option<String>,
        dest: SlotId,
    },
    Nonterminal {
        callee: NtId,
        arguments: Vec<Expr>,
        pre: Vec<Condition>,
        /// Checked when a result is returned to this call site
        post: Vec<Condition>,
        label: Option<String>,
        /// Return slot
        dest: SlotId,
    },
    Conditional {
        condition: Expr,
        dest: SlotId,
        /// Else branch, or the slot after the conditional when there is none
        if_false: SlotId,
    },
}

#[derive(Debug, Clone)]
pub struct BodySlot {
    pub id: SlotId,
    pub kind: SlotKind,
    pub head: NtId,
    pub rule: usize,
    pub position: usize,
    pub transition: Option<Transition>,
    /// Lookahead admitted when entering an alternative here or returning here
    pub lookahead: LookaheadSet,
    /// Value computed when an end slot is reached
    pub returns: Option<Expr>,
    display: String,
}

impl BodySlot {
    pub fn is_end(&self) -> bool {
        matches!(self.kind, SlotKind::End(_) | SlotKind::Epsilon(_))
    }
}

impl fmt::Display for BodySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// Compiled grammar. Immutable once built, so one graph can serve any
/// number of parsers, including parsers on other threads.
#[derive(Debug, Clone)]
pub struct GrammarGraph {
    pub name: String,
    nonterminals: Vec<NonterminalSlot>,
    nonterminal_ids: SymbolTable,
    slots: Vec<BodySlot>,
    terminals: Vec<Terminal>,
    terminal_ids: HashMap<Terminal, TermId>,
    rules: Vec<Rule>,
    start: NtId,
    epsilon: TermId,
    first_follow: FirstFollowSets,
}

impl GrammarGraph {
    /// Compile `grammar`. Every structural problem is reported here, before
    /// any parse starts.
    pub fn build(grammar: &Grammar) -> Result<Self> {
        let mut nonterminal_ids = SymbolTable::new();
        nonterminal_ids.get_or_insert(&grammar.start);
        for name in grammar.nonterminals() {
            nonterminal_ids.get_or_insert(name);
        }

        if !grammar.has_nonterminal(&grammar.start) {
            return Err(GrammarError::UnknownStartSymbol(grammar.start.clone()).into());
        }
        if !grammar.parameters_of(&grammar.start).is_empty() {
            return Err(GrammarError::StartSymbolHasParameters(grammar.start.clone()).into());
        }
        for rule in &grammar.rules {
            for symbol in &rule.body {
                check_references(grammar, rule, symbol)?;
            }
        }

        let first_follow = FirstFollowSets::new(grammar);
        let mut graph = GrammarGraph {
            name: grammar.name.clone(),
            nonterminals: nonterminal_ids
                .iter()
                .map(|(id, name)| NonterminalSlot {
                    id,
                    name: name.to_string(),
                    parameters: grammar.parameters_of(name).to_vec(),
                    first_slots: Vec::new(),
                })
                .collect(),
            nonterminal_ids,
            slots: Vec::new(),
            terminals: Vec::new(),
            terminal_ids: HashMap::default(),
            rules: grammar.rules.clone(),
            start: 0,
            epsilon: 0,
            first_follow,
        };
        graph.epsilon = graph.intern_terminal(&Terminal::Epsilon);

        for (rule_index, rule) in grammar.rules.iter().enumerate() {
            graph.compile_rule(rule_index, rule)?;
        }

        let reachable = grammar.reachable_nonterminals(&grammar.start);
        for nt in &graph.nonterminals {
            if !reachable.contains(&nt.name) {
                warn!(nonterminal = %nt.name, "nonterminal is unreachable from the start symbol");
            }
        }

        Ok(graph)
    }

    fn intern_terminal(&mut self, terminal: &Terminal) -> TermId {
        if let Some(&id) = self.terminal_ids.get(terminal) {
            return id;
        }
        let id = self.terminals.len();
        self.terminals.push(terminal.clone());
        self.terminal_ids.insert(terminal.clone(), id);
        id
    }

    fn new_slot(&mut self, kind: SlotKind, head: NtId, rule: usize, position: usize, display: String) -> SlotId {
        let id = self.slots.len();
        self.slots.push(BodySlot {
            id,
            kind,
            head,
            rule,
            position,
            transition: None,
            lookahead: LookaheadSet::new(),
            returns: None,
            display,
        });
        id
    }

    fn nt_id(&self, name: &str) -> Result<NtId> {
        self.nonterminal_ids
            .get_id(name)
            .ok_or_else(|| GrammarError::InvalidRule(format!("unknown nonterminal '{}'", name)).into())
    }

    fn compile_rule(&mut self, rule_index: usize, rule: &Rule) -> Result<()> {
        let head = self.nt_id(&rule.head)?;

        if rule.body.is_empty() {
            let slot = self.new_slot(
                SlotKind::Epsilon(head),
                head,
                rule_index,
                0,
                format!("{} ::= .", rule.head),
            );
            self.slots[slot].lookahead = self.first_follow.lookahead(&rule.head, &[]);
            self.slots[slot].returns = rule.returns.clone();
            self.nonterminals[head].first_slots.push(slot);
            return Ok(());
        }

        let len = rule.body.len();
        let positions: Vec<SlotId> = (0..=len)
            .map(|k| {
                let kind = if k == len {
                    SlotKind::End(head)
                } else {
                    SlotKind::Body
                };
                self.new_slot(kind, head, rule_index, k, rule.dotted(k))
            })
            .collect();

        for (k, &slot) in positions.iter().enumerate() {
            self.slots[slot].lookahead = self.first_follow.lookahead(&rule.head, &rule.body[k..]);
        }
        self.slots[positions[len]].returns = rule.returns.clone();
        self.nonterminals[head].first_slots.push(positions[0]);

        for (k, symbol) in rule.body.iter().enumerate() {
            self.compile_symbol(symbol, positions[k], positions[k + 1])?;
        }
        Ok(())
    }

    /// Set the transition that moves the dot over `symbol` from `from` to `to`
    fn compile_symbol(&mut self, symbol: &Symbol, from: SlotId, to: SlotId) -> Result<()> {
        let transition = match &symbol.kind {
            SymbolKind::Terminal(terminal) => Transition::Terminal {
                terminal: self.intern_terminal(terminal),
                pre: symbol.pre_conditions.clone(),
                post: symbol.post_conditions.clone(),
                label: symbol.label.clone(),
                dest: to,
            },
            SymbolKind::Nonterminal { name, arguments } => Transition::Nonterminal {
                callee: self.nt_id(name)?,
                arguments: arguments.clone(),
                pre: symbol.pre_conditions.clone(),
                post: symbol.post_conditions.clone(),
                label: symbol.label.clone(),
                dest: to,
            },
            SymbolKind::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                let (head, rule, position) = {
                    let slot = &self.slots[from];
                    (slot.head, slot.rule, slot.position)
                };
                let base = self.slots[from].display.clone();

                let then_slot =
                    self.new_slot(SlotKind::Body, head, rule, position, format!("{} [then]", base));
                self.compile_symbol(then, then_slot, to)?;

                let if_false = match otherwise {
                    Some(otherwise) => {
                        let else_slot = self.new_slot(
                            SlotKind::Body,
                            head,
                            rule,
                            position,
                            format!("{} [else]", base),
                        );
                        self.compile_symbol(otherwise, else_slot, to)?;
                        else_slot
                    }
                    None => to,
                };
                Transition::Conditional {
                    condition: condition.clone(),
                    dest: then_slot,
                    if_false,
                }
            }
        };
        self.slots[from].transition = Some(transition);
        Ok(())
    }

    // ----------------------------------
    // Queries
    // ----------------------------------

    pub fn slot(&self, id: SlotId) -> &BodySlot {
        &self.slots[id]
    }

    pub fn slots(&self) -> &[BodySlot] {
        &self.slots
    }

    pub fn nonterminal(&self, id: NtId) -> &NonterminalSlot {
        &self.nonterminals[id]
    }

    pub fn nonterminals(&self) -> &[NonterminalSlot] {
        &self.nonterminals
    }

    pub fn nonterminal_id(&self, name: &str) -> Option<NtId> {
        self.nonterminal_ids.get_id(name)
    }

    pub fn nonterminal_name(&self, id: NtId) -> &str {
        &self.nonterminals[id].name
    }

    pub fn terminal(&self, id: TermId) -> &Terminal {
        &self.terminals[id]
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    pub fn terminal_id(&self, terminal: &Terminal) -> Option<TermId> {
        self.terminal_ids.get(terminal).copied()
    }

    pub fn epsilon(&self) -> TermId {
        self.epsilon
    }

    pub fn start(&self) -> NtId {
        self.start
    }

    pub fn rule(&self, index: usize) -> &Rule {
        &self.rules[index]
    }

    pub fn first_follow(&self) -> &FirstFollowSets {
        &self.first_follow
    }
}

/// Undefined nonterminals and wrong argument counts, searched through
/// conditional branches as well
fn check_references(grammar: &Grammar, rule: &Rule, symbol: &Symbol) -> Result<()> {
    match &symbol.kind {
        SymbolKind::Terminal(_) => Ok(()),
        SymbolKind::Nonterminal { name, arguments } => {
            if !grammar.has_nonterminal(name) {
                return Err(GrammarError::UndefinedNonterminal {
                    name: name.clone(),
                    rule: rule.to_string(),
                }
                .into());
            }
            let expected = grammar.parameters_of(name).len();
            if expected != arguments.len() {
                return Err(GrammarError::ArgumentCountMismatch {
                    name: name.clone(),
                    expected,
                    found: arguments.len(),
                }
                .into());
            }
            Ok(())
        }
        SymbolKind::IfThenElse {
            then, otherwise, ..
        } => {
            check_references(grammar, rule, then)?;
            if let Some(otherwise) = otherwise {
                check_references(grammar, rule, otherwise)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GLLError;
    use crate::grammars::{self, GrammarBuilder};

    #[test]
    fn test_grammar_graph_construction() {
        let json = r#"{
            "name": "nested",
            "start": "<S>",
            "rules": {
                "<S>": [["b"], ["a", "<X>", "z"]],
                "<X>": [["x", "<X>"], ["y", "<X>"], []]
            }
        }"#;
        let grammar = grammars::load_grammar_from_str(json).unwrap();
        let graph = GrammarGraph::build(&grammar).unwrap();

        println!("Grammar Graph Slots:");
        for slot in graph.slots() {
            println!("  {:>3}: {:<24} {:?} la={}", slot.id, slot.to_string(), slot.kind, slot.lookahead);
        }

        // S: 2 + 4 slots, X: 3 + 3 + 1 slots
        assert_eq!(graph.slots().len(), 13);
        assert_eq!(graph.nonterminal_name(graph.start()), "<S>");

        let x = graph.nonterminal_id("<X>").unwrap();
        let first_slots = &graph.nonterminal(x).first_slots;
        assert_eq!(first_slots.len(), 3);
        let eps = graph.slot(first_slots[2]);
        assert_eq!(eps.kind, SlotKind::Epsilon(x));
        assert!(eps.lookahead.test(Some('z')));
        assert!(!eps.lookahead.test(Some('a')));

        // S ::= a . <X> z calls <X> and returns to S ::= a <X> . z
        let s = graph.nonterminal_id("<S>").unwrap();
        let second = graph.slot(graph.nonterminal(s).first_slots[1]);
        let after_a = match &second.transition {
            Some(Transition::Terminal { dest, .. }) => *dest,
            other => panic!("expected terminal transition, got {:?}", other),
        };
        match &graph.slot(after_a).transition {
            Some(Transition::Nonterminal { callee, dest, .. }) => {
                assert_eq!(*callee, x);
                assert_eq!(graph.slot(*dest).to_string(), "<S> ::= 'a' <X> . 'z'");
                assert!(graph.slot(*dest).lookahead.test(Some('z')));
            }
            other => panic!("expected nonterminal transition, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_start_symbol() {
        let grammar = GrammarBuilder::new("g")
            .start("Missing")
            .rule("S", vec![Symbol::t('a')])
            .build();
        let err = GrammarGraph::build(&grammar).unwrap_err();
        assert!(matches!(
            err,
            GLLError::Grammar(GrammarError::UnknownStartSymbol(ref name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_undefined_nonterminal() {
        let grammar = GrammarBuilder::new("g")
            .rule("S", vec![Symbol::if_then(Expr::bool(true), Symbol::nt("B"))])
            .build();
        let err = GrammarGraph::build(&grammar).unwrap_err();
        assert!(matches!(
            err,
            GLLError::Grammar(GrammarError::UndefinedNonterminal { ref name, .. }) if name == "B"
        ));
    }

    #[test]
    fn test_argument_mismatch_and_parameterised_start() {
        let grammar = GrammarBuilder::new("g")
            .rule("S", vec![Symbol::nt("A")])
            .rule("A", vec![Symbol::t('a')])
            .parameters("A", &["n"])
            .build();
        assert!(matches!(
            GrammarGraph::build(&grammar),
            Err(GLLError::Grammar(GrammarError::ArgumentCountMismatch { expected: 1, found: 0, .. }))
        ));

        let grammar = GrammarBuilder::new("g")
            .rule("S", vec![Symbol::t('a')])
            .parameters("S", &["n"])
            .build();
        assert!(matches!(
            GrammarGraph::build(&grammar),
            Err(GLLError::Grammar(GrammarError::StartSymbolHasParameters(_)))
        ));
    }

    #[test]
    fn test_conditional_compilation() {
        let grammar = GrammarBuilder::new("cond")
            .rule(
                "S",
                vec![
                    Symbol::if_then_else(Expr::bool(true), Symbol::t('a'), Symbol::t('b')),
                    Symbol::if_then(Expr::bool(false), Symbol::t('c')),
                ],
            )
            .build();
        let graph = GrammarGraph::build(&grammar).unwrap();
        let s = graph.nonterminal_id("S").unwrap();
        let entry = graph.slot(graph.nonterminal(s).first_slots[0]);

        let (then_slot, else_slot) = match &entry.transition {
            Some(Transition::Conditional { dest, if_false, .. }) => (*dest, *if_false),
            other => panic!("expected conditional, got {:?}", other),
        };
        let join = |slot: SlotId| match &graph.slot(slot).transition {
            Some(Transition::Terminal { dest, .. }) => *dest,
            other => panic!("expected terminal, got {:?}", other),
        };
        assert_eq!(join(then_slot), join(else_slot));

        // The second conditional has no else branch and falls through to the end slot
        let second = graph.slot(join(then_slot));
        match &second.transition {
            Some(Transition::Conditional { if_false, .. }) => {
                assert_eq!(graph.slot(*if_false).kind, SlotKind::End(s));
            }
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test]
    fn test_graph_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GrammarGraph>();
    }
}
