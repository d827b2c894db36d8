// FIRST/FOLLOW/nullable sets over character classes
//
// Used to attach a lookahead test to every alternative entry and every
// return slot of the grammar graph.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

use crate::grammars::{referenced_nonterminals, Grammar, Symbol, SymbolKind};
use crate::terminals::CharClass;

type HashMap<K, V> = FxHashMap<K, V>;
type HashSet<K> = FxHashSet<K>;

/// Set of lookahead symbols: characters, end of input, or anything
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookaheadSet {
    pub chars: CharClass,
    pub eof: bool,
    /// A terminal with unknown FIRST set was involved; every lookahead passes
    pub any: bool,
}

impl LookaheadSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn any() -> Self {
        LookaheadSet {
            any: true,
            ..Self::default()
        }
    }

    pub fn eof() -> Self {
        LookaheadSet {
            eof: true,
            ..Self::default()
        }
    }

    pub fn from_class(chars: CharClass) -> Self {
        LookaheadSet {
            chars,
            ..Self::default()
        }
    }

    /// Add `other` to this set, returning whether anything changed
    pub fn union(&mut self, other: &LookaheadSet) -> bool {
        let before = self.clone();
        self.chars.union(&other.chars);
        self.eof |= other.eof;
        self.any |= other.any;
        *self != before
    }

    /// Does the set admit `next` (`None` is end of input)?
    pub fn test(&self, next: Option<char>) -> bool {
        if self.any {
            return true;
        }
        match next {
            Some(c) => self.chars.contains(c),
            None => self.eof,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty() && !self.eof && !self.any
    }
}

impl fmt::Display for LookaheadSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.any {
            return write!(f, "{{any}}");
        }
        write!(f, "{{{}", self.chars)?;
        if self.eof {
            write!(f, ", $")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone)]
pub struct FirstFollowSets {
    nullable: HashSet<String>,
    first: HashMap<String, LookaheadSet>,
    follow: HashMap<String, LookaheadSet>,
}

impl FirstFollowSets {
    pub fn new(grammar: &Grammar) -> Self {
        let mut sets = FirstFollowSets {
            nullable: HashSet::default(),
            first: HashMap::default(),
            follow: HashMap::default(),
        };
        for name in grammar.nonterminals() {
            sets.first.insert(name.to_string(), LookaheadSet::new());
            sets.follow.insert(name.to_string(), LookaheadSet::new());
        }
        sets.compute_nullable(grammar);
        sets.compute_first(grammar);
        sets.compute_follow(grammar);
        sets
    }

    fn compute_nullable(&mut self, grammar: &Grammar) {
        let mut changed = true;
        while changed {
            changed = false;
            for rule in &grammar.rules {
                if !self.nullable.contains(&rule.head) && self.sequence_nullable(&rule.body) {
                    self.nullable.insert(rule.head.clone());
                    changed = true;
                }
            }
        }
    }

    fn compute_first(&mut self, grammar: &Grammar) {
        let mut changed = true;
        while changed {
            changed = false;
            for rule in &grammar.rules {
                let first = self.sequence_first(&rule.body);
                if let Some(entry) = self.first.get_mut(&rule.head) {
                    changed |= entry.union(&first);
                }
            }
        }
    }

    fn compute_follow(&mut self, grammar: &Grammar) {
        if let Some(start) = self.follow.get_mut(&grammar.start) {
            start.eof = true;
        }
        let mut changed = true;
        while changed {
            changed = false;
            for rule in &grammar.rules {
                for (k, symbol) in rule.body.iter().enumerate() {
                    let rest = &rule.body[k + 1..];
                    let mut follow = self.sequence_first(rest);
                    if self.sequence_nullable(rest) {
                        if let Some(head_follow) = self.follow.get(&rule.head) {
                            follow.union(head_follow);
                        }
                    }

                    let mut targets = Vec::new();
                    referenced_nonterminals(symbol, &mut |n| targets.push(n.to_string()));
                    for target in targets {
                        if let Some(entry) = self.follow.get_mut(&target) {
                            changed |= entry.union(&follow);
                        }
                    }
                }
            }
        }
    }

    pub fn is_nullable(&self, name: &str) -> bool {
        self.nullable.contains(name)
    }

    pub fn first(&self, name: &str) -> Option<&LookaheadSet> {
        self.first.get(name)
    }

    pub fn follow(&self, name: &str) -> Option<&LookaheadSet> {
        self.follow.get(name)
    }

    pub fn symbol_nullable(&self, symbol: &Symbol) -> bool {
        match &symbol.kind {
            SymbolKind::Terminal(t) => t.nullable(),
            SymbolKind::Nonterminal { name, .. } => self.nullable.contains(name),
            SymbolKind::IfThenElse {
                then, otherwise, ..
            } => {
                self.symbol_nullable(then)
                    || otherwise.as_ref().map_or(true, |o| self.symbol_nullable(o))
            }
        }
    }

    pub fn symbol_first(&self, symbol: &Symbol) -> LookaheadSet {
        match &symbol.kind {
            SymbolKind::Terminal(t) => match t.first() {
                Some(class) => LookaheadSet::from_class(class),
                None => LookaheadSet::any(),
            },
            SymbolKind::Nonterminal { name, .. } => {
                self.first.get(name).cloned().unwrap_or_default()
            }
            SymbolKind::IfThenElse {
                then, otherwise, ..
            } => {
                let mut first = self.symbol_first(then);
                if let Some(otherwise) = otherwise {
                    first.union(&self.symbol_first(otherwise));
                }
                first
            }
        }
    }

    pub fn sequence_nullable(&self, symbols: &[Symbol]) -> bool {
        symbols.iter().all(|s| self.symbol_nullable(s))
    }

    pub fn sequence_first(&self, symbols: &[Symbol]) -> LookaheadSet {
        let mut first = LookaheadSet::new();
        for symbol in symbols {
            first.union(&self.symbol_first(symbol));
            if !self.symbol_nullable(symbol) {
                break;
            }
        }
        first
    }

    /// FIRST(rest), plus FOLLOW(head) when `rest` can derive ε
    pub fn lookahead(&self, head: &str, rest: &[Symbol]) -> LookaheadSet {
        let mut set = self.sequence_first(rest);
        if self.sequence_nullable(rest) {
            if let Some(follow) = self.follow.get(head) {
                set.union(follow);
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammars::GrammarBuilder;

    fn expr_grammar() -> Grammar {
        GrammarBuilder::new("expr")
            .rule("E", vec![Symbol::nt("E"), Symbol::t('+'), Symbol::nt("E")])
            .rule("E", vec![Symbol::t('a')])
            .build()
    }

    #[test]
    fn test_expression_sets() {
        let sets = FirstFollowSets::new(&expr_grammar());
        assert!(!sets.is_nullable("E"));
        assert_eq!(sets.first("E").unwrap().chars, CharClass::single('a'));

        let follow = sets.follow("E").unwrap();
        assert!(follow.eof);
        assert!(follow.test(Some('+')));
        assert!(!follow.test(Some('a')));
        println!("FOLLOW(E) = {}", follow);
    }

    #[test]
    fn test_nullable_propagation() {
        let grammar = GrammarBuilder::new("aab")
            .rule("S", vec![Symbol::nt("A"), Symbol::nt("A"), Symbol::t('b')])
            .rule("A", vec![Symbol::t('a')])
            .rule("A", vec![])
            .build();
        let sets = FirstFollowSets::new(&grammar);

        assert!(sets.is_nullable("A"));
        assert!(!sets.is_nullable("S"));
        assert_eq!(
            sets.first("S").unwrap().chars,
            CharClass::from_ranges([('a', 'b')])
        );
        let follow_a = sets.follow("A").unwrap();
        assert!(follow_a.test(Some('a')));
        assert!(follow_a.test(Some('b')));
        assert!(!follow_a.test(None));

        // S ::= A . A b
        let la = sets.lookahead("S", &grammar.rules[0].body[1..]);
        assert!(la.test(Some('a')) && la.test(Some('b')));
        // A ::= .
        let la = sets.lookahead("A", &[]);
        assert_eq!(&la, follow_a);
    }

    #[test]
    fn test_unknown_first_is_any() {
        #[derive(Debug)]
        struct Anything;
        impl crate::terminals::Matcher for Anything {
            fn name(&self) -> String {
                "anything".to_string()
            }
            fn match_at(&self, input: &dyn crate::input::Input, i: usize) -> Option<usize> {
                (i < input.len()).then_some(i + 1)
            }
        }

        let grammar = GrammarBuilder::new("custom")
            .rule("S", vec![Symbol::t(crate::terminals::Terminal::custom(Anything))])
            .build();
        let sets = FirstFollowSets::new(&grammar);
        assert!(sets.first("S").unwrap().test(Some('?')));
    }

    #[test]
    fn test_lookahead_union_reports_change() {
        let mut set = LookaheadSet::from_class(CharClass::single('a'));
        assert!(!set.union(&LookaheadSet::from_class(CharClass::single('a'))));
        assert!(set.union(&LookaheadSet::from_class(CharClass::single('b'))));
        assert!(set.union(&LookaheadSet::eof()));
        assert!(!set.union(&LookaheadSet::eof()));
        assert!(!set.is_empty());
    }
}
