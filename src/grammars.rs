// Grammars module - grammar model, builder and JSON loading
//
// A `Grammar` is the rule set handed to `GrammarGraph::build`. Nonterminals
// are identified by name; terminals are `Terminal` matchers.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::datadependent::{Environment, Evaluator, Expr, Value};
use crate::error::{GLLError, GrammarError, Result};
use crate::input::Input;
use crate::terminals::{CharClass, Terminal};

type HashMap<K, V> = FxHashMap<K, V>;
type HashSet<K> = FxHashSet<K>;

// ============================================================================
// Symbol Table - maps between strings and numeric IDs
// ============================================================================

/// Bidirectional mapping between symbols (strings) and numeric IDs
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    str_to_id: HashMap<String, usize>,
    id_to_str: Vec<String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create an ID for a symbol string
    pub fn get_or_insert(&mut self, symbol: &str) -> usize {
        if let Some(&id) = self.str_to_id.get(symbol) {
            id
        } else {
            let id = self.id_to_str.len();
            self.str_to_id.insert(symbol.to_string(), id);
            self.id_to_str.push(symbol.to_string());
            id
        }
    }

    pub fn get_id(&self, symbol: &str) -> Option<usize> {
        self.str_to_id.get(symbol).copied()
    }

    pub fn get_str(&self, id: usize) -> Option<&str> {
        self.id_to_str.get(id).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.id_to_str.iter().enumerate().map(|(i, s)| (i, s.as_str()))
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// A guard attached to a symbol. `true` lets the derivation continue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Boolean expression over the current environment
    Expr(Expr),
    /// The terminal matches at the right extent
    Follow(Terminal),
    NotFollow(Terminal),
    /// A match of the terminal ends at the left extent
    Precede(Terminal),
    NotPrecede(Terminal),
    /// The terminal matches exactly the region [left, right)
    Match(Terminal),
    NotMatch(Terminal),
}

impl Condition {
    /// Evaluate the condition on the region `[left, right)`.
    ///
    /// A false result is a rejected branch. An expression that does not
    /// produce a boolean is an error.
    pub fn holds(
        &self,
        input: &dyn Input,
        left: usize,
        right: usize,
        env: &Environment,
        evaluator: &dyn Evaluator,
    ) -> Result<bool> {
        let result = match self {
            Condition::Expr(expr) => match evaluator.evaluate(expr, env)? {
                Value::Bool(b) => b,
                other => {
                    return Err(GLLError::NotBoolean {
                        expression: expr.to_string(),
                        value: other.to_string(),
                    })
                }
            },
            Condition::Follow(t) => t.match_at(input, right).is_some(),
            Condition::NotFollow(t) => t.match_at(input, right).is_none(),
            Condition::Precede(t) => t.matches_before(input, left),
            Condition::NotPrecede(t) => !t.matches_before(input, left),
            Condition::Match(t) => t.match_at(input, left) == Some(right),
            Condition::NotMatch(t) => t.match_at(input, left) != Some(right),
        };
        Ok(result)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Expr(expr) => write!(f, "{}", expr),
            Condition::Follow(t) => write!(f, ">> {}", t),
            Condition::NotFollow(t) => write!(f, "!>> {}", t),
            Condition::Precede(t) => write!(f, "{} <<", t),
            Condition::NotPrecede(t) => write!(f, "{} !<<", t),
            Condition::Match(t) => write!(f, "& {}", t),
            Condition::NotMatch(t) => write!(f, "\\ {}", t),
        }
    }
}

// ============================================================================
// Symbols and rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Terminal(Terminal),
    Nonterminal {
        name: String,
        arguments: Vec<Expr>,
    },
    IfThenElse {
        condition: Expr,
        then: Box<Symbol>,
        otherwise: Option<Box<Symbol>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub label: Option<String>,
    pub pre_conditions: Vec<Condition>,
    pub post_conditions: Vec<Condition>,
}

impl Symbol {
    fn from_kind(kind: SymbolKind) -> Self {
        Symbol {
            kind,
            label: None,
            pre_conditions: Vec::new(),
            post_conditions: Vec::new(),
        }
    }

    /// Terminal symbol
    pub fn t<T: Into<Terminal>>(terminal: T) -> Self {
        Self::from_kind(SymbolKind::Terminal(terminal.into()))
    }

    /// Nonterminal symbol without arguments
    pub fn nt(name: &str) -> Self {
        Self::call(name, Vec::new())
    }

    /// Parameterised nonterminal
    pub fn call(name: &str, arguments: Vec<Expr>) -> Self {
        Self::from_kind(SymbolKind::Nonterminal {
            name: name.to_string(),
            arguments,
        })
    }

    pub fn if_then(condition: Expr, then: Symbol) -> Self {
        Self::from_kind(SymbolKind::IfThenElse {
            condition,
            then: Box::new(then),
            otherwise: None,
        })
    }

    pub fn if_then_else(condition: Expr, then: Symbol, otherwise: Symbol) -> Self {
        Self::from_kind(SymbolKind::IfThenElse {
            condition,
            then: Box::new(then),
            otherwise: Some(Box::new(otherwise)),
        })
    }

    pub fn labeled(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn pre(mut self, condition: Condition) -> Self {
        self.pre_conditions.push(condition);
        self
    }

    pub fn post(mut self, condition: Condition) -> Self {
        self.post_conditions.push(condition);
        self
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal(_))
    }

    pub fn nonterminal_name(&self) -> Option<&str> {
        match &self.kind {
            SymbolKind::Nonterminal { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for condition in &self.pre_conditions {
            write!(f, "[{}] ", condition)?;
        }
        if let Some(label) = &self.label {
            write!(f, "{}:", label)?;
        }
        match &self.kind {
            SymbolKind::Terminal(t) => write!(f, "{}", t)?,
            SymbolKind::Nonterminal { name, arguments } => {
                write!(f, "{}", name)?;
                if !arguments.is_empty() {
                    let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                    write!(f, "({})", args.join(", "))?;
                }
            }
            SymbolKind::IfThenElse {
                condition,
                then,
                otherwise,
            } => {
                write!(f, "if {} {}", condition, then)?;
                if let Some(otherwise) = otherwise {
                    write!(f, " else {}", otherwise)?;
                }
            }
        }
        for condition in &self.post_conditions {
            write!(f, " [{}]", condition)?;
        }
        Ok(())
    }
}

/// One alternative of a nonterminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub head: String,
    pub body: Vec<Symbol>,
    /// Value returned to the caller when the alternative completes
    pub returns: Option<Expr>,
}

impl Rule {
    pub fn new(head: &str, body: Vec<Symbol>) -> Self {
        Rule {
            head: head.to_string(),
            body,
            returns: None,
        }
    }

    pub fn is_epsilon(&self) -> bool {
        self.body.is_empty()
    }

    /// Rule rendered with a dot before `position`
    pub fn dotted(&self, position: usize) -> String {
        let mut parts: Vec<String> = Vec::with_capacity(self.body.len() + 1);
        for (i, symbol) in self.body.iter().enumerate() {
            if i == position {
                parts.push(".".to_string());
            }
            parts.push(symbol.to_string());
        }
        if position >= self.body.len() {
            parts.push(".".to_string());
        }
        format!("{} ::= {}", self.head, parts.join(" "))
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.body.is_empty() {
            write!(f, "{} ::= ε", self.head)?;
        } else {
            let body: Vec<String> = self.body.iter().map(|s| s.to_string()).collect();
            write!(f, "{} ::= {}", self.head, body.join(" "))?;
        }
        if let Some(returns) = &self.returns {
            write!(f, " {{{}}}", returns)?;
        }
        Ok(())
    }
}

// ============================================================================
// Grammar
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub name: String,
    pub start: String,
    pub rules: Vec<Rule>,
    /// Parameter names of parameterised nonterminals
    pub parameters: HashMap<String, Vec<String>>,
    /// Sample inputs carried by grammar files
    pub tests: Vec<String>,
}

impl Grammar {
    /// Nonterminals with at least one rule, in order of first definition
    pub fn nonterminals(&self) -> Vec<&str> {
        let mut seen = HashSet::default();
        self.rules
            .iter()
            .map(|r| r.head.as_str())
            .filter(|h| seen.insert(*h))
            .collect()
    }

    pub fn has_nonterminal(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.head == name)
    }

    pub fn alternatives<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.head == name)
    }

    pub fn parameters_of(&self, name: &str) -> &[String] {
        self.parameters.get(name).map(|p| p.as_slice()).unwrap_or(&[])
    }

    /// Same rules, different start symbol
    pub fn with_start(mut self, start: &str) -> Self {
        self.start = start.to_string();
        self
    }

    /// Nonterminals reachable from `name` (including itself), breadth first
    pub fn reachable_nonterminals(&self, name: &str) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::default();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([name.to_string()]);

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for rule in self.alternatives(&current) {
                for symbol in &rule.body {
                    referenced_nonterminals(symbol, &mut |n| {
                        if !visited.contains(n) {
                            queue.push_back(n.to_string());
                        }
                    });
                }
            }
            order.push(current);
        }
        order
    }

    pub fn production_count(&self) -> usize {
        self.rules.len()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        load_grammar_from_str(json)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_grammar_from_file(path)
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Grammar: {} (start {}) ===", self.name, self.start)?;
        for rule in &self.rules {
            writeln!(f, "  {}", rule)?;
        }
        Ok(())
    }
}

/// Call `visit` for every nonterminal named inside `symbol`
pub(crate) fn referenced_nonterminals<F: FnMut(&str)>(symbol: &Symbol, visit: &mut F) {
    match &symbol.kind {
        SymbolKind::Terminal(_) => {}
        SymbolKind::Nonterminal { name, .. } => visit(name),
        SymbolKind::IfThenElse {
            then, otherwise, ..
        } => {
            referenced_nonterminals(then, visit);
            if let Some(otherwise) = otherwise {
                referenced_nonterminals(otherwise, visit);
            }
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Programmatic grammar construction. The first rule's head is the start
/// symbol unless `start` says otherwise.
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    name: String,
    start: Option<String>,
    rules: Vec<Rule>,
    parameters: HashMap<String, Vec<String>>,
    tests: Vec<String>,
}

impl GrammarBuilder {
    pub fn new(name: &str) -> Self {
        GrammarBuilder {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn start(mut self, start: &str) -> Self {
        self.start = Some(start.to_string());
        self
    }

    pub fn rule(mut self, head: &str, body: Vec<Symbol>) -> Self {
        self.rules.push(Rule::new(head, body));
        self
    }

    pub fn rule_returning(mut self, head: &str, body: Vec<Symbol>, returns: Expr) -> Self {
        let mut rule = Rule::new(head, body);
        rule.returns = Some(returns);
        self.rules.push(rule);
        self
    }

    pub fn parameters(mut self, head: &str, names: &[&str]) -> Self {
        self.parameters.insert(
            head.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    pub fn test(mut self, input: &str) -> Self {
        self.tests.push(input.to_string());
        self
    }

    pub fn build(self) -> Grammar {
        let start = self
            .start
            .or_else(|| self.rules.first().map(|r| r.head.clone()))
            .unwrap_or_default();
        Grammar {
            name: self.name,
            start,
            rules: self.rules,
            parameters: self.parameters,
            tests: self.tests,
        }
    }
}

// ============================================================================
// Grammar Loading
// ============================================================================

/// JSON structure for grammar files
#[derive(Debug, Deserialize)]
struct GrammarJson {
    name: String,
    start: String,
    rules: serde_json::Map<String, JsonValue>,
    #[serde(default)]
    tests: Vec<String>,
}

/// Load a grammar from a JSON file
pub fn load_grammar_from_file<P: AsRef<Path>>(path: P) -> Result<Grammar> {
    let content = fs::read_to_string(&path)?;
    load_grammar_from_str(&content)
}

/// Load a grammar from a JSON string.
///
/// `"<X>"` names a nonterminal, any other string is a literal terminal and
/// the empty production `[]` is ε.
pub fn load_grammar_from_str(json: &str) -> Result<Grammar> {
    let parsed: GrammarJson = serde_json::from_str(json)?;

    // serde_json keeps object keys sorted, so rule order is deterministic
    let mut builder = GrammarBuilder::new(&parsed.name).start(&parsed.start);
    for (lhs, rhs_value) in &parsed.rules {
        for production in parse_rules(rhs_value)? {
            builder = builder.rule(lhs, production);
        }
    }
    for test in &parsed.tests {
        builder = builder.test(test);
    }
    Ok(builder.build())
}

fn invalid(message: &str) -> GLLError {
    GrammarError::InvalidJson(message.to_string()).into()
}

/// Parse the alternatives of one nonterminal
fn parse_rules(value: &JsonValue) -> Result<Vec<Vec<Symbol>>> {
    match value {
        // Array of productions: [["a", "<B>"], ["c"]]
        JsonValue::Array(productions) => productions
            .iter()
            .map(|prod| match prod {
                JsonValue::Array(symbols) => parse_production(symbols),
                _ => Err(invalid("Production must be an array")),
            })
            .collect(),
        // Character class shorthands: {"digits": true}, {"letters": true},
        // {"char_range": [from, to], "exclude": [...]}
        JsonValue::Object(obj) => {
            let mut class = CharClass::new();
            if obj.get("digits").and_then(|v| v.as_bool()) == Some(true) {
                class.add_range('0', '9');
            }
            if obj.get("letters").and_then(|v| v.as_bool()) == Some(true) {
                class.add_range('a', 'z');
            }
            if let Some(range) = obj.get("char_range") {
                let bounds = range
                    .as_array()
                    .ok_or_else(|| invalid("char_range must be an array"))?;
                let bound = |i: usize| {
                    bounds
                        .get(i)
                        .and_then(|v| v.as_u64())
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| invalid("char_range bounds must be numbers"))
                };
                let (start, end) = (bound(0)?, bound(1)?);
                let exclude: Vec<u32> = obj
                    .get("exclude")
                    .and_then(|v| v.as_array())
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()))
                            .collect()
                    })
                    .unwrap_or_default();
                for code in (start..end).filter(|c| !exclude.contains(c)) {
                    if let Some(c) = char::from_u32(code) {
                        class.add(c);
                    }
                }
            }
            if class.is_empty() {
                return Err(invalid("Unknown rule object"));
            }
            Ok(vec![vec![Symbol::t(class)]])
        }
        _ => Err(invalid("Rules must be an array or object")),
    }
}

/// Parse a single production from a JSON array
fn parse_production(symbols: &[JsonValue]) -> Result<Vec<Symbol>> {
    symbols
        .iter()
        .map(|s| {
            let sym_str = s
                .as_str()
                .ok_or_else(|| invalid("Symbol must be a string"))?;
            if sym_str.len() > 2 && sym_str.starts_with('<') && sym_str.ends_with('>') {
                Ok(Symbol::nt(sym_str))
            } else {
                Ok(Symbol::t(sym_str))
            }
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "grammars_tests.rs"]
mod tests;
