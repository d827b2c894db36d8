// Error types shared by grammar compilation, expression evaluation and parsing

use thiserror::Error;

/// Problems found while turning a grammar into a slot graph.
/// All of them are raised before any descriptor is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("No nonterminal named '{0}' found")]
    UnknownStartSymbol(String),

    #[error("Nonterminal '{name}' used in rule '{rule}' has no alternatives")]
    UndefinedNonterminal { name: String, rule: String },

    #[error("Nonterminal '{name}' expects {expected} argument(s), found {found}")]
    ArgumentCountMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Start symbol '{0}' is parameterised")]
    StartSymbolHasParameters(String),

    #[error("Invalid grammar JSON: {0}")]
    InvalidJson(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),
}

/// Failures of the expression evaluator used by data-dependent grammars.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("Undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("Cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: String,
        left: String,
        right: String,
    },

    #[error("Division by zero")]
    DivisionByZero,
}

#[derive(Debug, Error)]
pub enum GLLError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    /// A condition produced something other than a boolean. This is a
    /// grammar bug, not a rejected derivation.
    #[error("Condition '{expression}' evaluated to non-boolean value {value}")]
    NotBoolean { expression: String, value: String },

    #[error("Node {label} [{left}, {right}) is ambiguous")]
    Ambiguous {
        label: String,
        left: usize,
        right: usize,
    },

    #[error("Node {label} [{left}, {right}) is part of a cycle")]
    Cyclic {
        label: String,
        left: usize,
        right: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GLLError>;
