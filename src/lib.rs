//! Generalized LL parsing.
//!
//! A [`Grammar`] is compiled once into a [`GrammarGraph`] of slots, which
//! any number of [`GLLParser`]s can share. Each parse builds a graph
//! structured stack and a shared packed parse forest holding every
//! derivation of the input, including those of ambiguous and
//! left-recursive grammars. Rules may carry conditions, parameters, labels
//! and return values (see [`datadependent`]).

pub mod config;
pub mod datadependent;
pub mod error;
pub mod first_follow;
pub mod gll;
pub mod grammars;
pub mod input;
pub mod parse_tree;
pub mod terminals;

pub use config::{Configuration, EnvironmentImpl, Scheduling};
pub use error::{EvalError, GLLError, GrammarError, Result};
pub use gll::{GLLParser, GrammarGraph, ParseFailure, ParseResult, ParseStatistics, ParseSuccess};
pub use grammars::{Condition, Grammar, GrammarBuilder, Rule, Symbol};
pub use input::{Input, TextInput};
pub use parse_tree::{ParseSymbol, ParseTree};
pub use terminals::{CharClass, Matcher, Terminal};
