// Terminal symbols and the matcher boundary
//
// Compiling regular expressions to automata happens elsewhere; the parser
// only asks a terminal "where does a match starting at i end?".

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::input::Input;

// ============================================================================
// Character classes
// ============================================================================

/// Set of characters stored as sorted, disjoint, non-adjacent inclusive ranges
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CharClass {
    ranges: Vec<(char, char)>,
}

impl CharClass {
    pub fn new() -> Self {
        CharClass { ranges: Vec::new() }
    }

    pub fn single(c: char) -> Self {
        CharClass {
            ranges: vec![(c, c)],
        }
    }

    pub fn range(from: char, to: char) -> Self {
        let mut class = CharClass::new();
        class.add_range(from, to);
        class
    }

    pub fn from_ranges<I: IntoIterator<Item = (char, char)>>(ranges: I) -> Self {
        let mut class = CharClass::new();
        for (from, to) in ranges {
            class.add_range(from, to);
        }
        class
    }

    pub fn add_range(&mut self, from: char, to: char) {
        let (from, to) = if from <= to { (from, to) } else { (to, from) };
        self.ranges.push((from, to));
        self.normalize();
    }

    pub fn add(&mut self, c: char) {
        self.add_range(c, c);
    }

    pub fn union(&mut self, other: &CharClass) {
        if other.ranges.is_empty() {
            return;
        }
        self.ranges.extend_from_slice(&other.ranges);
        self.normalize();
    }

    pub fn contains(&self, c: char) -> bool {
        self.ranges
            .binary_search_by(|&(from, to)| {
                if to < c {
                    std::cmp::Ordering::Less
                } else if from > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }

    fn normalize(&mut self) {
        self.ranges.sort_unstable();
        let mut merged: Vec<(char, char)> = Vec::with_capacity(self.ranges.len());
        for &(from, to) in &self.ranges {
            match merged.last_mut() {
                Some(last) if from as u32 <= last.1 as u32 + 1 => {
                    if to > last.1 {
                        last.1 = to;
                    }
                }
                _ => merged.push((from, to)),
            }
        }
        self.ranges = merged;
    }
}

impl fmt::Display for CharClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for &(from, to) in &self.ranges {
            if from == to {
                write!(f, "{}", from.escape_debug())?;
            } else {
                write!(f, "{}-{}", from.escape_debug(), to.escape_debug())?;
            }
        }
        write!(f, "]")
    }
}

// ============================================================================
// Matchers
// ============================================================================

/// An externally compiled terminal (e.g. a DFA built from a regular expression)
pub trait Matcher: fmt::Debug + Send + Sync {
    /// Display name
    fn name(&self) -> String;

    /// End position of the match starting at `i`, if any
    fn match_at(&self, input: &dyn Input, i: usize) -> Option<usize>;

    /// Characters a non-empty match can start with. `None` means unknown,
    /// in which case lookahead checks always pass.
    fn first(&self) -> Option<CharClass> {
        None
    }

    fn nullable(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub enum Terminal {
    Epsilon,
    Char(char),
    Class(CharClass),
    Literal(String),
    Custom(Arc<dyn Matcher>),
}

impl Terminal {
    pub fn literal(text: &str) -> Self {
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Terminal::Epsilon,
            (Some(c), None) => Terminal::Char(c),
            _ => Terminal::Literal(text.to_string()),
        }
    }

    pub fn custom<M: Matcher + 'static>(matcher: M) -> Self {
        Terminal::Custom(Arc::new(matcher))
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self, Terminal::Epsilon)
    }

    pub fn name(&self) -> String {
        match self {
            Terminal::Epsilon => "epsilon".to_string(),
            Terminal::Char(c) => c.to_string(),
            Terminal::Class(class) => class.to_string(),
            Terminal::Literal(text) => text.clone(),
            Terminal::Custom(matcher) => matcher.name(),
        }
    }

    pub fn match_at(&self, input: &dyn Input, i: usize) -> Option<usize> {
        match self {
            Terminal::Epsilon => Some(i),
            Terminal::Char(c) => (input.next_symbol(i) == Some(*c)).then_some(i + 1),
            Terminal::Class(class) => input
                .next_symbol(i)
                .filter(|&c| class.contains(c))
                .map(|_| i + 1),
            Terminal::Literal(text) => {
                let mut j = i;
                for c in text.chars() {
                    if input.next_symbol(j) != Some(c) {
                        return None;
                    }
                    j += 1;
                }
                Some(j)
            }
            Terminal::Custom(matcher) => matcher.match_at(input, i),
        }
    }

    /// Does a match of this terminal end exactly at `i`?
    pub fn matches_before(&self, input: &dyn Input, i: usize) -> bool {
        match self {
            Terminal::Epsilon => true,
            Terminal::Char(_) | Terminal::Class(_) => {
                i > 0 && self.match_at(input, i - 1) == Some(i)
            }
            Terminal::Literal(text) => {
                let len = text.chars().count();
                i >= len && self.match_at(input, i - len) == Some(i)
            }
            Terminal::Custom(matcher) => (0..=i).rev().any(|j| matcher.match_at(input, j) == Some(i)),
        }
    }

    pub fn first(&self) -> Option<CharClass> {
        match self {
            Terminal::Epsilon => Some(CharClass::new()),
            Terminal::Char(c) => Some(CharClass::single(*c)),
            Terminal::Class(class) => Some(class.clone()),
            Terminal::Literal(text) => Some(
                text.chars()
                    .next()
                    .map(CharClass::single)
                    .unwrap_or_default(),
            ),
            Terminal::Custom(matcher) => matcher.first(),
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            Terminal::Epsilon => true,
            Terminal::Literal(text) => text.is_empty(),
            Terminal::Char(_) | Terminal::Class(_) => false,
            Terminal::Custom(matcher) => matcher.nullable(),
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminal::Epsilon => write!(f, "ε"),
            Terminal::Class(class) => write!(f, "{}", class),
            Terminal::Custom(matcher) => write!(f, "{}", matcher.name()),
            _ => write!(f, "'{}'", self.name()),
        }
    }
}

// Terminals are interned structurally; custom matchers by identity
impl PartialEq for Terminal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Terminal::Epsilon, Terminal::Epsilon) => true,
            (Terminal::Char(a), Terminal::Char(b)) => a == b,
            (Terminal::Class(a), Terminal::Class(b)) => a == b,
            (Terminal::Literal(a), Terminal::Literal(b)) => a == b,
            (Terminal::Custom(a), Terminal::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Terminal {}

impl Hash for Terminal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Terminal::Epsilon => {}
            Terminal::Char(c) => c.hash(state),
            Terminal::Class(class) => class.hash(state),
            Terminal::Literal(text) => text.hash(state),
            Terminal::Custom(matcher) => (Arc::as_ptr(matcher) as *const ()).hash(state),
        }
    }
}

impl From<char> for Terminal {
    fn from(c: char) -> Self {
        Terminal::Char(c)
    }
}

impl From<&str> for Terminal {
    fn from(text: &str) -> Self {
        Terminal::literal(text)
    }
}

impl From<CharClass> for Terminal {
    fn from(class: CharClass) -> Self {
        Terminal::Class(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::TextInput;

    #[derive(Debug)]
    struct Digits;

    impl Matcher for Digits {
        fn name(&self) -> String {
            "digits".to_string()
        }

        fn match_at(&self, input: &dyn Input, i: usize) -> Option<usize> {
            let mut j = i;
            while input.next_symbol(j).is_some_and(|c| c.is_ascii_digit()) {
                j += 1;
            }
            (j > i).then_some(j)
        }

        fn first(&self) -> Option<CharClass> {
            Some(CharClass::range('0', '9'))
        }
    }

    #[test]
    fn test_char_class_normalization() {
        let class = CharClass::from_ranges([('d', 'f'), ('a', 'c'), ('x', 'x'), ('e', 'k')]);
        assert_eq!(class.ranges(), &[('a', 'k'), ('x', 'x')]);
        assert!(class.contains('a'));
        assert!(class.contains('k'));
        assert!(!class.contains('l'));
        assert!(class.contains('x'));
        assert_eq!(class.to_string(), "[a-kx]");
    }

    #[test]
    fn test_char_class_union() {
        let mut class = CharClass::single('0');
        class.union(&CharClass::range('1', '9'));
        assert_eq!(class.ranges(), &[('0', '9')]);
    }

    #[test]
    fn test_terminal_matching() {
        let input = TextInput::new("while 42");
        assert_eq!(Terminal::literal("while").match_at(&input, 0), Some(5));
        assert_eq!(Terminal::literal("whilst").match_at(&input, 0), None);
        assert_eq!(Terminal::Char(' ').match_at(&input, 5), Some(6));
        assert_eq!(Terminal::custom(Digits).match_at(&input, 6), Some(8));
        assert_eq!(Terminal::Epsilon.match_at(&input, 3), Some(3));
        assert_eq!(Terminal::Class(CharClass::range('a', 'z')).match_at(&input, 8), None);
    }

    #[test]
    fn test_matches_before() {
        let input = TextInput::new("ab12");
        assert!(Terminal::literal("ab").matches_before(&input, 2));
        assert!(!Terminal::literal("ab").matches_before(&input, 1));
        assert!(Terminal::custom(Digits).matches_before(&input, 4));
        assert!(!Terminal::Char('b').matches_before(&input, 0));
    }

    #[test]
    fn test_literal_shortcuts() {
        assert_eq!(Terminal::literal(""), Terminal::Epsilon);
        assert!(matches!(Terminal::literal("a"), Terminal::Char('a')));
        assert!(Terminal::literal("").nullable());
        assert_eq!(Terminal::literal("abc").first(), Some(CharClass::single('a')));
    }

    #[test]
    fn test_terminal_identity_is_structural() {
        // Same display name, different terminals
        assert_ne!(Terminal::literal("epsilon"), Terminal::Epsilon);
        assert_ne!(Terminal::literal("[q]"), Terminal::Class(CharClass::single('q')));
        assert_ne!(Terminal::Char('q'), Terminal::Class(CharClass::single('q')));

        #[derive(Debug)]
        struct NamedA;
        impl Matcher for NamedA {
            fn name(&self) -> String {
                "a".to_string()
            }
            fn match_at(&self, _input: &dyn Input, i: usize) -> Option<usize> {
                Some(i)
            }
        }
        let custom = Terminal::custom(NamedA);
        assert_ne!(custom, Terminal::Char('a'));
        assert_eq!(custom, custom.clone());
        assert_ne!(custom, Terminal::custom(NamedA));

        let ids: std::collections::HashSet<Terminal> = [
            Terminal::Epsilon,
            Terminal::literal("epsilon"),
            Terminal::literal("epsilon"),
            custom.clone(),
            custom,
        ]
        .into_iter()
        .collect();
        assert_eq!(ids.len(), 3);
    }
}
