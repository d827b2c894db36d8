use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::config::EnvironmentImpl;

// ----------------------------------
// Values
// ----------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

// ----------------------------------
// Environments
// ----------------------------------

type Bindings = SmallVec<[(String, Value); 4]>;

#[derive(Debug, PartialEq, Eq, Hash)]
struct Frame {
    bindings: Bindings,
    parent: Option<Rc<Frame>>,
}

/// Immutable variable bindings shared between descriptors, GSS edges and
/// popped elements. `declare` never mutates, it returns a new environment.
///
/// Equality and hashing are structural so that descriptors carrying equal
/// environments are deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Environment {
    frame: Option<Rc<Frame>>,
    mode: EnvironmentImpl,
}

impl Environment {
    pub fn empty(mode: EnvironmentImpl) -> Self {
        Environment { frame: None, mode }
    }

    pub fn mode(&self) -> EnvironmentImpl {
        self.mode
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_none()
    }

    /// New environment in which `bindings` shadow the current ones
    pub fn declare<I, S>(&self, bindings: I) -> Environment
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        let mut new: Bindings = bindings
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        if new.is_empty() {
            return self.clone();
        }

        let frame = match self.mode {
            EnvironmentImpl::Frames => Frame {
                bindings: new,
                parent: self.frame.clone(),
            },
            EnvironmentImpl::Flat => {
                let mut flat: Bindings = self
                    .frame
                    .as_ref()
                    .map(|frame| frame.bindings.clone())
                    .unwrap_or_default();
                for (name, value) in new.drain(..) {
                    match flat.iter_mut().find(|(n, _)| *n == name) {
                        Some(slot) => slot.1 = value,
                        None => flat.push((name, value)),
                    }
                }
                Frame {
                    bindings: flat,
                    parent: None,
                }
            }
        };

        Environment {
            frame: Some(Rc::new(frame)),
            mode: self.mode,
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = self.frame.as_deref();
        while let Some(frame) = current {
            // Later declarations in the same frame win
            if let Some((_, value)) = frame.bindings.iter().rev().find(|(n, _)| n == name) {
                return Some(value);
            }
            current = frame.parent.as_deref();
        }
        None
    }

    /// Visible bindings, innermost first, without shadowed entries
    pub fn bindings(&self) -> Vec<(&str, &Value)> {
        let mut result: Vec<(&str, &Value)> = Vec::new();
        let mut current = self.frame.as_deref();
        while let Some(frame) = current {
            for (name, value) in frame.bindings.iter().rev() {
                if !result.iter().any(|(n, _)| *n == name) {
                    result.push((name.as_str(), value));
                }
            }
            current = frame.parent.as_deref();
        }
        result
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bindings: Vec<String> = self
            .bindings()
            .into_iter()
            .rev()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        write!(f, "{{{}}}", bindings.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_modes() -> [Environment; 2] {
        [
            Environment::empty(EnvironmentImpl::Frames),
            Environment::empty(EnvironmentImpl::Flat),
        ]
    }

    #[test]
    fn test_declare_and_lookup() {
        for env in both_modes() {
            assert!(env.is_empty());
            let outer = env.declare([("x", Value::Int(1)), ("y", Value::Bool(true))]);
            let inner = outer.declare([("x", Value::Int(2))]);

            assert_eq!(outer.lookup("x"), Some(&Value::Int(1)));
            assert_eq!(inner.lookup("x"), Some(&Value::Int(2)));
            assert_eq!(inner.lookup("y"), Some(&Value::Bool(true)));
            assert_eq!(inner.lookup("z"), None);
            assert_eq!(inner.bindings().len(), 2);
        }
    }

    #[test]
    fn test_empty_declare_shares_frame() {
        let env = Environment::default().declare([("n", Value::Int(3))]);
        let same = env.declare(Vec::<(String, Value)>::new());
        assert_eq!(env, same);
    }

    #[test]
    fn test_structural_equality() {
        for env in both_modes() {
            let a = env.declare([("x", Value::Int(1))]);
            let b = env.declare([("x", Value::Int(1))]);
            let c = env.declare([("x", Value::Int(2))]);
            assert_eq!(a, b);
            assert_ne!(a, c);
        }
    }

    #[test]
    fn test_display() {
        let env = Environment::default()
            .declare([("a", Value::Int(1))])
            .declare([("b", Value::from("s"))]);
        assert_eq!(env.to_string(), "{a=1, b=\"s\"}");
    }
}
