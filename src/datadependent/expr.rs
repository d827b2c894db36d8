use std::fmt;

use super::env::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Expressions used by conditions, arguments and return values
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Const(Value),
    Var(String),
    /// Left extent of the symbol labeled with the given name
    LeftExtent(String),
    /// Right extent of the symbol labeled with the given name
    RightExtent(String),
    Not(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// Variable name under which a label's left extent is stored
pub fn left_extent_name(label: &str) -> String {
    format!("{}.lExt", label)
}

/// Variable name under which a label's right extent is stored
pub fn right_extent_name(label: &str) -> String {
    format!("{}.rExt", label)
}

impl Expr {
    pub fn int(n: i64) -> Self {
        Expr::Const(Value::Int(n))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Const(Value::Bool(b))
    }

    pub fn str(s: &str) -> Self {
        Expr::Const(Value::Str(s.to_string()))
    }

    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    pub fn lext(label: &str) -> Self {
        Expr::LeftExtent(label.to_string())
    }

    pub fn rext(label: &str) -> Self {
        Expr::RightExtent(label.to_string())
    }

    pub fn negate(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary(op, Box::new(left), Box::new(right))
    }

    pub fn add(self, other: Expr) -> Self {
        Expr::binary(BinOp::Add, self, other)
    }

    pub fn sub(self, other: Expr) -> Self {
        Expr::binary(BinOp::Sub, self, other)
    }

    pub fn equals(self, other: Expr) -> Self {
        Expr::binary(BinOp::Eq, self, other)
    }

    pub fn less(self, other: Expr) -> Self {
        Expr::binary(BinOp::Lt, self, other)
    }

    pub fn greater_eq(self, other: Expr) -> Self {
        Expr::binary(BinOp::Ge, self, other)
    }

    pub fn and(self, other: Expr) -> Self {
        Expr::binary(BinOp::And, self, other)
    }

    pub fn or(self, other: Expr) -> Self {
        Expr::binary(BinOp::Or, self, other)
    }

    /// Variables read by this expression, extents included
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(name) => vars.push(name.clone()),
            Expr::LeftExtent(label) => vars.push(left_extent_name(label)),
            Expr::RightExtent(label) => vars.push(right_extent_name(label)),
            Expr::Not(inner) => inner.collect_variables(vars),
            Expr::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Const(value) => write!(f, "{}", value),
            Expr::Var(name) => write!(f, "{}", name),
            Expr::LeftExtent(label) => write!(f, "{}", left_extent_name(label)),
            Expr::RightExtent(label) => write!(f, "{}", right_extent_name(label)),
            Expr::Not(inner) => write!(f, "!({})", inner),
            Expr::Binary(op, left, right) => write!(f, "({} {} {})", left, op.symbol(), right),
        }
    }
}
