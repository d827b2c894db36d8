// Data-dependent extension: values, environments and expression evaluation
//
// Conditions, nonterminal arguments and rule return values are expressions
// evaluated against the environment carried by the current descriptor.

mod env;
mod expr;

pub use env::{Environment, Value};
pub use expr::{left_extent_name, right_extent_name, BinOp, Expr};

use crate::error::EvalError;

pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Pluggable expression evaluation
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, expr: &Expr, env: &Environment) -> EvalResult<Value>;
}

/// Evaluator for the built-in expression language
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEvaluator;

impl Evaluator for DefaultEvaluator {
    fn evaluate(&self, expr: &Expr, env: &Environment) -> EvalResult<Value> {
        match expr {
            Expr::Const(value) => Ok(value.clone()),
            Expr::Var(name) => lookup(env, name),
            Expr::LeftExtent(label) => lookup(env, &left_extent_name(label)),
            Expr::RightExtent(label) => lookup(env, &right_extent_name(label)),
            Expr::Not(inner) => match self.evaluate(inner, env)? {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(mismatch("!", &other, &Value::Unit)),
            },
            Expr::Binary(BinOp::And, left, right) => {
                match self.evaluate(left, env)? {
                    Value::Bool(false) => Ok(Value::Bool(false)),
                    Value::Bool(true) => self.expect_bool(BinOp::And, right, env),
                    other => Err(mismatch("&&", &other, &Value::Unit)),
                }
            }
            Expr::Binary(BinOp::Or, left, right) => {
                match self.evaluate(left, env)? {
                    Value::Bool(true) => Ok(Value::Bool(true)),
                    Value::Bool(false) => self.expect_bool(BinOp::Or, right, env),
                    other => Err(mismatch("||", &other, &Value::Unit)),
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                apply(*op, left, right)
            }
        }
    }
}

impl DefaultEvaluator {
    fn expect_bool(&self, op: BinOp, expr: &Expr, env: &Environment) -> EvalResult<Value> {
        match self.evaluate(expr, env)? {
            Value::Bool(b) => Ok(Value::Bool(b)),
            other => Err(mismatch(op.symbol(), &Value::Bool(true), &other)),
        }
    }
}

fn lookup(env: &Environment, name: &str) -> EvalResult<Value> {
    env.lookup(name)
        .cloned()
        .ok_or_else(|| EvalError::UndefinedVariable(name.to_string()))
}

fn mismatch(op: &str, left: &Value, right: &Value) -> EvalError {
    EvalError::TypeMismatch {
        op: op.to_string(),
        left: left.type_name().to_string(),
        right: right.type_name().to_string(),
    }
}

fn apply(op: BinOp, left: Value, right: Value) -> EvalResult<Value> {
    use Value::{Bool, Int, Str};

    let result = match (op, &left, &right) {
        (BinOp::Eq, _, _) => Bool(left == right),
        (BinOp::Ne, _, _) => Bool(left != right),

        (BinOp::Add, Int(a), Int(b)) => Int(a.wrapping_add(*b)),
        (BinOp::Add, Str(a), Str(b)) => Str(format!("{}{}", a, b)),
        (BinOp::Sub, Int(a), Int(b)) => Int(a.wrapping_sub(*b)),
        (BinOp::Mul, Int(a), Int(b)) => Int(a.wrapping_mul(*b)),
        (BinOp::Div | BinOp::Mod, Int(_), Int(0)) => return Err(EvalError::DivisionByZero),
        (BinOp::Div, Int(a), Int(b)) => Int(a.wrapping_div(*b)),
        (BinOp::Mod, Int(a), Int(b)) => Int(a.wrapping_rem(*b)),

        (BinOp::BitAnd, Int(a), Int(b)) => Int(a & b),
        (BinOp::BitOr, Int(a), Int(b)) => Int(a | b),
        (BinOp::BitXor, Int(a), Int(b)) => Int(a ^ b),
        (BinOp::BitAnd, Bool(a), Bool(b)) => Bool(a & b),
        (BinOp::BitOr, Bool(a), Bool(b)) => Bool(a | b),
        (BinOp::BitXor, Bool(a), Bool(b)) => Bool(a ^ b),
        (BinOp::Shl | BinOp::Shr, Int(a), Int(b)) if (0..64).contains(b) => {
            if op == BinOp::Shl {
                Int(a << b)
            } else {
                Int(a >> b)
            }
        }

        (BinOp::Lt, Int(a), Int(b)) => Bool(a < b),
        (BinOp::Le, Int(a), Int(b)) => Bool(a <= b),
        (BinOp::Gt, Int(a), Int(b)) => Bool(a > b),
        (BinOp::Ge, Int(a), Int(b)) => Bool(a >= b),
        (BinOp::Lt, Str(a), Str(b)) => Bool(a < b),
        (BinOp::Le, Str(a), Str(b)) => Bool(a <= b),
        (BinOp::Gt, Str(a), Str(b)) => Bool(a > b),
        (BinOp::Ge, Str(a), Str(b)) => Bool(a >= b),

        _ => return Err(mismatch(op.symbol(), &left, &right)),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentImpl;

    fn eval(expr: &Expr, env: &Environment) -> EvalResult<Value> {
        DefaultEvaluator.evaluate(expr, env)
    }

    #[test]
    fn test_arithmetic_and_comparison() {
        let env = Environment::empty(EnvironmentImpl::Frames)
            .declare([("n", Value::Int(7)), ("s", Value::from("ab"))]);

        let sum = Expr::var("n").add(Expr::int(3));
        assert_eq!(eval(&sum, &env), Ok(Value::Int(10)));

        let cmp = Expr::var("n").less(Expr::int(10));
        assert_eq!(eval(&cmp, &env), Ok(Value::Bool(true)));

        let concat = Expr::var("s").add(Expr::str("c"));
        assert_eq!(eval(&concat, &env), Ok(Value::from("abc")));

        let bits = Expr::binary(BinOp::Shl, Expr::int(1), Expr::var("n"));
        assert_eq!(eval(&bits, &env), Ok(Value::Int(128)));
    }

    #[test]
    fn test_extents() {
        let env = Environment::default().declare([
            (left_extent_name("x"), Value::Int(2)),
            (right_extent_name("x"), Value::Int(5)),
        ]);
        let width = Expr::rext("x").sub(Expr::lext("x"));
        assert_eq!(eval(&width, &env), Ok(Value::Int(3)));
        assert_eq!(width.to_string(), "(x.rExt - x.lExt)");
        assert_eq!(width.variables(), vec!["x.rExt", "x.lExt"]);
    }

    #[test]
    fn test_short_circuit() {
        let env = Environment::default();
        // The right operand is never evaluated, so the undefined variable is fine
        let and = Expr::bool(false).and(Expr::var("missing"));
        assert_eq!(eval(&and, &env), Ok(Value::Bool(false)));
        let or = Expr::bool(true).or(Expr::var("missing"));
        assert_eq!(eval(&or, &env), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_errors() {
        let env = Environment::default();
        assert_eq!(
            eval(&Expr::var("x"), &env),
            Err(EvalError::UndefinedVariable("x".to_string()))
        );
        assert_eq!(
            eval(&Expr::binary(BinOp::Div, Expr::int(1), Expr::int(0)), &env),
            Err(EvalError::DivisionByZero)
        );
        assert!(matches!(
            eval(&Expr::int(1).add(Expr::bool(true)), &env),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(matches!(
            eval(&Expr::negate(Expr::int(1)), &env),
            Err(EvalError::TypeMismatch { .. })
        ));
    }
}
