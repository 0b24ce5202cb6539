//! Evaluation of expression fragments against the variable environment.
//!
//! Fragments are lexed and parsed into a small expression tree and evaluated
//! with integer, float and string semantics. The only names visible to an
//! expression are the variables of the [`Environment`]; there is no other
//! namespace, so there is nothing to escape to.
//!
//! [`eval`] never fails: a fragment that cannot be evaluated is returned
//! verbatim as a string value, which is what lets `dream hello` treat `hello`
//! as a word rather than an error.

use crate::env::Environment;
use crate::lexer::{self, LexingError};
use crate::parser::{self, BinOp, Expr, ParsingError};
use crate::value::Value;
use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use thiserror::Error;
use tracing::debug;

/// Upper bound, in bytes, for strings produced by repetition.
const MAX_REPEAT_LEN: usize = 1 << 20;

/// Upper bound, in bits, for integers produced by `**`.
const MAX_INT_BITS: u64 = 1 << 22;

/// Reasons a fragment could not be evaluated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Lexing(#[from] LexingError),
    #[error(transparent)]
    Parsing(#[from] ParsingError),
    #[error("name {0:?} is not summoned")]
    UnknownName(String),
    #[error("unsupported operand types for {op:?}: {lhs} and {rhs}")]
    UnsupportedOperands {
        op: BinOp,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("bad operand type for unary operator: {0}")]
    UnsupportedUnary(&'static str),
    #[error("division by zero")]
    DivisionByZero,
    #[error("numeric result out of range")]
    Overflow,
}

/// Resolve a fragment to a value, falling back to the fragment text itself.
///
/// A fragment that is exactly the name of a variable yields that variable's
/// value without any further evaluation.
pub fn eval(fragment: &str, env: &Environment) -> Value {
    let fragment = fragment.trim();
    if let Some(value) = env.get_var(fragment) {
        return value.clone();
    }
    match try_eval(fragment, env) {
        Ok(value) => value,
        Err(e) => {
            debug!(fragment, error = %e, "taking fragment literally");
            Value::Str(fragment.to_string())
        }
    }
}

/// Lex, parse and evaluate a fragment, reporting why it failed.
pub fn try_eval(fragment: &str, env: &Environment) -> Result<Value, EvalError> {
    let tokens = lexer::split_into_tokens(fragment)?;
    let ast = parser::construct_ast(tokens)?;
    evaluate(&ast, env)
}

fn evaluate(expr: &Expr, env: &Environment) -> Result<Value, EvalError> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(n.clone())),
        Expr::Float(x) => Ok(Value::Float(*x)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Var(name) => env
            .get_var(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Neg(inner) => match evaluate(inner, env)? {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(EvalError::UnsupportedUnary(other.kind())),
        },
        Expr::Pos(inner) => match evaluate(inner, env)? {
            Value::Str(_) => Err(EvalError::UnsupportedUnary("str")),
            number => Ok(number),
        },
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, env)?;
            let rhs = evaluate(rhs, env)?;
            apply(*op, lhs, rhs)
        }
    }
}

fn apply(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    use Value::{Float, Int, Str};

    match (op, lhs, rhs) {
        (_, Int(a), Int(b)) => int_op(op, a, b),
        (BinOp::Add, Str(a), Str(b)) => Ok(Str(a + &b)),
        (BinOp::Mul, Str(s), Int(n)) | (BinOp::Mul, Int(n), Str(s)) => repeat(&s, &n),
        (_, Int(a), Float(b)) => float_op(op, to_float(&a)?, b),
        (_, Float(a), Int(b)) => float_op(op, a, to_float(&b)?),
        (_, Float(a), Float(b)) => float_op(op, a, b),
        (op, lhs, rhs) => Err(EvalError::UnsupportedOperands {
            op,
            lhs: lhs.kind(),
            rhs: rhs.kind(),
        }),
    }
}

/// Integers too large for a float cannot take part in float arithmetic.
fn to_float(n: &BigInt) -> Result<f64, EvalError> {
    n.to_f64()
        .filter(|x| x.is_finite())
        .ok_or(EvalError::Overflow)
}

fn int_op(op: BinOp, a: BigInt, b: BigInt) -> Result<Value, EvalError> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => return float_op(op, to_float(&a)?, to_float(&b)?),
        BinOp::FloorDiv => int_divmod(&a, &b)?.0,
        BinOp::Mod => int_divmod(&a, &b)?.1,
        BinOp::Pow => {
            if b.is_negative() {
                if a.is_zero() {
                    return Err(EvalError::DivisionByZero);
                }
                return float_op(op, to_float(&a)?, to_float(&b)?);
            }
            let exp = b.to_u32().ok_or(EvalError::Overflow)?;
            // 0, 1 and -1 stay small whatever the exponent
            if a.bits() > 1 && a.bits().saturating_mul(u64::from(exp)) > MAX_INT_BITS {
                return Err(EvalError::Overflow);
            }
            a.pow(exp)
        }
    };
    Ok(Value::Int(result))
}

/// Quotient rounded towards negative infinity and the matching remainder,
/// which takes the sign of the divisor.
fn int_divmod(a: &BigInt, b: &BigInt) -> Result<(BigInt, BigInt), EvalError> {
    if b.is_zero() {
        return Err(EvalError::DivisionByZero);
    }
    let mut q = a / b;
    let mut r = a % b;
    if !r.is_zero() && r.is_negative() != b.is_negative() {
        q -= BigInt::one();
        r += b;
    }
    Ok((q, r))
}

/// Float counterpart of [`int_divmod`]; `//` and `%` both come from here so
/// that `a == b * (a // b) + a % b` holds as closely as floats allow.
fn float_divmod(a: f64, b: f64) -> Result<(f64, f64), EvalError> {
    if b == 0.0 {
        return Err(EvalError::DivisionByZero);
    }
    let mut rem = a % b;
    let mut div = (a - rem) / b;
    if rem != 0.0 {
        if (b < 0.0) != (rem < 0.0) {
            rem += b;
            div -= 1.0;
        }
    } else {
        rem = 0.0f64.copysign(b);
    }

    let quotient = if div != 0.0 {
        let floor = div.floor();
        if div - floor > 0.5 { floor + 1.0 } else { floor }
    } else {
        0.0f64.copysign(a / b)
    };
    Ok((quotient, rem))
}

fn float_op(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinOp::FloorDiv => float_divmod(a, b)?.0,
        BinOp::Mod => float_divmod(a, b)?.1,
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            if a < 0.0 && b.fract() != 0.0 {
                // would be a complex number
                return Err(EvalError::UnsupportedOperands {
                    op,
                    lhs: "float",
                    rhs: "float",
                });
            }
            let r = a.powf(b);
            if r.is_infinite() && a.is_finite() && b.is_finite() {
                return Err(EvalError::Overflow);
            }
            r
        }
    };
    Ok(Value::Float(result))
}

fn repeat(s: &str, count: &BigInt) -> Result<Value, EvalError> {
    if !count.is_positive() {
        return Ok(Value::Str(String::new()));
    }
    let count = count.to_usize().ok_or(EvalError::Overflow)?;
    match s.len().checked_mul(count) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(Value::Str(s.repeat(count))),
        _ => Err(EvalError::Overflow),
    }
}
