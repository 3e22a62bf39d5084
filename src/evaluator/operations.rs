//! Binary operators and the function registry available inside filter
//! predicates.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive, Zero};
use lazy_static::lazy_static;
use regex_lite::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::EvalError;
use crate::value::{format_number, Value};

/// Largest integer exponent `**` evaluates exactly instead of through `f64`.
const MAX_EXACT_EXPONENT: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    AndNot,
    Add,
    Sub,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Abs,
    Acos,
    Acosh,
    Asin,
    Asinh,
    Atan,
    Atanh,
    Cbrt,
    Ceil,
    Cos,
    Cosh,
    Erf,
    Erfc,
    Exp,
    Exp2,
    Expm1,
    Floor,
    Gamma,
    J0,
    J1,
    Log,
    Log10,
    Log1p,
    Log2,
    Logb,
    Pow10,
    Round,
    RoundToEven,
    Sin,
    Sinh,
    Sqrt,
    Tan,
    Tanh,
    Trunc,
    Y0,
    Y1,
    Length,
    Not,
}

const OPERATOR_TABLE: &[(&str, BinaryOp)] = &[
    ("**", BinaryOp::Pow),
    ("*", BinaryOp::Mul),
    ("/", BinaryOp::Div),
    ("%", BinaryOp::Rem),
    ("<<", BinaryOp::Shl),
    (">>", BinaryOp::Shr),
    ("&", BinaryOp::BitAnd),
    ("&^", BinaryOp::AndNot),
    ("+", BinaryOp::Add),
    ("-", BinaryOp::Sub),
    ("|", BinaryOp::BitOr),
    ("^", BinaryOp::BitXor),
    ("==", BinaryOp::Eq),
    ("!=", BinaryOp::Ne),
    ("<", BinaryOp::Lt),
    ("<=", BinaryOp::Le),
    (">", BinaryOp::Gt),
    (">=", BinaryOp::Ge),
    ("=~", BinaryOp::Match),
    ("&&", BinaryOp::And),
    ("||", BinaryOp::Or),
];

const FUNCTION_TABLE: &[(&str, Function)] = &[
    ("abs", Function::Abs),
    ("acos", Function::Acos),
    ("acosh", Function::Acosh),
    ("asin", Function::Asin),
    ("asinh", Function::Asinh),
    ("atan", Function::Atan),
    ("atanh", Function::Atanh),
    ("cbrt", Function::Cbrt),
    ("ceil", Function::Ceil),
    ("cos", Function::Cos),
    ("cosh", Function::Cosh),
    ("erf", Function::Erf),
    ("erfc", Function::Erfc),
    ("exp", Function::Exp),
    ("exp2", Function::Exp2),
    ("expm1", Function::Expm1),
    ("floor", Function::Floor),
    ("gamma", Function::Gamma),
    ("j0", Function::J0),
    ("j1", Function::J1),
    ("log", Function::Log),
    ("log10", Function::Log10),
    ("log1p", Function::Log1p),
    ("log2", Function::Log2),
    ("logb", Function::Logb),
    ("pow10", Function::Pow10),
    ("round", Function::Round),
    ("roundtoeven", Function::RoundToEven),
    ("sin", Function::Sin),
    ("sinh", Function::Sinh),
    ("sqrt", Function::Sqrt),
    ("tan", Function::Tan),
    ("tanh", Function::Tanh),
    ("trunc", Function::Trunc),
    ("y0", Function::Y0),
    ("y1", Function::Y1),
    ("length", Function::Length),
    ("not", Function::Not),
];

lazy_static! {
    static ref OPERATORS: HashMap<&'static str, BinaryOp> = OPERATOR_TABLE.iter().copied().collect();
    static ref FUNCTIONS: HashMap<&'static str, Function> = FUNCTION_TABLE.iter().copied().collect();
}

/// Characters that may appear in an operator symbol.
pub fn is_operator_char(c: char) -> bool {
    matches!(c, '*' | '/' | '%' | '<' | '>' | '&' | '|' | '^' | '+' | '-' | '=' | '!' | '~')
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<BinaryOp> {
        OPERATORS.get(symbol).copied()
    }

    pub fn symbol(self) -> &'static str {
        OPERATOR_TABLE
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(symbol, _)| *symbol)
            .unwrap_or("?")
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Pow => 6,
            BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::BitAnd
            | BinaryOp::AndNot => 5,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::BitOr | BinaryOp::BitXor => 4,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Match => 3,
            BinaryOp::And => 2,
            BinaryOp::Or => 1,
        }
    }

    pub fn is_right_assoc(self) -> bool {
        matches!(self, BinaryOp::Pow)
    }
}

impl Function {
    pub fn from_name(name: &str) -> Option<Function> {
        FUNCTIONS.get(name).copied()
    }

    pub fn name(self) -> &'static str {
        FUNCTION_TABLE
            .iter()
            .find(|(_, f)| *f == self)
            .map(|(name, _)| *name)
            .unwrap_or("?")
    }

    pub fn apply(self, arg: &Value) -> Result<Value, EvalError> {
        match self {
            Function::Length => length(arg),
            Function::Not => match arg {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(type_error("not", other)),
            },
            _ => {
                let n = arg.as_number().ok_or_else(|| type_error(self.name(), arg))?;
                self.apply_numeric(n).map(Value::Number)
            }
        }
    }

    fn apply_numeric(self, n: &BigDecimal) -> Result<BigDecimal, EvalError> {
        let rounding = match self {
            Function::Ceil => Some(RoundingMode::Ceiling),
            Function::Floor => Some(RoundingMode::Floor),
            Function::Trunc => Some(RoundingMode::Down),
            Function::Round => Some(RoundingMode::HalfUp),
            Function::RoundToEven => Some(RoundingMode::HalfEven),
            _ => None,
        };
        if let Some(mode) = rounding {
            return Ok(n.with_scale_round(0, mode));
        }
        if self == Function::Abs {
            return Ok(n.abs());
        }
        let f: fn(f64) -> f64 = match self {
            Function::Acos => f64::acos,
            Function::Acosh => f64::acosh,
            Function::Asin => f64::asin,
            Function::Asinh => f64::asinh,
            Function::Atan => f64::atan,
            Function::Atanh => f64::atanh,
            Function::Cbrt => f64::cbrt,
            Function::Cos => f64::cos,
            Function::Cosh => f64::cosh,
            Function::Erf => libm::erf,
            Function::Erfc => libm::erfc,
            Function::Exp => f64::exp,
            Function::Exp2 => f64::exp2,
            Function::Expm1 => f64::exp_m1,
            Function::Gamma => libm::tgamma,
            Function::J0 => libm::j0,
            Function::J1 => libm::j1,
            Function::Log => f64::ln,
            Function::Log10 => f64::log10,
            Function::Log1p => f64::ln_1p,
            Function::Log2 => f64::log2,
            Function::Logb => logb,
            Function::Pow10 => libm::exp10,
            Function::Sin => f64::sin,
            Function::Sinh => f64::sinh,
            Function::Sqrt => f64::sqrt,
            Function::Tan => f64::tan,
            Function::Tanh => f64::tanh,
            Function::Y0 => libm::y0,
            Function::Y1 => libm::y1,
            _ => return Err(EvalError::Operation(format!("{} is not numeric", self.name()))),
        };
        from_float(self.name(), f(to_float(n)?))
    }
}

/// Binary exponent of `x`: `logb(8) == 3`, `logb(0.5) == -1`.
fn logb(x: f64) -> f64 {
    if x == 0.0 {
        f64::NEG_INFINITY
    } else if !x.is_finite() {
        x.abs()
    } else {
        f64::from(libm::ilogb(x))
    }
}

fn type_error(name: &str, arg: &Value) -> EvalError {
    EvalError::Operation(format!("{} is not defined for {}", name, arg.type_name()))
}

fn length(arg: &Value) -> Result<Value, EvalError> {
    let len = match arg {
        Value::String(s) => s.chars().count(),
        other => other.len().ok_or_else(|| type_error("length", other))?,
    };
    Ok(Value::Number(BigDecimal::from(len as u64)))
}

fn to_float(n: &BigDecimal) -> Result<f64, EvalError> {
    let text = format_number(n);
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(f),
        _ => Err(EvalError::Operation(format!("{} is outside the floating point range", text))),
    }
}

fn from_float(name: &str, f: f64) -> Result<BigDecimal, EvalError> {
    if !f.is_finite() {
        return Err(EvalError::Operation(format!("result of {} is not a finite number", name)));
    }
    BigDecimal::from_str(&f.to_string())
        .map_err(|e| EvalError::Operation(format!("result of {} is not a number: {}", name, e)))
}

fn to_integer(op: BinaryOp, n: &BigDecimal) -> Result<i64, EvalError> {
    if !n.is_integer() {
        return Err(EvalError::Operation(format!(
            "'{}' requires integers, got {}",
            op.symbol(),
            format_number(n)
        )));
    }
    n.to_i64().ok_or_else(|| {
        EvalError::Operation(format!("'{}' operand {} is out of range", op.symbol(), format_number(n)))
    })
}

fn overflow(op: BinaryOp) -> EvalError {
    EvalError::Operation(format!("arithmetic overflow in '{}'", op.symbol()))
}

/// `base ** exp`, exact for small non-negative integer exponents.
fn pow(base: &BigDecimal, exp: &BigDecimal) -> Result<BigDecimal, EvalError> {
    let small = if exp.is_integer() { exp.to_u32() } else { None };
    match small {
        Some(mut e) if e <= MAX_EXACT_EXPONENT => {
            let mut result = BigDecimal::from(1i64);
            let mut square = base.clone();
            while e > 0 {
                if e & 1 == 1 {
                    result = result * square.clone();
                }
                e >>= 1;
                if e > 0 {
                    square = square.clone() * square;
                }
            }
            Ok(result)
        }
        _ => from_float("**", to_float(base)?.powf(to_float(exp)?)),
    }
}

/// Ordering between two primitives of the same kind.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Test `subject` against an already compiled pattern.
pub fn apply_match(subject: &Value, pattern: &Regex) -> Result<Value, EvalError> {
    match subject {
        Value::String(s) => Ok(Value::Bool(pattern.is_match(s))),
        other => Err(type_error("=~", other)),
    }
}

pub fn apply_binary_op(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(left == right)),
        BinaryOp::Ne => return Ok(Value::Bool(left != right)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(left, right).ok_or_else(|| {
                EvalError::Operation(format!(
                    "cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ))
            })?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            return Ok(Value::Bool(result));
        }
        BinaryOp::And | BinaryOp::Or => {
            return match (left, right) {
                (Value::Bool(a), Value::Bool(b)) => {
                    Ok(Value::Bool(if op == BinaryOp::And { *a && *b } else { *a || *b }))
                }
                _ => Err(EvalError::Operation(format!(
                    "'{}' requires booleans, got {} and {}",
                    op.symbol(),
                    left.type_name(),
                    right.type_name()
                ))),
            };
        }
        BinaryOp::Match => {
            let pattern = right.as_str().ok_or_else(|| type_error("=~", right))?;
            let regex = Regex::new(pattern)
                .map_err(|e| EvalError::Operation(format!("invalid regex '{}': {}", pattern, e)))?;
            return apply_match(left, &regex);
        }
        BinaryOp::Add => {
            if let (Value::String(a), Value::String(b)) = (left, right) {
                return Ok(Value::String(format!("{}{}", a, b)));
            }
        }
        _ => {}
    }

    let (a, b) = match (left, right) {
        (Value::Number(a), Value::Number(b)) => (a, b),
        _ => {
            return Err(EvalError::Operation(format!(
                "'{}' is not defined for {} and {}",
                op.symbol(),
                left.type_name(),
                right.type_name()
            )))
        }
    };

    let result = match op {
        BinaryOp::Add => a.clone() + b.clone(),
        BinaryOp::Sub => a.clone() - b.clone(),
        BinaryOp::Mul => a.clone() * b.clone(),
        BinaryOp::Div | BinaryOp::Rem if b.is_zero() => {
            return Err(EvalError::Operation("division by zero".to_string()))
        }
        BinaryOp::Div => a.clone() / b.clone(),
        BinaryOp::Rem => a.clone() % b.clone(),
        BinaryOp::Pow => pow(a, b)?,
        _ => {
            let (x, y) = (to_integer(op, a)?, to_integer(op, b)?);
            let n = match op {
                BinaryOp::BitAnd => x & y,
                BinaryOp::BitOr => x | y,
                BinaryOp::BitXor => x ^ y,
                BinaryOp::AndNot => x & !y,
                BinaryOp::Shl | BinaryOp::Shr => {
                    let shift = u32::try_from(y).map_err(|_| {
                        EvalError::Operation(format!("negative shift count {}", y))
                    })?;
                    let shifted = if op == BinaryOp::Shl {
                        x.checked_shl(shift)
                    } else {
                        x.checked_shr(shift)
                    };
                    shifted.ok_or_else(|| overflow(op))?
                }
                _ => return Err(overflow(op)),
            };
            BigDecimal::from(n)
        }
    };
    Ok(Value::Number(result))
}
