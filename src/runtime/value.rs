//! Runtime values and the arithmetic defined on them.

use std::fmt;
use std::sync::Arc;

use crate::ast::{BinOp, UnaryOp};
use crate::diagnostic::Diagnostic;
use crate::span::Span;

/// A value flowing through an interpreted or compiled function.
///
/// Arrays are shared and copy-on-write: cloning a value is cheap, and an
/// indexed store only copies the buffer when another holder still sees it.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Num(f64),
    Bool(bool),
    Array(Arc<Vec<f64>>),
    Tuple(Arc<Vec<Value>>),
    Unit,
}

impl Value {
    pub fn array(values: Vec<f64>) -> Self {
        Value::Array(Arc::new(values))
    }

    pub fn tuple(values: Vec<Value>) -> Self {
        Value::Tuple(Arc::new(values))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Num(_) => "number",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Tuple(_) => "tuple",
            Value::Unit => "unit",
        }
    }

    pub fn as_num(&self) -> Result<f64, Diagnostic> {
        match self {
            Value::Num(n) => Ok(*n),
            other => Err(expected("a number", other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Diagnostic> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(expected("a bool", other)),
        }
    }

    pub fn as_array(&self) -> Result<&Arc<Vec<f64>>, Diagnostic> {
        match self {
            Value::Array(values) => Ok(values),
            other => Err(expected("an array", other)),
        }
    }

    /// Interpret a number as a loop bound or index.
    pub fn as_index(&self) -> Result<i64, Diagnostic> {
        let n = self.as_num()?;
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(Diagnostic::type_error(
                format!("expected an integer, found {}", n),
                Span::dummy(),
            ));
        }
        Ok(n as i64)
    }

    pub fn len(&self) -> Result<usize, Diagnostic> {
        match self {
            Value::Array(values) => Ok(values.len()),
            Value::Tuple(values) => Ok(values.len()),
            other => Err(expected("an array or tuple", other)),
        }
    }

    /// Element at `index`; negative indices count from the end.
    pub fn index(&self, index: i64) -> Result<Value, Diagnostic> {
        match self {
            Value::Array(values) => {
                let i = resolve_index(index, values.len())?;
                Ok(Value::Num(values[i]))
            }
            Value::Tuple(values) => {
                let i = resolve_index(index, values.len())?;
                Ok(values[i].clone())
            }
            other => Err(expected("an array or tuple", other)),
        }
    }

    /// `x[start..end]`, clamped to the array bounds.
    pub fn slice(&self, start: i64, end: i64) -> Result<Value, Diagnostic> {
        let values = self.as_array()?;
        let len = values.len() as i64;
        let clamp = |i: i64| {
            let i = if i < 0 { i + len } else { i };
            i.clamp(0, len) as usize
        };
        let (start, end) = (clamp(start), clamp(end));
        if start >= end {
            return Ok(Value::array(Vec::new()));
        }
        Ok(Value::array(values[start..end].to_vec()))
    }

    /// Store `value` at `index`, copying the buffer only if it is shared.
    pub fn store(&mut self, index: i64, value: &Value) -> Result<(), Diagnostic> {
        let element = value.as_num()?;
        match self {
            Value::Array(values) => {
                let i = resolve_index(index, values.len())?;
                Arc::make_mut(values)[i] = element;
                Ok(())
            }
            other => Err(expected("an array", other)),
        }
    }

    /// Split a tuple or array into exactly `count` values.
    pub fn unpack(self, count: usize) -> Result<Vec<Value>, Diagnostic> {
        let parts: Vec<Value> = match self {
            Value::Tuple(values) => values.as_ref().clone(),
            Value::Array(values) => values.iter().map(|v| Value::Num(*v)).collect(),
            other => {
                return Err(Diagnostic::type_error(
                    format!("cannot destructure a {}", other.type_name()),
                    Span::dummy(),
                ))
            }
        };
        if parts.len() != count {
            return Err(Diagnostic::type_error(
                format!("expected {} value(s) to unpack, found {}", count, parts.len()),
                Span::dummy(),
            ));
        }
        Ok(parts)
    }
}

fn resolve_index(index: i64, len: usize) -> Result<usize, Diagnostic> {
    let resolved = if index < 0 { index + len as i64 } else { index };
    if resolved < 0 || resolved >= len as i64 {
        return Err(Diagnostic::runtime(
            format!("index {} out of bounds for length {}", index, len),
            Span::dummy(),
        ));
    }
    Ok(resolved as usize)
}

fn expected(what: &str, found: &Value) -> Diagnostic {
    Diagnostic::type_error(
        format!("expected {}, found {}", what, found.type_name()),
        Span::dummy(),
    )
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Num(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<f64>> for Value {
    fn from(values: Vec<f64>) -> Self {
        Value::array(values)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Tuple(values) => {
                write!(f, "(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                if values.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Unit => write!(f, "()"),
        }
    }
}

// ─── Operators ─────────────────────────────────────────────────────

/// Apply a non-short-circuit binary operator.
///
/// Arithmetic broadcasts: number with array applies elementwise, two arrays
/// must have equal length.
pub fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, Diagnostic> {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem | BinOp::Pow => {
            arithmetic(op, lhs, rhs)
        }
        BinOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let (a, b) = (lhs.as_num()?, rhs.as_num()?);
            let result = match op {
                BinOp::Lt => a < b,
                BinOp::Le => a <= b,
                BinOp::Gt => a > b,
                _ => a >= b,
            };
            Ok(Value::Bool(result))
        }
        BinOp::And => Ok(Value::Bool(lhs.as_bool()? && rhs.as_bool()?)),
        BinOp::Or => Ok(Value::Bool(lhs.as_bool()? || rhs.as_bool()?)),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    lhs == rhs
}

fn arithmetic(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, Diagnostic> {
    let f = scalar_op(op);
    match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => Ok(Value::Num(f(*a, *b))),
        (Value::Array(a), Value::Num(b)) => Ok(Value::array(a.iter().map(|x| f(*x, *b)).collect())),
        (Value::Num(a), Value::Array(b)) => Ok(Value::array(b.iter().map(|y| f(*a, *y)).collect())),
        (Value::Array(a), Value::Array(b)) => {
            if a.len() != b.len() {
                return Err(Diagnostic::runtime(
                    format!(
                        "operands of `{}` have different lengths ({} and {})",
                        op.as_str(),
                        a.len(),
                        b.len()
                    ),
                    Span::dummy(),
                ));
            }
            Ok(Value::array(
                a.iter().zip(b.iter()).map(|(x, y)| f(*x, *y)).collect(),
            ))
        }
        _ => Err(Diagnostic::type_error(
            format!(
                "cannot apply `{}` to {} and {}",
                op.as_str(),
                lhs.type_name(),
                rhs.type_name()
            ),
            Span::dummy(),
        )),
    }
}

fn scalar_op(op: BinOp) -> fn(f64, f64) -> f64 {
    match op {
        BinOp::Add => |a, b| a + b,
        BinOp::Sub => |a, b| a - b,
        BinOp::Mul => |a, b| a * b,
        BinOp::Div => |a, b| a / b,
        // sign follows the divisor
        BinOp::Rem => |a, b| a - b * (a / b).floor(),
        _ => f64::powf,
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, Diagnostic> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Num(n)) => Ok(Value::Num(-n)),
        (UnaryOp::Neg, Value::Array(values)) => {
            Ok(Value::array(values.iter().map(|v| -v).collect()))
        }
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, other) => Err(Diagnostic::type_error(
            format!("cannot apply `{}` to {}", op.as_str(), other.type_name()),
            Span::dummy(),
        )),
    }
}
