//! Language builtins: `len`, `abs`, `min`, `max`, `round`, `sum`, `assert`.
//!
//! Builtins are not namespace entries. A call to one is resolved only after
//! the namespace lookup misses, so the specializer never sees them.

use super::library::Native;
use super::value::Value;
use crate::diagnostic::Diagnostic;
use crate::span::Span;

pub fn lookup(name: &str) -> Option<&'static Native> {
    BUILTINS.iter().find(|native| native.name == name)
}

pub fn is_builtin(name: &str) -> bool {
    lookup(name).is_some()
}

fn builtin_len(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::Num(args[0].len()? as f64))
}

fn builtin_abs(args: &[Value]) -> Result<Value, Diagnostic> {
    match &args[0] {
        Value::Num(n) => Ok(Value::Num(n.abs())),
        Value::Array(values) => Ok(Value::array(values.iter().map(|v| v.abs()).collect())),
        other => Err(Diagnostic::type_error(
            format!("abs expects a number or array, found {}", other.type_name()),
            Span::dummy(),
        )),
    }
}

/// `min(array)` or `min(a, b)`; NaN propagates.
fn extremum(args: &[Value], name: &str, pick: fn(f64, f64) -> f64) -> Result<Value, Diagnostic> {
    let fold = |values: &[f64]| {
        values.iter().copied().reduce(|acc, v| {
            if acc.is_nan() || v.is_nan() {
                f64::NAN
            } else {
                pick(acc, v)
            }
        })
    };
    let result = match args {
        [Value::Array(values)] => fold(values.as_slice()),
        [a, b] => fold(&[a.as_num()?, b.as_num()?][..]),
        [other] => {
            return Err(Diagnostic::type_error(
                format!("{} of a single {}", name, other.type_name()),
                Span::dummy(),
            ))
        }
        _ => None,
    };
    result.map(Value::Num).ok_or_else(|| {
        Diagnostic::runtime(format!("{} of an empty array", name), Span::dummy())
    })
}

fn builtin_min(args: &[Value]) -> Result<Value, Diagnostic> {
    extremum(args, "min", f64::min)
}

fn builtin_max(args: &[Value]) -> Result<Value, Diagnostic> {
    extremum(args, "max", f64::max)
}

/// Rounds half to even, like `numpy.round`.
fn builtin_round(args: &[Value]) -> Result<Value, Diagnostic> {
    match &args[0] {
        Value::Num(n) => Ok(Value::Num(n.round_ties_even())),
        Value::Array(values) => Ok(Value::array(
            values.iter().map(|v| v.round_ties_even()).collect(),
        )),
        other => Err(Diagnostic::type_error(
            format!("round expects a number or array, found {}", other.type_name()),
            Span::dummy(),
        )),
    }
}

fn builtin_sum(args: &[Value]) -> Result<Value, Diagnostic> {
    match &args[0] {
        Value::Array(values) => Ok(Value::Num(values.iter().sum())),
        Value::Tuple(values) => {
            let mut total = 0.0;
            for value in values.iter() {
                total += value.as_num()?;
            }
            Ok(Value::Num(total))
        }
        other => Err(Diagnostic::type_error(
            format!("sum expects an array, found {}", other.type_name()),
            Span::dummy(),
        )),
    }
}

fn builtin_assert(args: &[Value]) -> Result<Value, Diagnostic> {
    if args[0].as_bool()? {
        Ok(Value::Unit)
    } else {
        Err(Diagnostic::runtime("assertion failed".to_string(), Span::dummy()))
    }
}

static BUILTINS: &[Native] = &[
    Native { name: "len", min_args: 1, max_args: 1, func: builtin_len },
    Native { name: "abs", min_args: 1, max_args: 1, func: builtin_abs },
    Native { name: "min", min_args: 1, max_args: 2, func: builtin_min },
    Native { name: "max", min_args: 1, max_args: 2, func: builtin_max },
    Native { name: "round", min_args: 1, max_args: 1, func: builtin_round },
    Native { name: "sum", min_args: 1, max_args: 1, func: builtin_sum },
    Native { name: "assert", min_args: 1, max_args: 1, func: builtin_assert },
];

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Result<Value, Diagnostic> {
        lookup(name).unwrap().call(args)
    }

    #[test]
    fn test_min_max_forms() {
        let data = Value::from(vec![3.0, -1.0, 2.0]);
        assert_eq!(call("min", &[data.clone()]).unwrap(), Value::Num(-1.0));
        assert_eq!(call("max", &[data]).unwrap(), Value::Num(3.0));
        assert_eq!(
            call("max", &[Value::Num(1.0), Value::Num(4.0)]).unwrap(),
            Value::Num(4.0)
        );
        assert!(call("min", &[Value::array(Vec::new())]).is_err());
    }

    #[test]
    fn test_round_half_to_even() {
        assert_eq!(call("round", &[Value::Num(2.5)]).unwrap(), Value::Num(2.0));
        assert_eq!(call("round", &[Value::Num(3.5)]).unwrap(), Value::Num(4.0));
    }

    #[test]
    fn test_assert_and_len() {
        assert!(call("assert", &[Value::Bool(true)]).is_ok());
        let err = call("assert", &[Value::Bool(false)]).unwrap_err();
        assert_eq!(err.message, "assertion failed");
        assert_eq!(
            call("len", &[Value::from(vec![1.0, 2.0])]).unwrap(),
            Value::Num(2.0)
        );
    }

    #[test]
    fn test_builtin_names() {
        assert!(is_builtin("sum"));
        assert!(!is_builtin("square"));
    }
}
