//! Library modules reachable through qualified names: `math` and `array`.
//!
//! Library primitives are native code. Call sites that name them with a
//! module prefix (`math.erf(x)`) are never rewritten, and a primitive bound
//! into a namespace with `use math.erf` is resolvable but opaque to the
//! specializer.

use statrs::function::{beta, erf, gamma};

use super::value::Value;
use crate::diagnostic::Diagnostic;
use crate::span::Span;

pub type NativeFn = fn(&[Value]) -> Result<Value, Diagnostic>;

/// A native primitive: a builtin or a library function.
pub struct Native {
    /// Qualified name (`math.erf`) for library primitives, bare for builtins.
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub func: NativeFn,
}

impl Native {
    pub fn call(&self, args: &[Value]) -> Result<Value, Diagnostic> {
        if args.len() < self.min_args || args.len() > self.max_args {
            let expected = if self.min_args == self.max_args {
                self.min_args.to_string()
            } else {
                format!("{} to {}", self.min_args, self.max_args)
            };
            return Err(Diagnostic::type_error(
                format!(
                    "`{}` takes {} argument(s), {} given",
                    self.name,
                    expected,
                    args.len()
                ),
                Span::dummy(),
            ));
        }
        (self.func)(args)
    }
}

impl std::fmt::Debug for Native {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<native {}>", self.name)
    }
}

/// Library module names.
pub const MODULES: &[&str] = &["math", "array"];

/// Look up a library function by module and name.
pub fn lookup(module: &str, name: &str) -> Option<&'static Native> {
    let table: &'static [Native] = match module {
        "math" => MATH,
        "array" => ARRAY,
        _ => return None,
    };
    table.iter().find(|native| {
        native
            .name
            .strip_prefix(module)
            .and_then(|rest| rest.strip_prefix('.'))
            == Some(name)
    })
}

/// Look up a library constant such as `math.pi`.
pub fn constant(module: &str, name: &str) -> Option<Value> {
    match (module, name) {
        ("math", "pi") => Some(Value::Num(std::f64::consts::PI)),
        ("math", "e") => Some(Value::Num(std::f64::consts::E)),
        ("math", "nan") => Some(Value::Num(f64::NAN)),
        ("math", "inf") => Some(Value::Num(f64::INFINITY)),
        _ => None,
    }
}

// ─── math ──────────────────────────────────────────────────────────

/// Unary primitives vectorize: an array argument maps elementwise.
fn map_unary(args: &[Value], f: fn(f64) -> f64) -> Result<Value, Diagnostic> {
    match &args[0] {
        Value::Num(x) => Ok(Value::Num(f(*x))),
        Value::Array(values) => Ok(Value::array(values.iter().map(|x| f(*x)).collect())),
        other => Err(Diagnostic::type_error(
            format!("expected a number or array, found {}", other.type_name()),
            Span::dummy(),
        )),
    }
}

macro_rules! unary_primitives {
    ($($fn_name:ident => $f:expr;)*) => {
        $(
            fn $fn_name(args: &[Value]) -> Result<Value, Diagnostic> {
                map_unary(args, $f)
            }
        )*
    };
}

unary_primitives! {
    math_exp => f64::exp;
    math_log => f64::ln;
    math_log10 => f64::log10;
    math_sqrt => f64::sqrt;
    math_sin => f64::sin;
    math_cos => f64::cos;
    math_tan => f64::tan;
    math_tanh => f64::tanh;
    math_atan => f64::atan;
    math_floor => f64::floor;
    math_ceil => f64::ceil;
    math_erf => erf::erf;
    math_erfc => erf::erfc;
    math_gamma => gamma::gamma;
    math_ln_gamma => gamma::ln_gamma;
    math_norm_pdf => norm_pdf;
    math_norm_cdf => norm_cdf;
}

fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

fn norm_cdf(x: f64) -> f64 {
    0.5 * erf::erfc(-x / std::f64::consts::SQRT_2)
}

fn math_atan2(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::Num(args[0].as_num()?.atan2(args[1].as_num()?)))
}

fn math_pow(args: &[Value]) -> Result<Value, Diagnostic> {
    super::value::binary(crate::ast::BinOp::Pow, &args[0], &args[1])
}

fn math_beta(args: &[Value]) -> Result<Value, Diagnostic> {
    let (a, b) = (args[0].as_num()?, args[1].as_num()?);
    beta::checked_beta(a, b).map(Value::Num).map_err(|e| {
        Diagnostic::runtime(format!("math.beta({}, {}): {}", a, b, e), Span::dummy())
    })
}

static MATH: &[Native] = &[
    Native { name: "math.exp", min_args: 1, max_args: 1, func: math_exp },
    Native { name: "math.log", min_args: 1, max_args: 1, func: math_log },
    Native { name: "math.log10", min_args: 1, max_args: 1, func: math_log10 },
    Native { name: "math.sqrt", min_args: 1, max_args: 1, func: math_sqrt },
    Native { name: "math.sin", min_args: 1, max_args: 1, func: math_sin },
    Native { name: "math.cos", min_args: 1, max_args: 1, func: math_cos },
    Native { name: "math.tan", min_args: 1, max_args: 1, func: math_tan },
    Native { name: "math.tanh", min_args: 1, max_args: 1, func: math_tanh },
    Native { name: "math.atan", min_args: 1, max_args: 1, func: math_atan },
    Native { name: "math.atan2", min_args: 2, max_args: 2, func: math_atan2 },
    Native { name: "math.floor", min_args: 1, max_args: 1, func: math_floor },
    Native { name: "math.ceil", min_args: 1, max_args: 1, func: math_ceil },
    Native { name: "math.pow", min_args: 2, max_args: 2, func: math_pow },
    Native { name: "math.erf", min_args: 1, max_args: 1, func: math_erf },
    Native { name: "math.erfc", min_args: 1, max_args: 1, func: math_erfc },
    Native { name: "math.gamma", min_args: 1, max_args: 1, func: math_gamma },
    Native { name: "math.ln_gamma", min_args: 1, max_args: 1, func: math_ln_gamma },
    Native { name: "math.beta", min_args: 2, max_args: 2, func: math_beta },
    Native { name: "math.norm_pdf", min_args: 1, max_args: 1, func: math_norm_pdf },
    Native { name: "math.norm_cdf", min_args: 1, max_args: 1, func: math_norm_cdf },
];

// ─── array ─────────────────────────────────────────────────────────

fn length_arg(value: &Value) -> Result<usize, Diagnostic> {
    let n = value.as_index()?;
    if n < 0 {
        return Err(Diagnostic::runtime(
            format!("array length must be non-negative, found {}", n),
            Span::dummy(),
        ));
    }
    Ok(n as usize)
}

fn array_zeros(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::array(vec![0.0; length_arg(&args[0])?]))
}

fn array_full(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::array(vec![args[1].as_num()?; length_arg(&args[0])?]))
}

fn array_zeros_like(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::array(vec![0.0; args[0].as_array()?.len()]))
}

fn array_full_like(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::array(vec![args[1].as_num()?; args[0].as_array()?.len()]))
}

/// Uninitialized arrays are NaN-filled so stray reads are visible.
fn array_empty(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::array(vec![f64::NAN; length_arg(&args[0])?]))
}

/// `arange(n)`, `arange(start, stop)`, or `arange(start, stop, step)`.
fn array_arange(args: &[Value]) -> Result<Value, Diagnostic> {
    let (start, stop, step) = match args {
        [stop] => (0.0, stop.as_num()?, 1.0),
        [start, stop] => (start.as_num()?, stop.as_num()?, 1.0),
        [start, stop, step] => (start.as_num()?, stop.as_num()?, step.as_num()?),
        _ => unreachable!("arity checked by Native::call"),
    };
    if step == 0.0 || !step.is_finite() {
        return Err(Diagnostic::runtime(
            "arange step must be finite and non-zero".to_string(),
            Span::dummy(),
        ));
    }
    let count = ((stop - start) / step).ceil().max(0.0) as usize;
    Ok(Value::array(
        (0..count).map(|i| start + step * i as f64).collect(),
    ))
}

fn array_sum(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::Num(args[0].as_array()?.iter().sum()))
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn array_mean(args: &[Value]) -> Result<Value, Diagnostic> {
    Ok(Value::Num(mean_of(args[0].as_array()?)))
}

/// Population standard deviation (`ddof = 0`).
fn array_std(args: &[Value]) -> Result<Value, Diagnostic> {
    let values = args[0].as_array()?;
    let mean = mean_of(values);
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Ok(Value::Num(var.sqrt()))
}

fn array_dot(args: &[Value]) -> Result<Value, Diagnostic> {
    let (a, b) = (args[0].as_array()?, args[1].as_array()?);
    if a.len() != b.len() {
        return Err(Diagnostic::runtime(
            format!("array.dot of lengths {} and {}", a.len(), b.len()),
            Span::dummy(),
        ));
    }
    Ok(Value::Num(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()))
}

static ARRAY: &[Native] = &[
    Native { name: "array.zeros", min_args: 1, max_args: 1, func: array_zeros },
    Native { name: "array.full", min_args: 2, max_args: 2, func: array_full },
    Native { name: "array.zeros_like", min_args: 1, max_args: 1, func: array_zeros_like },
    Native { name: "array.full_like", min_args: 2, max_args: 2, func: array_full_like },
    Native { name: "array.empty", min_args: 1, max_args: 1, func: array_empty },
    Native { name: "array.arange", min_args: 1, max_args: 3, func: array_arange },
    Native { name: "array.sum", min_args: 1, max_args: 1, func: array_sum },
    Native { name: "array.mean", min_args: 1, max_args: 1, func: array_mean },
    Native { name: "array.std", min_args: 1, max_args: 1, func: array_std },
    Native { name: "array.dot", min_args: 2, max_args: 2, func: array_dot },
];
