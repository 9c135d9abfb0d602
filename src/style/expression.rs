//! Data-driven style expression evaluation.
//!
//! Stylesheet properties may hold a nested JSON array whose head names an
//! operator. [`resolve`] walks such a tree against a feature/zoom context
//! and produces a scalar [`Value`]. Evaluation is pure and allocation
//! stays proportional to the produced value; type mismatches and unknown
//! operators yield [`Value::Null`], which the renderer treats as
//! "invisible for this property".

use serde_json::Value as Json;

use crate::color::Color;
use crate::tile::{Metadata, TagValue};

/// The closed set of recognized operator names.
///
/// `zoom` is the interpolation input placeholder rather than a combinator,
/// but it resolves like any other expression.
const OPERATORS: &[&str] = &[
    "all",
    "case",
    "coalesce",
    "==",
    "!=",
    "<",
    ">",
    "<=",
    ">=",
    "get",
    "has",
    "in",
    "interpolate",
    "match",
    "zoom",
];

/// Scalar result of expression evaluation.
#[derive(Clone, PartialEq, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Color(Color),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(string) => Some(string),
            _ => None,
        }
    }

    /// Interpret the value as a color, parsing string forms.
    pub fn to_color(&self) -> Option<Color> {
        match self {
            Self::Color(color) => Some(*color),
            Self::String(string) => string.parse().ok(),
            _ => None,
        }
    }

    /// Convert a literal JSON value, without expression dispatch.
    pub(crate) fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(bool) => Self::Bool(*bool),
            Json::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
            Json::String(string) => Self::String(string.clone()),
            Json::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            Json::Object(_) => Self::Null,
        }
    }
}

impl From<&TagValue> for Value {
    fn from(tag: &TagValue) -> Self {
        match tag {
            TagValue::String(string) => Self::String(string.clone()),
            TagValue::Number(number) => Self::Number(*number),
            TagValue::Bool(bool) => Self::Bool(*bool),
        }
    }
}

/// Evaluation context for one feature at one viewport state.
#[derive(Copy, Clone)]
pub struct Context<'a> {
    /// Metadata of the feature under evaluation, absent for featureless
    /// properties like the background color.
    pub meta: Option<&'a Metadata>,
    pub map_zoom: f32,
    pub vp_zoom: f32,
}

impl<'a> Context<'a> {
    pub fn new(meta: Option<&'a Metadata>, map_zoom: f32, vp_zoom: f32) -> Self {
        Self { meta, map_zoom, vp_zoom }
    }
}

fn is_operator(name: &str) -> bool {
    OPERATORS.contains(&name)
}

/// Check whether a JSON value would be dispatched as an expression.
pub fn is_expression(json: &Json) -> bool {
    match json {
        Json::Array(items) => {
            matches!(items.first(), Some(Json::String(op)) if is_operator(op))
        },
        _ => false,
    }
}

/// Resolve an expression tree to a scalar.
pub fn resolve(expression: &Json, ctx: &Context) -> Value {
    let Json::Array(items) = expression else {
        return Value::from_json(expression);
    };

    match items.first() {
        Some(Json::String(op)) if is_operator(op) => apply(op, &items[1..], ctx),
        // Arrays with an operator-shaped head are expressions, everything
        // else is a literal.
        Some(Json::String(_)) => Value::Null,
        _ => Value::from_json(expression),
    }
}

fn apply(op: &str, args: &[Json], ctx: &Context) -> Value {
    match op {
        "all" => {
            for arg in args {
                if resolve(arg, ctx) != Value::Bool(true) {
                    return Value::Bool(false);
                }
            }
            Value::Bool(true)
        },
        "case" => {
            let mut pairs = args.chunks_exact(2);
            for pair in &mut pairs {
                if resolve(&pair[0], ctx) == Value::Bool(true) {
                    return resolve(&pair[1], ctx);
                }
            }
            pairs.remainder().first().map_or(Value::Null, |default| resolve(default, ctx))
        },
        "coalesce" => args
            .iter()
            .map(|arg| resolve(arg, ctx))
            .find(|value| !value.is_null())
            .unwrap_or(Value::Null),
        "==" | "!=" | "<" | ">" | "<=" | ">=" => compare(op, args, ctx),
        "get" => {
            let key = resolve(args.first().unwrap_or(&Json::Null), ctx);
            match (ctx.meta, key.as_str()) {
                (Some(meta), Some(key)) => meta.get(key).map_or(Value::Null, Value::from),
                _ => Value::Null,
            }
        },
        "has" => {
            let key = resolve(args.first().unwrap_or(&Json::Null), ctx);
            match (ctx.meta, key.as_str()) {
                (Some(meta), Some(key)) => Value::Bool(meta.contains_key(key)),
                _ => Value::Bool(false),
            }
        },
        "in" => membership(args, ctx),
        "match" => match_op(args, ctx),
        "interpolate" => interpolate(args, ctx),
        "zoom" => Value::Number(ctx.map_zoom as f64),
        _ => Value::Null,
    }
}

/// Two-argument comparison.
///
/// Strings compare lexicographically and numbers numerically; comparing
/// mixed types yields `false` for every operator.
fn compare(op: &str, args: &[Json], ctx: &Context) -> Value {
    let (Some(lhs), Some(rhs)) = (args.first(), args.get(1)) else {
        return Value::Null;
    };
    let lhs = resolve(lhs, ctx);
    let rhs = resolve(rhs, ctx);

    let same_type = std::mem::discriminant(&lhs) == std::mem::discriminant(&rhs);
    let result = match op {
        "==" => same_type && lhs == rhs,
        "!=" => same_type && lhs != rhs,
        _ => {
            let ordering = match (&lhs, &rhs) {
                (Value::Number(lhs), Value::Number(rhs)) => lhs.partial_cmp(rhs),
                (Value::String(lhs), Value::String(rhs)) => Some(lhs.cmp(rhs)),
                _ => None,
            };
            match (op, ordering) {
                (_, None) => false,
                ("<", Some(ordering)) => ordering.is_lt(),
                (">", Some(ordering)) => ordering.is_gt(),
                ("<=", Some(ordering)) => ordering.is_le(),
                (_, Some(ordering)) => ordering.is_ge(),
            }
        },
    };

    Value::Bool(result)
}

/// `in(needle, haystack)` membership test.
fn membership(args: &[Json], ctx: &Context) -> Value {
    let needle = resolve(args.first().unwrap_or(&Json::Null), ctx);

    let found = match args.get(1) {
        Some(Json::Array(items)) if !is_expression(&args[1]) => {
            items.iter().any(|item| Value::from_json(item) == needle)
        },
        Some(haystack) => match resolve(haystack, ctx) {
            Value::Array(items) => items.contains(&needle),
            _ => false,
        },
        None => false,
    };

    Value::Bool(found)
}

/// `match(input, k1, v1, ..., kn, vn, default)` dispatch, first match wins.
///
/// A key may be a literal array, in which case it matches by membership.
fn match_op(args: &[Json], ctx: &Context) -> Value {
    let Some(input) = args.first() else {
        return Value::Null;
    };
    let input = resolve(input, ctx);

    let mut pairs = args[1..].chunks_exact(2);
    for pair in &mut pairs {
        let matched = match &pair[0] {
            Json::Array(keys) => keys.iter().any(|key| Value::from_json(key) == input),
            key => Value::from_json(key) == input,
        };
        if matched {
            return resolve(&pair[1], ctx);
        }
    }

    pairs.remainder().first().map_or(Value::Null, |default| resolve(default, ctx))
}

/// Piecewise interpolation over ascending stops, clamped at both ends.
///
/// Numeric outputs interpolate linearly or exponentially; color outputs
/// interpolate componentwise in sRGB.
fn interpolate(args: &[Json], ctx: &Context) -> Value {
    let base = match args.first() {
        Some(Json::Array(method)) => match method.first().and_then(Json::as_str) {
            Some("linear") => 1.,
            Some("exponential") => method.get(1).and_then(Json::as_f64).unwrap_or(1.),
            _ => return Value::Null,
        },
        _ => return Value::Null,
    };
    let Some(input) = args.get(1).map(|input| resolve(input, ctx)).and_then(|v| v.as_number())
    else {
        return Value::Null;
    };

    let stops: Vec<(f64, &Json)> = args[2..]
        .chunks_exact(2)
        .filter_map(|pair| Some((pair[0].as_f64()?, &pair[1])))
        .collect();
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Value::Null;
    };

    if input <= first.0 {
        return resolve(first.1, ctx);
    }
    if input >= last.0 {
        return resolve(last.1, ctx);
    }

    let Some(index) = stops.windows(2).position(|pair| input <= pair[1].0) else {
        return Value::Null;
    };
    let (start, lower) = stops[index];
    let (end, upper) = stops[index + 1];

    let t = if base == 1. {
        (input - start) / (end - start)
    } else {
        (base.powf(input - start) - 1.) / (base.powf(end - start) - 1.)
    };

    let lower = resolve(lower, ctx);
    let upper = resolve(upper, ctx);
    match (&lower, &upper) {
        (Value::Number(lower), Value::Number(upper)) => {
            Value::Number(lower + (upper - lower) * t)
        },
        _ => match (lower.to_color(), upper.to_color()) {
            (Some(lower), Some(upper)) => Value::Color(lower.mix(upper, t as f32)),
            _ => Value::Null,
        },
    }
}

/// Validate an expression tree for stylesheet parsing.
///
/// Unlike [`resolve`], which degrades unknown operators to null at
/// runtime, parsing rejects them outright so a bad stylesheet fails as a
/// whole.
pub fn validate(expression: &Json) -> Result<(), String> {
    let Json::Array(items) = expression else {
        return Ok(());
    };
    let Some(Json::String(op)) = items.first() else {
        return Ok(());
    };
    if !is_operator(op) {
        return Err(format!("unknown operator {op:?}"));
    }

    let args = &items[1..];
    match op.as_str() {
        "match" => {
            if let Some(input) = args.first() {
                validate(input)?;
            }
            // Keys are literals; only the branch values are expressions.
            let mut pairs = args.get(1..).unwrap_or_default().chunks_exact(2);
            for pair in &mut pairs {
                validate(&pair[1])?;
            }
            if let Some(default) = pairs.remainder().first() {
                validate(default)?;
            }
            Ok(())
        },
        "interpolate" => {
            let method = args.first().and_then(Json::as_array);
            match method.and_then(|method| method.first()).and_then(Json::as_str) {
                Some("linear" | "exponential") => (),
                _ => return Err("invalid interpolation method".into()),
            }
            for pair in args.get(2..).unwrap_or_default().chunks_exact(2) {
                if pair[0].as_f64().is_none() {
                    return Err("non-numeric interpolation stop".into());
                }
                validate(&pair[1])?;
            }
            args.get(1).map_or(Ok(()), validate)
        },
        "in" => {
            if let Some(needle) = args.first() {
                validate(needle)?;
            }
            // The haystack may be a literal array of scalars.
            match args.get(1) {
                Some(haystack) if is_expression(haystack) => validate(haystack),
                _ => Ok(()),
            }
        },
        _ => args.iter().try_for_each(validate),
    }
}
