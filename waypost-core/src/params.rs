//! Handler parameter declarations and binding.
//!
//! Handlers declare their parameters up front as a list of
//! [`ParameterSpec`]s. At dispatch time each one is looked up by name in the
//! request (path parameters, then query arguments, then, for `POST`, `PUT` and
//! `PATCH`, the decoded body), replaced by its default when absent, and
//! coerced to its declared [`ParamType`]. The handler then receives the bound
//! values as [`Args`].

use crate::Error;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Declared type of a handler parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Float,
    Bool,
    Str,
    /// Any JSON value, passed through untouched.
    Json,
    /// A list; a single value is wrapped into a one-element list.
    List(Box<ParamType>),
}

impl ParamType {
    pub fn list_of(inner: ParamType) -> Self {
        ParamType::List(Box::new(inner))
    }

    /// Convert a raw request value into this type.
    pub fn coerce(&self, raw: &Value) -> Result<Value, String> {
        match self {
            ParamType::Int => coerce_int(raw),
            ParamType::Float => coerce_float(raw),
            ParamType::Bool => coerce_bool(raw),
            ParamType::Str => match raw {
                Value::String(s) => Ok(Value::String(s.clone())),
                Value::Number(n) => Ok(Value::String(n.to_string())),
                Value::Bool(b) => Ok(Value::String(b.to_string())),
                other => Err(format!("expected a string, got {}", other)),
            },
            ParamType::Json => Ok(raw.clone()),
            ParamType::List(inner) => match raw {
                Value::Array(items) => items
                    .iter()
                    .map(|item| inner.coerce(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                single => Ok(Value::Array(vec![inner.coerce(single)?])),
            },
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Int => f.write_str("int"),
            ParamType::Float => f.write_str("float"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Str => f.write_str("str"),
            ParamType::Json => f.write_str("json"),
            ParamType::List(inner) => write!(f, "list[{}]", inner),
        }
    }
}

fn coerce_int(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::from(i));
            }
            match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    Ok(Value::from(f as i64))
                }
                _ => Err(format!("expected an integer, got {}", n)),
            }
        }
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("expected an integer, got \"{}\"", s)),
        other => Err(format!("expected an integer, got {}", other)),
    }
}

fn coerce_float(raw: &Value) -> Result<Value, String> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("expected a number, got {}", raw))
}

fn coerce_bool(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(Value::Bool(false)),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(Value::Bool(true)),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
            _ => Err(format!("expected a boolean, got \"{}\"", s)),
        },
        other => Err(format!("expected a boolean, got {}", other)),
    }
}

/// Declared contract of one handler parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<Value>,
}

impl ParameterSpec {
    /// A required parameter.
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    /// Use `default` when the request does not carry the parameter.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Anything parameters can be looked up in by name.
pub trait ParamSource {
    fn retrieve_param(&self, name: &str) -> Option<&Value>;
}

/// Resolve every spec against `source`.
///
/// Fails with [`Error::MissingParameter`] for the first parameter that is
/// neither present nor defaulted, and with [`Error::InvalidParameter`] for the
/// first value that does not coerce.
pub fn bind(specs: &[ParameterSpec], source: &dyn ParamSource) -> Result<Args, Error> {
    let mut values = Vec::with_capacity(specs.len());

    for spec in specs {
        let raw = source
            .retrieve_param(&spec.name)
            .or(spec.default.as_ref())
            .ok_or_else(|| Error::MissingParameter(spec.name.clone()))?;

        let value = spec
            .ty
            .coerce(raw)
            .map_err(|reason| Error::InvalidParameter {
                name: spec.name.clone(),
                reason,
            })?;
        values.push((spec.name.clone(), value));
    }

    Ok(Args { values })
}

/// Bound parameter values, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    values: Vec<(String, Value)>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a bound value by name and deserialize it.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<T, Error> {
        let value = self
            .value(name)
            .ok_or_else(|| Error::MissingParameter(name.to_string()))?;
        serde_json::from_value(value.clone()).map_err(|e| Error::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, value)| value)
    }

    /// Get a bound value by position.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).map(|(_, value)| value)
    }

    pub fn int(&self, name: &str) -> Result<i64, Error> {
        self.get(name)
    }

    pub fn str(&self, name: &str) -> Result<&str, Error> {
        match self.value(name) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(Error::InvalidParameter {
                name: name.to_string(),
                reason: format!("expected a string, got {}", other),
            }),
            None => Err(Error::MissingParameter(name.to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}
