// src/value.rs

use serde::Serialize;
use std::fmt;

/// z-scores used to move between confidence levels.
const Z90: f64 = 1.645;
const Z95: f64 = 1.96;
const Z99: f64 = 2.575;

/// A data cell, typed opportunistically from its text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Integer, then float, then the text unchanged.
    pub fn coerce(s: &str) -> Value {
        let t = s.trim();
        if let Ok(i) = t.parse::<i64>() {
            return Value::Int(i);
        }
        match t.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float(f),
            _ => Value::Text(s.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// An estimate together with its 90% margin of error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Estimate {
    pub value: Value,
    pub margin90: Value,
}

impl Estimate {
    pub fn new(value: Value, margin90: Value) -> Self {
        Estimate { value, margin90 }
    }

    pub fn parse(value: &str, margin90: &str) -> Self {
        Estimate::new(Value::coerce(value), Value::coerce(margin90))
    }

    /// Census publishes negative margins as codes (e.g. controlled estimates), so only
    /// non-negative margins produce derived statistics.
    fn margin(&self) -> Option<f64> {
        self.margin90.as_f64().filter(|m| *m >= 0.0)
    }

    pub fn standard_error(&self) -> Option<f64> {
        self.margin().map(|m| m / Z90)
    }

    /// Standard error as a percentage of the estimate.
    pub fn relative_standard_error(&self) -> Option<f64> {
        let v = self.value.as_f64()?;
        if v == 0.0 {
            return None;
        }
        self.standard_error().map(|se| se / v.abs() * 100.0)
    }

    pub fn margin95(&self) -> Option<f64> {
        self.standard_error().map(|se| se * Z95)
    }

    pub fn margin99(&self) -> Option<f64> {
        self.standard_error().map(|se| se * Z99)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_order() {
        assert_eq!(Value::coerce("42"), Value::Int(42));
        assert_eq!(Value::coerce("-3"), Value::Int(-3));
        assert_eq!(Value::coerce("4.5"), Value::Float(4.5));
        assert_eq!(Value::coerce("."), Value::Text(".".into()));
        assert_eq!(Value::coerce(""), Value::Text(String::new()));
        assert_eq!(Value::coerce("NaN"), Value::Text("NaN".into()));
    }

    #[test]
    fn derived_margins() {
        let e = Estimate::parse("1000", "164.5");
        let se = e.standard_error().unwrap();
        assert!((se - 100.0).abs() < 1e-9);
        assert!((e.margin95().unwrap() - 196.0).abs() < 1e-9);
        assert!((e.margin99().unwrap() - 257.5).abs() < 1e-9);
        assert!((e.relative_standard_error().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn coded_margins_have_no_statistics() {
        let e = Estimate::parse("12", "-222222222");
        assert_eq!(e.standard_error(), None);
        assert_eq!(Estimate::parse("0", "5").relative_standard_error(), None);
    }
}
