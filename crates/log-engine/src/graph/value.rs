//! Property values

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use super::ObjId;

/// Value stored in an object's property bag or returned by a rule condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Reference to another tracked object
    Obj(ObjId),
}

impl PropValue {
    /// Truthiness used by merge and by rule conditions.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Text(s) => !s.is_empty(),
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0 && !f.is_nan(),
            Self::Bool(b) => *b,
            Self::Obj(_) => true,
        }
    }

    /// Numeric view, parsing text when it looks like a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Bool(_) | Self::Obj(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Orders numerically when both sides are numbers, lexically otherwise.
    pub fn compare(&self, other: &str) -> Option<Ordering> {
        let numeric = self.as_f64().zip(other.trim().parse::<f64>().ok());
        match numeric {
            Some((a, b)) => a.partial_cmp(&b),
            None => Some(self.to_string().as_str().cmp(other)),
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Obj(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for PropValue {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for PropValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u32> for PropValue {
    fn from(i: u32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<u64> for PropValue {
    fn from(i: u64) -> Self {
        match i64::try_from(i) {
            Ok(v) => Self::Int(v),
            Err(_) => Self::Float(i as f64),
        }
    }
}

impl From<usize> for PropValue {
    fn from(i: usize) -> Self {
        Self::from(i as u64)
    }
}

impl From<f64> for PropValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<ObjId> for PropValue {
    fn from(id: ObjId) -> Self {
        Self::Obj(id)
    }
}
