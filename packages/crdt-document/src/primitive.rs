//! The leaf scalar datatype (part of C5). Immutable; a "change" to a
//! primitive is a `Set`/`ArraySet` that replaces it wholesale.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Primitive {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Milliseconds since the Unix epoch.
    Date(i64),
}

impl Primitive {
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Null => "null",
            Primitive::Bool(_) => "bool",
            Primitive::Int32(_) => "i32",
            Primitive::Int64(_) => "i64",
            Primitive::Float64(_) => "f64",
            Primitive::Str(_) => "string",
            Primitive::Bytes(_) => "bytes",
            Primitive::Date(_) => "date",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Primitive::Int32(_) | Primitive::Int64(_) | Primitive::Float64(_)
        )
    }

    /// Add `other` to `self` in place; both operands must be numeric and of
    /// the same tag, per `CRDTCounter::increase`'s contract.
    pub fn checked_add_assign(&mut self, other: &Primitive) -> bool {
        match (self, other) {
            (Primitive::Int32(a), Primitive::Int32(b)) => {
                *a = a.wrapping_add(*b);
                true
            }
            (Primitive::Int64(a), Primitive::Int64(b)) => {
                *a = a.wrapping_add(*b);
                true
            }
            (Primitive::Float64(a), Primitive::Float64(b)) => {
                *a += b;
                true
            }
            _ => false,
        }
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Primitive::Null => serde_json::Value::Null,
            Primitive::Bool(b) => serde_json::Value::Bool(*b),
            Primitive::Int32(n) => serde_json::json!(*n),
            Primitive::Int64(n) => serde_json::json!(*n),
            Primitive::Float64(n) => serde_json::json!(*n),
            Primitive::Str(s) => serde_json::Value::String(s.clone()),
            Primitive::Bytes(b) => serde_json::json!(b),
            Primitive::Date(ms) => serde_json::json!(*ms),
        }
    }

    #[cfg(feature = "serde")]
    pub fn from_datetime(dt: chrono::DateTime<chrono::Utc>) -> Self {
        Primitive::Date(dt.timestamp_millis())
    }

    #[cfg(feature = "serde")]
    pub fn to_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            Primitive::Date(ms) => chrono::DateTime::from_timestamp_millis(*ms),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increase_rejects_non_numeric() {
        let mut s = Primitive::Str("x".into());
        assert!(!s.checked_add_assign(&Primitive::Int32(1)));
    }

    #[test]
    fn increase_rejects_mismatched_numeric_tags() {
        let mut a = Primitive::Int32(1);
        assert!(!a.checked_add_assign(&Primitive::Int64(1)));
    }

    #[test]
    fn increase_accumulates_same_tag() {
        let mut a = Primitive::Int64(3);
        assert!(a.checked_add_assign(&Primitive::Int64(5)));
        assert_eq!(a, Primitive::Int64(8));
    }
}
