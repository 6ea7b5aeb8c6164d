//! Requirement match filters.
//!
//! A [`Filter`] is the predicate half of a requirement: it decides whether a
//! capability's attribute map satisfies the requirement. Filters are plain
//! data so they can be serialized alongside the rest of the model, and they
//! render in the conventional LDAP style for diagnostics.
//!
//! This is an evaluator, not a query engine — candidate lookup order and
//! indexing are the environment's concern.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::foundation::Value;

/// Attribute map carried by capabilities and matched by filters.
pub type Attrs = IndexMap<String, Value>;

/// Match predicate over an attribute map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches everything.
    Always,
    /// Attribute equals the value. A list attribute matches when any
    /// element equals the value.
    Eq(String, Value),
    /// Attribute is present, whatever its value.
    Present(String),
    /// String attribute starts with the prefix. Used for wildcard dynamic
    /// imports (`com.foo.*`).
    Prefix(String, String),
    /// Attribute is ordered and >= the value.
    Gte(String, Value),
    /// Attribute is ordered and <= the value.
    Lte(String, Value),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Evaluates the filter against an attribute map.
    pub fn matches(&self, attrs: &Attrs) -> bool {
        match self {
            Filter::Always => true,
            Filter::Eq(key, expected) => attrs
                .get(key)
                .map_or(false, |actual| value_eq(actual, expected)),
            Filter::Present(key) => attrs.contains_key(key),
            Filter::Prefix(key, prefix) => attrs
                .get(key)
                .and_then(Value::as_str)
                .map_or(false, |s| s.starts_with(prefix)),
            Filter::Gte(key, bound) => {
                cmp_values(attrs.get(key), bound).map_or(false, |ord| ord.is_ge())
            }
            Filter::Lte(key, bound) => {
                cmp_values(attrs.get(key), bound).map_or(false, |ord| ord.is_le())
            }
            Filter::And(filters) => filters.iter().all(|f| f.matches(attrs)),
            Filter::Or(filters) => filters.iter().any(|f| f.matches(attrs)),
            Filter::Not(inner) => !inner.matches(attrs),
        }
    }

    /// Reports whether the filter constrains the given attribute key
    /// anywhere in its tree. Capabilities with a `mandatory` directive only
    /// match filters that reference every listed attribute.
    pub fn references(&self, key: &str) -> bool {
        match self {
            Filter::Always => false,
            Filter::Eq(k, _)
            | Filter::Present(k)
            | Filter::Prefix(k, _)
            | Filter::Gte(k, _)
            | Filter::Lte(k, _) => k == key,
            Filter::And(filters) | Filter::Or(filters) => {
                filters.iter().any(|f| f.references(key))
            }
            Filter::Not(inner) => inner.references(key),
        }
    }
}

fn value_eq(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match actual {
        Value::List(items) => items.iter().any(|item| item == expected),
        _ => false,
    }
}

fn cmp_values(actual: Option<&Value>, bound: &Value) -> Option<std::cmp::Ordering> {
    match (actual?, bound) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Version(a), Value::Version(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Always => write!(f, "(*)"),
            Filter::Eq(k, v) => write!(f, "({}={})", k, v),
            Filter::Present(k) => write!(f, "({}=*)", k),
            Filter::Prefix(k, p) => write!(f, "({}={}*)", k, p),
            Filter::Gte(k, v) => write!(f, "({}>={})", k, v),
            Filter::Lte(k, v) => write!(f, "({}<={})", k, v),
            Filter::And(filters) => {
                write!(f, "(&")?;
                for inner in filters {
                    write!(f, "{}", inner)?;
                }
                write!(f, ")")
            }
            Filter::Or(filters) => {
                write!(f, "(|")?;
                for inner in filters {
                    write!(f, "{}", inner)?;
                }
                write!(f, ")")
            }
            Filter::Not(inner) => write!(f, "(!{})", inner),
        }
    }
}
