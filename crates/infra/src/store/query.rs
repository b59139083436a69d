//! Filtered, sorted, paginated document queries.
//!
//! A [`Query`] is evaluated by each backend: the in-memory store walks the
//! JSON bodies with [`Condition::matches`], Postgres translates the same
//! conditions into JSONB operators.

use std::cmp::Ordering;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Pagination parameters for document queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of documents to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Pagination {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One predicate over a dotted field path of the document body.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq { path: String, value: JsonValue },
    /// Case-insensitive substring match on a string field.
    Contains { path: String, needle: String },
    Gte { path: String, value: JsonValue },
    Lte { path: String, value: JsonValue },
}

impl Condition {
    pub fn path(&self) -> &str {
        match self {
            Condition::Eq { path, .. }
            | Condition::Contains { path, .. }
            | Condition::Gte { path, .. }
            | Condition::Lte { path, .. } => path,
        }
    }

    pub fn matches(&self, body: &JsonValue) -> bool {
        let Some(field) = lookup(body, self.path()) else {
            return false;
        };
        match self {
            Condition::Eq { value, .. } => json_eq(field, value),
            Condition::Contains { needle, .. } => field
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&needle.to_lowercase())),
            Condition::Gte { value, .. } => {
                matches!(compare_json(field, value), Some(Ordering::Greater | Ordering::Equal))
            }
            Condition::Lte { value, .. } => {
                matches!(compare_json(field, value), Some(Ordering::Less | Ordering::Equal))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub path: String,
    pub descending: bool,
}

/// Conjunction of conditions, optional sort and optional pagination.
///
/// Without a sort, documents come back in id order (ids are time-ordered, so
/// this is insertion order). Without pagination every match is returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub conditions: Vec<Condition>,
    pub sort: Option<Sort>,
    pub pagination: Option<Pagination>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.conditions.push(Condition::Eq {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn contains(mut self, path: impl Into<String>, needle: impl Into<String>) -> Self {
        self.conditions.push(Condition::Contains {
            path: path.into(),
            needle: needle.into(),
        });
        self
    }

    pub fn gte(mut self, path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.conditions.push(Condition::Gte {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn lte(mut self, path: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.conditions.push(Condition::Lte {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn sort_asc(mut self, path: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            path: path.into(),
            descending: false,
        });
        self
    }

    pub fn sort_desc(mut self, path: impl Into<String>) -> Self {
        self.sort = Some(Sort {
            path: path.into(),
            descending: true,
        });
        self
    }

    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn matches(&self, body: &JsonValue) -> bool {
        self.conditions.iter().all(|c| c.matches(body))
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Number of matches across all pages.
    pub total: u64,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, pagination: Option<Pagination>) -> Self {
        let has_more = match pagination {
            Some(p) => u64::from(p.offset) + (items.len() as u64) < total,
            None => false,
        };
        Self {
            items,
            total,
            has_more,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
            total: self.total,
            has_more: self.has_more,
        })
    }
}

/// Resolve a dotted path (`"settlement.payment_status"`) inside a JSON body.
pub fn lookup<'a>(body: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    path.split('.').try_fold(body, |node, segment| node.get(segment))
}

fn json_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Order two JSON scalars of the same kind; `None` for mixed or composite values.
///
/// Two RFC 3339 timestamps compare as instants: their text differs in the
/// number of fractional digits, so byte order is not time order.
pub fn compare_json(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        (JsonValue::Null, JsonValue::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
