//! Pagination, sorting and filtering criteria for run listings.
//!
//! `ListOptions` is what an engine receives after the orchestration layer
//! has checked every field name. Page tokens are opaque to callers: a
//! hex-encoded JSON cursor carrying the sort, the filter and the offset of
//! the next page, so follow-up requests keep the first request's criteria.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Page size used when the caller passes 0.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Larger page sizes are clamped to this.
pub const MAX_PAGE_SIZE: usize = 200;

/// Field runs are ordered by when the caller does not ask for one.
pub const DEFAULT_SORT_FIELD: &str = "created_at";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: DEFAULT_SORT_FIELD.to_string(),
            descending: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredicateOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
    In,
    IsSubstring,
}

/// A single `key op value` condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub key: String,
    pub op: PredicateOp,
    #[serde(default)]
    pub value: Value,
}

impl Predicate {
    /// Evaluate against the value of `key` on one record (`None` when the
    /// record has no such field).
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let Some(actual) = actual else {
            return matches!(self.op, PredicateOp::NotEquals);
        };
        match self.op {
            PredicateOp::Equals => compare_field_values(actual, &self.value) == Ordering::Equal,
            PredicateOp::NotEquals => compare_field_values(actual, &self.value) != Ordering::Equal,
            PredicateOp::GreaterThan => {
                compare_field_values(actual, &self.value) == Ordering::Greater
            }
            PredicateOp::GreaterThanEquals => {
                compare_field_values(actual, &self.value) != Ordering::Less
            }
            PredicateOp::LessThan => compare_field_values(actual, &self.value) == Ordering::Less,
            PredicateOp::LessThanEquals => {
                compare_field_values(actual, &self.value) != Ordering::Greater
            }
            PredicateOp::In => self
                .value
                .as_array()
                .map(|candidates| {
                    candidates
                        .iter()
                        .any(|c| compare_field_values(actual, c) == Ordering::Equal)
                })
                .unwrap_or(false),
            PredicateOp::IsSubstring => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
        }
    }
}

/// Conjunction of predicates. An empty filter matches everything.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Total order over the JSON values a run field can take.
///
/// Null sorts first, numbers compare numerically, strings lexically.
/// Mixed kinds fall back to comparing their JSON text.
pub fn compare_field_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Validated listing criteria handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub page_size: usize,
    pub sort: SortSpec,
    pub filter: Filter,
    /// Number of matching records to skip.
    pub offset: usize,
}

#[derive(Serialize, Deserialize)]
struct PageCursor {
    sort: SortSpec,
    filter: Filter,
    offset: usize,
}

impl ListOptions {
    pub fn new(page_size: usize, sort: SortSpec, filter: Filter) -> Self {
        Self {
            page_size,
            sort,
            filter,
            offset: 0,
        }
    }

    /// Resume a listing from a token produced by [`ListOptions::next_page_token`].
    ///
    /// The token's sort and filter win over whatever the follow-up request
    /// carries; only the page size is taken from the new request.
    pub fn from_page_token(token: &str, page_size: usize) -> Result<Self, EngineError> {
        let bytes = hex::decode(token)?;
        let cursor: PageCursor = serde_json::from_slice(&bytes)?;
        Ok(Self {
            page_size,
            sort: cursor.sort,
            filter: cursor.filter,
            offset: cursor.offset,
        })
    }

    /// Token for the page after one that returned `returned` of `total`
    /// matching records, or an empty string when this was the last page.
    pub fn next_page_token(&self, returned: usize, total: usize) -> String {
        let next_offset = self.offset + returned;
        if returned == 0 || next_offset >= total {
            return String::new();
        }
        let cursor = PageCursor {
            sort: self.sort.clone(),
            filter: self.filter.clone(),
            offset: next_offset,
        };
        match serde_json::to_vec(&cursor) {
            Ok(bytes) => hex::encode(bytes),
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode page token");
                String::new()
            }
        }
    }
}
