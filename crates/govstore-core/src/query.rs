//! Exact-match filters and in-memory pagination for list operations

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::record::{Projection, Record};
use crate::storage::{StoreError, StoreResult};

/// Conjunction of `field == value` conditions keyed by snake_case field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    entries: BTreeMap<String, String>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition (builder style).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Field names the filter needs to see in a projection.
    pub fn fields(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Reject filter keys the record type does not declare.
    pub fn validate<T: Record>(&self) -> StoreResult<()> {
        T::check_fields(&self.fields())
    }

    /// True when every condition holds. A field absent from the projection
    /// never matches.
    pub fn matches(&self, projection: &Projection) -> bool {
        self.entries.iter().all(|(field, expected)| {
            projection
                .get(field)
                .is_some_and(|value| value.matches_text(expected))
        })
    }
}

impl From<HashMap<String, String>> for Filters {
    fn from(map: HashMap<String, String>) -> Self {
        Self {
            entries: map.into_iter().collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Filters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// What a list call returns when `offset` is past the end of the results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetOverflow {
    /// Reset the window to (0, unlimited) and return the whole result set.
    /// This is what existing clients observe on the wire.
    #[default]
    ReturnAll,
    /// Return an empty page.
    EmptyPage,
}

impl fmt::Display for OffsetOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetOverflow::ReturnAll => f.write_str("return_all"),
            OffsetOverflow::EmptyPage => f.write_str("empty_page"),
        }
    }
}

impl FromStr for OffsetOverflow {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "return_all" => Ok(OffsetOverflow::ReturnAll),
            "empty_page" => Ok(OffsetOverflow::EmptyPage),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown offset overflow policy `{}`",
                other
            ))),
        }
    }
}

/// Cut the `(offset, limit)` window out of an already sorted result set.
pub fn paginate<T>(items: Vec<T>, offset: u32, limit: u32, policy: OffsetOverflow) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);

    if offset >= items.len() {
        return match policy {
            OffsetOverflow::ReturnAll => items,
            OffsetOverflow::EmptyPage => Vec::new(),
        };
    }

    items.into_iter().skip(offset).take(limit).collect()
}
