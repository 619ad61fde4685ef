//! Statically declared field accessors for stored records
//!
//! The engine stores every record as an opaque blob, so filtering by field
//! means decoding a record and then looking at a handful of its fields by
//! name. Each record type declares a table of `(name, getter, setter)`
//! entries; predicates and patches go through that table instead of
//! inspecting the struct at runtime.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};

use crate::storage::{StoreError, StoreResult};

/// Reserved projection name under which the storage key is exposed.
pub const KEY_FIELD: &str = "_key";

/// A single field value as seen by predicates and patches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Time(DateTime<Utc>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn into_string(self) -> Option<String> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Exact match against the textual form used by wire filters.
    ///
    /// Booleans compare against `true`/`false`, integers against their
    /// decimal form and times against an RFC 3339 instant.
    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            FieldValue::Str(s) => s == text,
            FieldValue::Bool(b) => text.parse::<bool>().is_ok_and(|t| t == *b),
            FieldValue::Int(i) => text.parse::<i64>().is_ok_and(|t| t == *i),
            FieldValue::Time(t) => DateTime::parse_from_rfc3339(text)
                .is_ok_and(|parsed| parsed.with_timezone(&Utc) == *t),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "string",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Time(_) => "time",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        FieldValue::Time(value)
    }
}

/// Reads one field out of a record.
pub type Getter<T> = fn(&T) -> FieldValue;

/// Writes one field of a record. Returns `None` when the value has the
/// wrong type for the field.
pub type Setter<T> = fn(&mut T, FieldValue) -> Option<()>;

/// One entry of a record's accessor table.
pub struct Field<T: 'static> {
    pub name: &'static str,
    pub get: Getter<T>,
    pub set: Option<Setter<T>>,
}

impl<T: 'static> Field<T> {
    /// A field that can be read and filtered on but never patched.
    pub const fn read_only(name: &'static str, get: Getter<T>) -> Self {
        Self {
            name,
            get,
            set: None,
        }
    }

    /// A field that can also be patched through `Record::apply`.
    pub const fn writable(name: &'static str, get: Getter<T>, set: Setter<T>) -> Self {
        Self {
            name,
            get,
            set: Some(set),
        }
    }
}

/// Field-name to value mapping handed to query predicates.
///
/// Only the requested fields are present, plus the storage key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    values: HashMap<&'static str, FieldValue>,
}

impl Projection {
    pub fn new(key: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(KEY_FIELD, FieldValue::Str(key.to_string()));
        Self { values }
    }

    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn key(&self) -> &str {
        self.str(KEY_FIELD).unwrap_or_default()
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    /// Missing or non-boolean fields read as `false`.
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(FieldValue::as_bool).unwrap_or(false)
    }

    pub fn time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get(name).and_then(FieldValue::as_time)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A record type that lives in one bucket of the engine.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Bucket the record is stored in.
    const BUCKET: &'static str;

    /// The record's accessor table.
    fn fields() -> &'static [Field<Self>];

    /// Key the record is stored under.
    fn storage_key(&self) -> String;

    fn field(name: &str) -> Option<&'static Field<Self>> {
        Self::fields().iter().find(|f| f.name == name)
    }

    /// Fail fast on field names the accessor table does not declare.
    fn check_fields<S: AsRef<str>>(names: &[S]) -> StoreResult<()> {
        for name in names {
            let name = name.as_ref();
            if name != KEY_FIELD && Self::field(name).is_none() {
                return Err(StoreError::InvalidArgument(format!(
                    "unknown field `{}` for bucket `{}`",
                    name,
                    Self::BUCKET
                )));
            }
        }
        Ok(())
    }

    /// Project the named fields (plus the key) into a `Projection`.
    fn project<S: AsRef<str>>(&self, key: &str, names: &[S]) -> Projection {
        let mut projection = Projection::new(key);
        for name in names {
            if let Some(field) = Self::field(name.as_ref()) {
                projection.insert(field.name, (field.get)(self));
            }
        }
        projection
    }

    /// Patch one field by name.
    fn apply(&mut self, name: &str, value: FieldValue) -> StoreResult<()> {
        let field = Self::field(name).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "unknown field `{}` for bucket `{}`",
                name,
                Self::BUCKET
            ))
        })?;
        let set = field.set.ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "field `{}` of bucket `{}` is immutable",
                name,
                Self::BUCKET
            ))
        })?;
        let kind = value.kind();
        set(self, value).ok_or_else(|| {
            StoreError::InvalidArgument(format!(
                "field `{}` of bucket `{}` cannot hold a {} value",
                name,
                Self::BUCKET,
                kind
            ))
        })
    }
}
