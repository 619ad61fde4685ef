//! Filtered query engine
//!
//! Typed point access and predicate scans over one bucket. The engine has
//! no secondary index: [`Tx::load_values_by_filter`] decodes every record
//! in the bucket and costs O(bucket size). That is fine at control-plane
//! configuration volumes (thousands of rows) and is the scaling ceiling of
//! this store; a real index on the projected fields would be a drop-in
//! optimization.
//!
//! Results are keyed by storage key in the engine's native key order. The
//! order carries no meaning; callers sort and paginate after collecting
//! the full match set.
//!
//! Every operation exists on an open [`Tx`], for work that must be atomic,
//! and on [`TxHandler`], where each call is its own transaction.

use std::collections::BTreeMap;

use govstore_core::{FieldValue, Projection, Record};

use crate::codec::{decode, encode};
use crate::error::Result;
use crate::handler::{Tx, TxHandler};

impl<'a> Tx<'a> {
    /// Fetch the records stored under `keys`. Absent keys are omitted.
    pub fn load_values<T, S>(&self, keys: &[S]) -> Result<BTreeMap<String, T>>
    where
        T: Record,
        S: AsRef<str>,
    {
        let mut values = BTreeMap::new();
        for key in keys {
            let key = key.as_ref();
            if let Some(bytes) = self.get_raw(T::BUCKET, key)? {
                values.insert(key.to_string(), decode::<T>(key, &bytes)?);
            }
        }
        Ok(values)
    }

    /// Fetch the record stored under `key`, if any.
    pub fn load_value<T: Record>(&self, key: &str) -> Result<Option<T>> {
        match self.get_raw(T::BUCKET, key)? {
            Some(bytes) => Ok(Some(decode::<T>(key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Scan the whole bucket, returning every record whose projection onto
    /// `fields` satisfies `predicate`.
    ///
    /// The projection also carries the storage key; the returned records
    /// are fully decoded, not just the projected fields.
    pub fn load_values_by_filter<T, S, P>(
        &self,
        fields: &[S],
        mut predicate: P,
    ) -> Result<BTreeMap<String, T>>
    where
        T: Record,
        S: AsRef<str>,
        P: FnMut(&Projection) -> bool,
    {
        T::check_fields(fields)?;

        let mut values = BTreeMap::new();
        self.scan_raw(T::BUCKET, |key, bytes| {
            let record = decode::<T>(&key, &bytes)?;
            if predicate(&record.project(&key, fields)) {
                values.insert(key, record);
            }
            Ok(())
        })?;
        Ok(values)
    }

    /// Every record of the bucket.
    pub fn load_all<T: Record>(&self) -> Result<BTreeMap<String, T>> {
        self.load_values_by_filter::<T, &str, _>(&[], |_| true)
    }

    /// Store a record under its own storage key, replacing what was there.
    pub fn save_value<T: Record>(&self, record: &T) -> Result<()> {
        let bytes = encode(record)?;
        self.put_raw(T::BUCKET, &record.storage_key(), &bytes)
    }

    /// Patch the record under `key` field by field.
    ///
    /// Returns `false` without writing anything when no record exists.
    pub fn update_value<T: Record>(&self, key: &str, patch: &[(&str, FieldValue)]) -> Result<bool> {
        let Some(mut record) = self.load_value::<T>(key)? else {
            return Ok(false);
        };
        for (field, value) in patch {
            record.apply(field, value.clone())?;
        }
        let bytes = encode(&record)?;
        self.put_raw(T::BUCKET, key, &bytes)?;
        Ok(true)
    }

    /// Physically remove records. Returns how many existed.
    pub fn delete_values<T, S>(&self, keys: &[S]) -> Result<usize>
    where
        T: Record,
        S: AsRef<str>,
    {
        let mut removed = 0;
        for key in keys {
            if self.delete_raw(T::BUCKET, key.as_ref())? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl TxHandler {
    pub fn load_values<T, S>(&self, keys: &[S]) -> Result<BTreeMap<String, T>>
    where
        T: Record,
        S: AsRef<str>,
    {
        self.execute(false, |tx| tx.load_values(keys))
    }

    pub fn load_value<T: Record>(&self, key: &str) -> Result<Option<T>> {
        self.execute(false, |tx| tx.load_value(key))
    }

    pub fn load_values_by_filter<T, S, P>(
        &self,
        fields: &[S],
        predicate: P,
    ) -> Result<BTreeMap<String, T>>
    where
        T: Record,
        S: AsRef<str>,
        P: FnMut(&Projection) -> bool,
    {
        self.execute(false, |tx| tx.load_values_by_filter(fields, predicate))
    }

    pub fn load_all<T: Record>(&self) -> Result<BTreeMap<String, T>> {
        self.execute(false, |tx| tx.load_all())
    }

    pub fn save_value<T: Record>(&self, record: &T) -> Result<()> {
        self.execute(true, |tx| tx.save_value(record))
    }

    pub fn update_value<T: Record>(&self, key: &str, patch: &[(&str, FieldValue)]) -> Result<bool> {
        self.execute(true, |tx| tx.update_value::<T>(key, patch))
    }

    pub fn delete_values<T, S>(&self, keys: &[S]) -> Result<usize>
    where
        T: Record,
        S: AsRef<str>,
    {
        self.execute(true, |tx| tx.delete_values::<T, S>(keys))
    }
}
