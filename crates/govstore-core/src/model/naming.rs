//! Namespaces and services

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{Field, FieldValue, Record};

/// Accessor names for [`Service`].
pub mod service_fields {
    pub const ID: &str = "id";
    pub const NAME: &str = "name";
    pub const NAMESPACE: &str = "namespace";
    pub const OWNER: &str = "owner";
    pub const REVISION: &str = "revision";
    pub const VALID: &str = "valid";
    pub const MODIFY_TIME: &str = "modify_time";
}

/// Accessor names for [`Namespace`].
pub mod namespace_fields {
    pub const NAME: &str = "name";
    pub const OWNER: &str = "owner";
    pub const VALID: &str = "valid";
    pub const MODIFY_TIME: &str = "modify_time";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub business: String,
    pub department: String,
    pub comment: String,
    pub token: String,
    pub owner: String,
    pub revision: String,
    pub valid: bool,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

static SERVICE_FIELDS: &[Field<Service>] = &[
    Field::read_only(service_fields::ID, |s| FieldValue::from(s.id.as_str())),
    Field::read_only(service_fields::NAME, |s| FieldValue::from(s.name.as_str())),
    Field::read_only(service_fields::NAMESPACE, |s| {
        FieldValue::from(s.namespace.as_str())
    }),
    Field::writable(
        service_fields::OWNER,
        |s| FieldValue::from(s.owner.as_str()),
        |s, v| {
            s.owner = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        service_fields::REVISION,
        |s| FieldValue::from(s.revision.as_str()),
        |s, v| {
            s.revision = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        service_fields::VALID,
        |s| FieldValue::Bool(s.valid),
        |s, v| {
            s.valid = v.as_bool()?;
            Some(())
        },
    ),
    Field::writable(
        service_fields::MODIFY_TIME,
        |s| FieldValue::Time(s.modify_time),
        |s, v| {
            s.modify_time = v.as_time()?;
            Some(())
        },
    ),
];

impl Record for Service {
    const BUCKET: &'static str = "service";

    fn fields() -> &'static [Field<Self>] {
        SERVICE_FIELDS
    }

    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub comment: String,
    pub token: String,
    pub owner: String,
    pub valid: bool,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

static NAMESPACE_FIELDS: &[Field<Namespace>] = &[
    Field::read_only(namespace_fields::NAME, |n| {
        FieldValue::from(n.name.as_str())
    }),
    Field::writable(
        namespace_fields::OWNER,
        |n| FieldValue::from(n.owner.as_str()),
        |n, v| {
            n.owner = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        namespace_fields::VALID,
        |n| FieldValue::Bool(n.valid),
        |n, v| {
            n.valid = v.as_bool()?;
            Some(())
        },
    ),
    Field::writable(
        namespace_fields::MODIFY_TIME,
        |n| FieldValue::Time(n.modify_time),
        |n, v| {
            n.modify_time = v.as_time()?;
            Some(())
        },
    ),
];

impl Record for Namespace {
    const BUCKET: &'static str = "namespace";

    fn fields() -> &'static [Field<Self>] {
        NAMESPACE_FIELDS
    }

    fn storage_key(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_storage_keys() {
        let service = Service {
            id: "s1".to_string(),
            name: "orders".to_string(),
            ..Default::default()
        };
        assert_eq!(service.storage_key(), "s1");

        let namespace = Namespace {
            name: "default".to_string(),
            ..Default::default()
        };
        assert_eq!(namespace.storage_key(), "default");
    }

    #[test]
    fn test_namespace_name_is_immutable() {
        let mut namespace = Namespace::default();
        assert!(namespace
            .apply(namespace_fields::NAME, FieldValue::from("other"))
            .is_err());
        namespace
            .apply(namespace_fields::OWNER, FieldValue::from("ops"))
            .unwrap();
        assert_eq!(namespace.owner, "ops");
    }
}
