//! Circuit-breaker rules, their service bindings and derived views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Service;
use crate::record::{Field, FieldValue, Record};

/// Version name of the editable copy of a rule.
pub const VERSION_MASTER: &str = "master";

/// Storage key of a rule version: `<id>_<version>`.
pub fn rule_key(id: &str, version: &str) -> String {
    format!("{}_{}", id, version)
}

/// Accessor names for [`CircuitBreaker`].
pub mod rule_fields {
    pub const ID: &str = "id";
    pub const VERSION: &str = "version";
    pub const NAME: &str = "name";
    pub const NAMESPACE: &str = "namespace";
    pub const BUSINESS: &str = "business";
    pub const DEPARTMENT: &str = "department";
    pub const COMMENT: &str = "comment";
    pub const INBOUNDS: &str = "inbounds";
    pub const OUTBOUNDS: &str = "outbounds";
    pub const TOKEN: &str = "token";
    pub const OWNER: &str = "owner";
    pub const REVISION: &str = "revision";
    pub const VALID: &str = "valid";
    pub const CREATE_TIME: &str = "create_time";
    pub const MODIFY_TIME: &str = "modify_time";
}

/// Accessor names for [`CircuitBreakerRelation`].
pub mod relation_fields {
    pub const SERVICE_ID: &str = "service_id";
    pub const RULE_ID: &str = "rule_id";
    pub const RULE_VERSION: &str = "rule_version";
    pub const VALID: &str = "valid";
    pub const CREATE_TIME: &str = "create_time";
    pub const MODIFY_TIME: &str = "modify_time";
}

/// A circuit-breaker rule at one version.
///
/// `(id, version)` identifies the row; `version` is either
/// [`VERSION_MASTER`] or a tag name. `inbounds`/`outbounds` are opaque
/// match specs owned by the request layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreaker {
    pub id: String,
    pub version: String,
    pub name: String,
    pub namespace: String,
    pub business: String,
    pub department: String,
    pub comment: String,
    pub inbounds: String,
    pub outbounds: String,
    pub token: String,
    pub owner: String,
    pub revision: String,
    pub valid: bool,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

impl CircuitBreaker {
    /// A master rule with the given id and name.
    pub fn master(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: VERSION_MASTER.to_string(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_master(&self) -> bool {
        self.version == VERSION_MASTER
    }

    pub fn key(&self) -> String {
        rule_key(&self.id, &self.version)
    }

    /// Copy of this rule under a tag version.
    pub fn tagged(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }
}

static RULE_FIELDS: &[Field<CircuitBreaker>] = &[
    Field::read_only(rule_fields::ID, |r| FieldValue::from(r.id.as_str())),
    Field::read_only(rule_fields::VERSION, |r| {
        FieldValue::from(r.version.as_str())
    }),
    Field::writable(
        rule_fields::NAME,
        |r| FieldValue::from(r.name.as_str()),
        |r, v| {
            r.name = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::NAMESPACE,
        |r| FieldValue::from(r.namespace.as_str()),
        |r, v| {
            r.namespace = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::BUSINESS,
        |r| FieldValue::from(r.business.as_str()),
        |r, v| {
            r.business = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::DEPARTMENT,
        |r| FieldValue::from(r.department.as_str()),
        |r, v| {
            r.department = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::COMMENT,
        |r| FieldValue::from(r.comment.as_str()),
        |r, v| {
            r.comment = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::INBOUNDS,
        |r| FieldValue::from(r.inbounds.as_str()),
        |r, v| {
            r.inbounds = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::OUTBOUNDS,
        |r| FieldValue::from(r.outbounds.as_str()),
        |r, v| {
            r.outbounds = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::TOKEN,
        |r| FieldValue::from(r.token.as_str()),
        |r, v| {
            r.token = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::OWNER,
        |r| FieldValue::from(r.owner.as_str()),
        |r, v| {
            r.owner = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::REVISION,
        |r| FieldValue::from(r.revision.as_str()),
        |r, v| {
            r.revision = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        rule_fields::VALID,
        |r| FieldValue::Bool(r.valid),
        |r, v| {
            r.valid = v.as_bool()?;
            Some(())
        },
    ),
    Field::read_only(rule_fields::CREATE_TIME, |r| FieldValue::Time(r.create_time)),
    Field::writable(
        rule_fields::MODIFY_TIME,
        |r| FieldValue::Time(r.modify_time),
        |r, v| {
            r.modify_time = v.as_time()?;
            Some(())
        },
    ),
];

impl Record for CircuitBreaker {
    const BUCKET: &'static str = "circuitbreaker_rule";

    fn fields() -> &'static [Field<Self>] {
        RULE_FIELDS
    }

    fn storage_key(&self) -> String {
        self.key()
    }
}

/// Binding of one service to one rule version. Keyed by service id: a
/// service has at most one binding, rebinding overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerRelation {
    pub service_id: String,
    pub rule_id: String,
    pub rule_version: String,
    pub valid: bool,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

impl CircuitBreakerRelation {
    pub fn new(
        service_id: impl Into<String>,
        rule_id: impl Into<String>,
        rule_version: impl Into<String>,
    ) -> Self {
        Self {
            service_id: service_id.into(),
            rule_id: rule_id.into(),
            rule_version: rule_version.into(),
            ..Default::default()
        }
    }

    /// Storage key of the rule this relation points at.
    pub fn rule_key(&self) -> String {
        rule_key(&self.rule_id, &self.rule_version)
    }
}

static RELATION_FIELDS: &[Field<CircuitBreakerRelation>] = &[
    Field::read_only(relation_fields::SERVICE_ID, |r| {
        FieldValue::from(r.service_id.as_str())
    }),
    Field::writable(
        relation_fields::RULE_ID,
        |r| FieldValue::from(r.rule_id.as_str()),
        |r, v| {
            r.rule_id = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        relation_fields::RULE_VERSION,
        |r| FieldValue::from(r.rule_version.as_str()),
        |r, v| {
            r.rule_version = v.into_string()?;
            Some(())
        },
    ),
    Field::writable(
        relation_fields::VALID,
        |r| FieldValue::Bool(r.valid),
        |r, v| {
            r.valid = v.as_bool()?;
            Some(())
        },
    ),
    Field::read_only(relation_fields::CREATE_TIME, |r| {
        FieldValue::Time(r.create_time)
    }),
    Field::writable(
        relation_fields::MODIFY_TIME,
        |r| FieldValue::Time(r.modify_time),
        |r, v| {
            r.modify_time = v.as_time()?;
            Some(())
        },
    ),
];

impl Record for CircuitBreakerRelation {
    const BUCKET: &'static str = "circuitbreaker_rule_relation";

    fn fields() -> &'static [Field<Self>] {
        RELATION_FIELDS
    }

    fn storage_key(&self) -> String {
        self.service_id.clone()
    }
}

/// Entry of the cache sync feed: a binding joined with its rule.
///
/// `valid` is the binding's flag, not the rule's; the timestamps are the
/// binding's too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceWithCircuitBreaker {
    pub service_id: String,
    pub circuit_breaker: CircuitBreaker,
    pub valid: bool,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

/// A rule together with the services it is shown against in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerInfo {
    pub circuit_breaker: CircuitBreaker,
    pub services: Vec<Service>,
}

/// One page of a rule listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerDetail {
    /// Size of the full result set before windowing
    pub total: u32,
    pub infos: Vec<CircuitBreakerInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_key() {
        let cb = CircuitBreaker::master("r1", "n");
        assert_eq!(cb.key(), "r1_master");
        assert_eq!(cb.tagged("v1").key(), "r1_v1");
        assert!(cb.is_master());
        assert!(!cb.tagged("v1").is_master());
    }

    #[test]
    fn test_apply_patch() {
        let mut cb = CircuitBreaker::master("r1", "n");
        cb.apply(rule_fields::VALID, FieldValue::Bool(true)).unwrap();
        cb.apply(rule_fields::OWNER, FieldValue::from("alice")).unwrap();
        assert!(cb.valid);
        assert_eq!(cb.owner, "alice");
    }

    #[test]
    fn test_apply_rejects_identity_fields() {
        let mut cb = CircuitBreaker::master("r1", "n");
        assert!(cb.apply(rule_fields::ID, FieldValue::from("r2")).is_err());
        assert!(cb.apply(rule_fields::VERSION, FieldValue::from("v1")).is_err());
        assert!(cb.apply(rule_fields::VALID, FieldValue::from("yes")).is_err());
        assert!(cb.apply("colour", FieldValue::from("red")).is_err());
        assert_eq!(cb.id, "r1");
    }

    #[test]
    fn test_project_relation() {
        let mut rel = CircuitBreakerRelation::new("svc-1", "r1", VERSION_MASTER);
        rel.valid = true;
        let projection = rel.project("svc-1", &[relation_fields::RULE_ID, relation_fields::VALID]);
        assert_eq!(projection.key(), "svc-1");
        assert_eq!(projection.str(relation_fields::RULE_ID), Some("r1"));
        assert!(projection.flag(relation_fields::VALID));
        assert!(projection.get(relation_fields::RULE_VERSION).is_none());
    }
}
