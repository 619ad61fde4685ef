//! Users and authorization strategies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{Field, FieldValue, Record};

/// Role of a user account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    #[default]
    Owner,
    SubAccount,
}

impl UserRole {
    /// Numeric code used on the wire.
    pub fn code(self) -> i64 {
        match self {
            UserRole::Admin => 0,
            UserRole::Owner => 20,
            UserRole::SubAccount => 50,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    /// Password hash, never the clear text
    pub password: String,
    pub owner: String,
    pub source: String,
    pub mobile: String,
    pub email: String,
    pub role: UserRole,
    pub token: String,
    pub token_enable: bool,
    pub valid: bool,
    pub comment: String,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

static USER_FIELDS: &[Field<User>] = &[
    Field::read_only("id", |u| FieldValue::from(u.id.as_str())),
    Field::read_only("name", |u| FieldValue::from(u.name.as_str())),
    Field::read_only("owner", |u| FieldValue::from(u.owner.as_str())),
    Field::read_only("role", |u| FieldValue::Int(u.role.code())),
    Field::writable(
        "token_enable",
        |u| FieldValue::Bool(u.token_enable),
        |u, v| {
            u.token_enable = v.as_bool()?;
            Some(())
        },
    ),
    Field::writable(
        "valid",
        |u| FieldValue::Bool(u.valid),
        |u, v| {
            u.valid = v.as_bool()?;
            Some(())
        },
    ),
    Field::writable(
        "modify_time",
        |u| FieldValue::Time(u.modify_time),
        |u, v| {
            u.modify_time = v.as_time()?;
            Some(())
        },
    ),
];

impl Record for User {
    const BUCKET: &'static str = "user";

    fn fields() -> &'static [Field<Self>] {
        USER_FIELDS
    }

    fn storage_key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthAction {
    ReadOnly,
    #[default]
    ReadWrite,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalRole {
    #[default]
    User,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Namespaces,
    Services,
    ConfigGroups,
}

/// Resource id that matches every resource of a type.
pub const RESOURCE_ANY: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub strategy_id: String,
    pub principal_id: String,
    pub role: PrincipalRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyResource {
    pub strategy_id: String,
    pub res_type: ResourceType,
    pub res_id: String,
}

/// An authorization strategy with its principals and resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub action: AuthAction,
    pub comment: String,
    pub principals: Vec<Principal>,
    /// Default strategy of its owner
    pub default: bool,
    pub owner: String,
    pub resources: Vec<StrategyResource>,
    pub valid: bool,
    pub revision: String,
    pub create_time: DateTime<Utc>,
    pub modify_time: DateTime<Utc>,
}

static STRATEGY_FIELDS: &[Field<Strategy>] = &[
    Field::read_only("id", |s| FieldValue::from(s.id.as_str())),
    Field::read_only("name", |s| FieldValue::from(s.name.as_str())),
    Field::read_only("owner", |s| FieldValue::from(s.owner.as_str())),
    Field::read_only("default", |s| FieldValue::Bool(s.default)),
    Field::writable(
        "valid",
        |s| FieldValue::Bool(s.valid),
        |s, v| {
            s.valid = v.as_bool()?;
            Some(())
        },
    ),
    Field::writable(
        "modify_time",
        |s| FieldValue::Time(s.modify_time),
        |s, v| {
            s.modify_time = v.as_time()?;
            Some(())
        },
    ),
];

impl Record for Strategy {
    const BUCKET: &'static str = "strategy";

    fn fields() -> &'static [Field<Self>] {
        STRATEGY_FIELDS
    }

    fn storage_key(&self) -> String {
        self.id.clone()
    }
}
