use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::order::{Order, OrderSchema};
use crate::payload::{push, Field, FieldValue, PartialPayload};
use crate::ParseEnumError;

/// Role of a user. Roles are exclusive; there is no hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Client,
    Barista,
}

impl Role {
    /// Label stored in the `users.role` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Barista => "barista",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "barista" => Ok(Role::Barista),
            other => Err(ParseEnumError::new("role", other)),
        }
    }
}

/// User record. The id is the external identity (e.g. a messenger user id).
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub role: Role,
    /// `None` unless [`UserRelation::Orders`] was requested.
    pub orders: Option<Vec<Order>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRelation {
    /// Orders together with their lines.
    Orders,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCreate {
    pub id: i64,
    pub role: Role,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserUpdate {
    #[serde(default)]
    pub role: Option<Role>,
}

impl PartialPayload for UserUpdate {
    fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        push(&mut fields, "role", &self.role, |v| FieldValue::Keyword(v.as_str()));
        fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserSchema {
    pub id: i64,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<Vec<OrderSchema>>,
}
