use serde::{Deserialize, Serialize};

use crate::payload::{push, Field, FieldValue, PartialPayload};
use crate::position::{Position, PositionSchema};

/// Category record, e.g. "Coffee".
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    /// `None` unless [`CategoryRelation::Positions`] was requested.
    pub positions: Option<Vec<Position>>,
}

/// Relations a category read may load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRelation {
    Positions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryCreate {
    pub name: String,
}

/// Partial category payload; also the category listing filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CategoryUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

impl PartialPayload for CategoryUpdate {
    fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        push(&mut fields, "name", &self.name, |v| FieldValue::Text(v.clone()));
        fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategorySchema {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<PositionSchema>>,
}
