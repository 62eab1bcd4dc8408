use serde::{Deserialize, Serialize};

use crate::category::{Category, CategorySchema};
use crate::payload::{push, Field, FieldValue, PartialPayload};

/// Menu position record.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    /// Default serving weight in grams.
    pub weight: i32,
    /// Price per 100 grams.
    pub price: i32,
    /// `None` unless [`PositionRelation::Category`] was requested.
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionRelation {
    Category,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionCreate {
    pub name: String,
    pub category_id: i64,
    pub weight: i32,
    pub price: i32,
}

/// Partial position payload; also the position listing filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PositionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub weight: Option<i32>,
    #[serde(default)]
    pub price: Option<i32>,
}

impl PartialPayload for PositionUpdate {
    fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        push(&mut fields, "name", &self.name, |v| FieldValue::Text(v.clone()));
        push(&mut fields, "category_id", &self.category_id, |v| FieldValue::BigInt(*v));
        push(&mut fields, "weight", &self.weight, |v| FieldValue::Int(*v));
        push(&mut fields, "price", &self.price, |v| FieldValue::Int(*v));
        fields
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionSchema {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
    pub weight: i32,
    pub price: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategorySchema>,
}
