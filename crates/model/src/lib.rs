//! Domain model of the coffee shop: records as stored, payloads as received
//! and schemas as returned.
//!
//! Records carry their relations as `Option`s: `None` means "not loaded",
//! which is different from "loaded and empty".

use thiserror::Error;

mod category;
mod order;
mod payload;
mod position;
mod user;

pub use category::{Category, CategoryCreate, CategoryRelation, CategorySchema, CategoryUpdate};
pub use order::{
    line_price, ObtainingMethod, Order, OrderCreate, OrderLine, OrderLineCreate, OrderLineSchema,
    OrderRelation, OrderSchema, OrderStatus, OrderUpdate, MAX_PRICE, MAX_QUANTITY, MAX_WEIGHT,
};
pub use payload::{Field, FieldValue, PartialPayload};
pub use position::{Position, PositionCreate, PositionRelation, PositionSchema, PositionUpdate};
pub use user::{Role, User, UserCreate, UserRelation, UserSchema, UserUpdate};

/// A stored enum label that no variant matches.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
