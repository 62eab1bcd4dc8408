//! Partial payloads shared by updates and filters.
//!
//! An update payload lists only the fields the caller actually set. The same
//! list drives two things: the `SET` part of an update and the conditions of
//! a filtered listing.

use chrono::{DateTime, Utc};

/// Value of a single set field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// `BIGINT` column (ids).
    BigInt(i64),
    /// `INTEGER` column (weights, prices, quantities).
    Int(i32),
    /// Free text. Filters match it as a case-insensitive substring.
    Text(String),
    /// Enum label stored as text. Filters match it exactly.
    Keyword(&'static str),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Filter semantics: text is a case-insensitive substring match,
    /// everything else is equality.
    pub fn matches(&self, stored: &FieldValue) -> bool {
        match (self, stored) {
            (FieldValue::Text(needle), FieldValue::Text(haystack)) => haystack
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            (expected, stored) => expected == stored,
        }
    }
}

/// A set field: the column it maps to and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub column: &'static str,
    pub value: FieldValue,
}

impl Field {
    pub fn new(column: &'static str, value: FieldValue) -> Self {
        Self { column, value }
    }
}

/// Payloads whose fields are all optional.
pub trait PartialPayload {
    /// Column fields that are set, in a stable order.
    fn fields(&self) -> Vec<Field>;

    /// True when nothing would change.
    fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Pushes `column = value` when the option is set.
pub(crate) fn push<T>(
    fields: &mut Vec<Field>,
    column: &'static str,
    value: &Option<T>,
    convert: impl FnOnce(&T) -> FieldValue,
) {
    if let Some(value) = value {
        fields.push(Field::new(column, convert(value)));
    }
}
