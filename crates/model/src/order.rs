use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::payload::{push, Field, FieldValue, PartialPayload};
use crate::position::{Position, PositionSchema};
use crate::ParseEnumError;

/// Largest serving weight in grams accepted for a position or order line.
pub const MAX_WEIGHT: i32 = 100_000;
/// Largest price per 100 grams accepted for a position.
pub const MAX_PRICE: i32 = 10_000_000;
/// Largest quantity of one position in an order line or cart.
pub const MAX_QUANTITY: i32 = 1_000;

/// Price of `quantity` servings of `weight` grams at `price` per 100 grams.
///
/// Each serving is rounded down to a whole currency unit before multiplying.
/// Saturates at `i64::MAX` for values beyond the accepted maximums, which
/// only rows written around validation can carry.
pub fn line_price(weight: i32, price: i32, quantity: i32) -> i64 {
    // i32 * i32 always fits in i64
    (i64::from(weight) * i64::from(price))
        .div_euclid(100)
        .saturating_mul(i64::from(quantity))
}

/// Order status.
///
/// `Processing` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    #[default]
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Processing)
    }

    /// Whether an order in this status may be moved to `next`.
    /// Re-applying the current status is always allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        *self == next
            || matches!(
                (self, next),
                (OrderStatus::Processing, OrderStatus::Completed)
                    | (OrderStatus::Processing, OrderStatus::Cancelled)
            )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(OrderStatus::Processing),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseEnumError::new("order status", other)),
        }
    }
}

/// How the customer gets the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObtainingMethod {
    Takeaway,
    #[default]
    Inplace,
    Delivery,
}

impl ObtainingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObtainingMethod::Takeaway => "takeaway",
            ObtainingMethod::Inplace => "inplace",
            ObtainingMethod::Delivery => "delivery",
        }
    }
}

impl fmt::Display for ObtainingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObtainingMethod {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "takeaway" => Ok(ObtainingMethod::Takeaway),
            "inplace" => Ok(ObtainingMethod::Inplace),
            "delivery" => Ok(ObtainingMethod::Delivery),
            other => Err(ParseEnumError::new("obtaining method", other)),
        }
    }
}

/// One `(order, position)` line.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub order_id: i64,
    pub position_id: i64,
    pub quantity: i32,
    /// Serving weight in grams; may differ from the position's default.
    pub weight: i32,
    /// Loaded together with the order's lines.
    pub position: Option<Position>,
}

impl OrderLine {
    /// `None` when the position was not loaded.
    pub fn total_price(&self) -> Option<i64> {
        self.position
            .as_ref()
            .map(|p| line_price(self.weight, p.price, self.quantity))
    }
}

/// Order record.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub status: OrderStatus,
    pub obtaining_method: ObtainingMethod,
    pub user_id: i64,
    /// `None` unless [`OrderRelation::Lines`] was requested.
    pub lines: Option<Vec<OrderLine>>,
}

impl Order {
    /// Sum of the line prices. `None` if lines or any of their positions
    /// were not loaded.
    pub fn total_price(&self) -> Option<i64> {
        self.lines
            .as_ref()?
            .iter()
            .try_fold(0i64, |total, line| Some(total.saturating_add(line.total_price()?)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRelation {
    /// Lines with their positions and the positions' categories.
    Lines,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineCreate {
    pub position_id: i64,
    pub quantity: i32,
    pub weight: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderCreate {
    pub user_id: i64,
    pub order_positions: Vec<OrderLineCreate>,
    #[serde(default)]
    pub obtaining_method: ObtainingMethod,
}

/// Partial order payload; also the order listing filter.
///
/// `order_positions`, when set, replaces the whole line set of the order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OrderUpdate {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub order_positions: Option<Vec<OrderLineCreate>>,
    #[serde(default)]
    pub obtaining_method: Option<ObtainingMethod>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

impl OrderUpdate {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

impl PartialPayload for OrderUpdate {
    fn fields(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        push(&mut fields, "user_id", &self.user_id, |v| FieldValue::BigInt(*v));
        push(&mut fields, "obtaining_method", &self.obtaining_method, |v| {
            FieldValue::Keyword(v.as_str())
        });
        push(&mut fields, "date", &self.date, |v| FieldValue::Timestamp(*v));
        push(&mut fields, "status", &self.status, |v| FieldValue::Keyword(v.as_str()));
        fields
    }

    fn is_empty(&self) -> bool {
        self.fields().is_empty() && self.order_positions.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLineSchema {
    pub position_id: i64,
    pub quantity: i32,
    pub weight: i32,
    pub total_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<PositionSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderSchema {
    pub id: i64,
    pub user_id: i64,
    pub date: DateTime<Utc>,
    pub status: OrderStatus,
    pub obtaining_method: ObtainingMethod,
    pub total_price: Option<i64>,
    /// `None` when the lines were not loaded.
    pub order_positions: Option<Vec<OrderLineSchema>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(price: i32) -> Position {
        Position {
            id: 1,
            name: "Капучино".into(),
            category_id: 1,
            weight: 250,
            price,
            category: None,
        }
    }

    fn line(position_id: i64, quantity: i32, weight: i32, price: i32) -> OrderLine {
        OrderLine {
            order_id: 1,
            position_id,
            quantity,
            weight,
            position: Some(Position {
                id: position_id,
                ..position(price)
            }),
        }
    }

    fn order(lines: Option<Vec<OrderLine>>) -> Order {
        Order {
            id: 1,
            date: Utc::now(),
            status: OrderStatus::Processing,
            obtaining_method: ObtainingMethod::Takeaway,
            user_id: 42,
            lines,
        }
    }

    #[test]
    fn line_price_rounds_each_serving_down() {
        assert_eq!(line_price(200, 150, 2), 600);
        assert_eq!(line_price(250, 150, 1), 375);
        assert_eq!(line_price(333, 100, 3), 999);
        assert_eq!(line_price(55, 99, 2), 108);
    }

    #[test]
    fn line_price_saturates_instead_of_overflowing() {
        assert_eq!(
            line_price(2_000_000_000, 2_000_000_000, 2_000_000_000),
            i64::MAX
        );
        assert_eq!(line_price(i32::MAX, i32::MAX, 1), 46_116_860_141_324_206);
        assert_eq!(
            line_price(MAX_WEIGHT, MAX_PRICE, MAX_QUANTITY),
            10_000_000_000_000
        );
    }

    #[test]
    fn order_total_saturates_across_lines() {
        let huge = line(1, i32::MAX, i32::MAX, i32::MAX);
        let order = order(Some(vec![huge.clone(), line(2, 1, 100, 300), huge]));
        assert_eq!(order.total_price(), Some(i64::MAX));
    }

    #[test]
    fn order_total_is_sum_of_lines() {
        let order = order(Some(vec![line(1, 2, 200, 150), line(2, 1, 100, 300)]));
        assert_eq!(order.total_price(), Some(900));
    }

    #[test]
    fn order_total_is_absent_without_lines() {
        assert_eq!(order(None).total_price(), None);
        assert_eq!(order(Some(vec![])).total_price(), Some(0));
    }

    #[test]
    fn order_total_is_absent_when_a_position_is_missing() {
        let mut unloaded = line(2, 1, 100, 300);
        unloaded.position = None;
        let order = order(Some(vec![line(1, 2, 200, 150), unloaded]));
        assert_eq!(order.total_price(), None);
    }

    #[test]
    fn terminal_statuses_do_not_transition() {
        use OrderStatus::*;
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Cancelled));
        assert!(Completed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Processing));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
    }

    #[test]
    fn status_only_update_is_not_empty() {
        assert!(OrderUpdate::default().is_empty());
        assert!(!OrderUpdate::status(OrderStatus::Completed).is_empty());
        let lines_only = OrderUpdate {
            order_positions: Some(vec![]),
            ..OrderUpdate::default()
        };
        assert!(!lines_only.is_empty());
        assert!(lines_only.fields().is_empty());
    }

    #[test]
    fn deserialize_order_create_from_json() {
        let json = r#"
        {
            "user_id": 1001,
            "obtaining_method": "TAKEAWAY",
            "order_positions": [
                { "position_id": 2, "quantity": 2, "weight": 200 }
            ]
        }
        "#;
        let order: OrderCreate = serde_json::from_str(json).unwrap();
        assert_eq!(order.user_id, 1001);
        assert_eq!(order.obtaining_method, ObtainingMethod::Takeaway);
        assert_eq!(order.order_positions.len(), 1);
        assert_eq!(order.order_positions[0].weight, 200);
    }

    #[test]
    fn obtaining_method_defaults_to_inplace() {
        let json = r#"{ "user_id": 1, "order_positions": [] }"#;
        let order: OrderCreate = serde_json::from_str(json).unwrap();
        assert_eq!(order.obtaining_method, ObtainingMethod::Inplace);
    }

    #[test]
    fn stored_labels_round_trip() {
        for status in [
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("done".parse::<OrderStatus>().is_err());
    }
}
