//! Per-user carts kept in process memory.
//!
//! A cart stages positions before checkout. Each line holds a snapshot of
//! the position taken when it was added, so the cart can be shown and
//! priced without touching the database. Carts are lost on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use model::{line_price, OrderLineCreate, PositionSchema, MAX_QUANTITY};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Quantity must be at least 1, got {0}")]
    InvalidQuantity(i32),
    #[error("At most {max} of position {0} fit in one cart", max = MAX_QUANTITY)]
    TooMany(i64),
}

/// One cart line.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub position: PositionSchema,
    pub quantity: i32,
}

impl CartItem {
    /// Priced like an order line at the position's default weight.
    pub fn total_price(&self) -> i64 {
        line_price(self.position.weight, self.position.price, self.quantity)
    }
}

/// Staged positions of one user, keyed by position id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: BTreeMap<i64, CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `quantity` of `position`. A position already in the cart has
    /// its quantity increased and its snapshot refreshed. The merged
    /// quantity may not exceed [`MAX_QUANTITY`].
    pub fn add_item(&mut self, position: PositionSchema, quantity: i32) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        if quantity > MAX_QUANTITY {
            return Err(CartError::TooMany(position.id));
        }
        match self.items.get_mut(&position.id) {
            Some(item) => {
                // both sides are at most MAX_QUANTITY
                let merged = item.quantity + quantity;
                if merged > MAX_QUANTITY {
                    return Err(CartError::TooMany(position.id));
                }
                item.quantity = merged;
                item.position = position;
            }
            None => {
                self.items
                    .insert(position.id, CartItem { position, quantity });
            }
        }
        Ok(())
    }

    /// Returns the removed line, if the position was in the cart.
    pub fn remove_item(&mut self, position_id: i64) -> Option<CartItem> {
        self.items.remove(&position_id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.values()
    }

    pub fn total_price(&self) -> i64 {
        self.items
            .values()
            .map(CartItem::total_price)
            .fold(0, i64::saturating_add)
    }

    /// Order lines for checkout, one per position at its default weight.
    pub fn order_lines(&self) -> Vec<OrderLineCreate> {
        self.items
            .values()
            .map(|item| OrderLineCreate {
                position_id: item.position.id,
                quantity: item.quantity,
                weight: item.position.weight,
            })
            .collect()
    }
}

/// Thread-safe map of carts by user id. Clones share the same carts.
#[derive(Debug, Clone, Default)]
pub struct CartStore {
    inner: Arc<RwLock<HashMap<i64, Cart>>>,
}

impl CartStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the user's cart; empty if the user has none.
    pub async fn get(&self, user_id: i64) -> Cart {
        let carts = self.inner.read().await;
        carts.get(&user_id).cloned().unwrap_or_default()
    }

    pub async fn add_item(
        &self,
        user_id: i64,
        position: PositionSchema,
        quantity: i32,
    ) -> Result<Cart, CartError> {
        let mut carts = self.inner.write().await;
        let cart = carts.entry(user_id).or_default();
        cart.add_item(position, quantity)?;
        Ok(cart.clone())
    }

    /// Removes a position and returns the cart as it is afterwards.
    pub async fn remove_item(&self, user_id: i64, position_id: i64) -> Cart {
        let mut carts = self.inner.write().await;
        match carts.get_mut(&user_id) {
            Some(cart) => {
                cart.remove_item(position_id);
                let cart = cart.clone();
                if cart.is_empty() {
                    carts.remove(&user_id);
                }
                cart
            }
            None => Cart::default(),
        }
    }

    pub async fn clear(&self, user_id: i64) {
        self.inner.write().await.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(id: i64, weight: i32, price: i32) -> PositionSchema {
        PositionSchema {
            id,
            name: format!("position {id}"),
            category_id: 1,
            weight,
            price,
            category: None,
        }
    }

    #[test]
    fn test_add_merges_quantities() {
        let mut cart = Cart::new();
        cart.add_item(position(1, 250, 200), 1).unwrap();
        cart.add_item(position(1, 250, 220), 2).unwrap();

        assert_eq!(cart.len(), 1);
        let item = cart.items().next().unwrap();
        assert_eq!(item.quantity, 3);
        assert_eq!(item.position.price, 220);
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add_item(position(1, 250, 200), 0),
            Err(CartError::InvalidQuantity(0))
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn test_quantity_is_capped() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add_item(position(1, 250, 200), 2_000_000_000),
            Err(CartError::TooMany(1))
        );
        assert!(cart.is_empty());

        cart.add_item(position(1, 250, 200), MAX_QUANTITY - 1).unwrap();
        assert_eq!(
            cart.add_item(position(1, 250, 200), 2),
            Err(CartError::TooMany(1))
        );
        cart.add_item(position(1, 250, 200), 1).unwrap();
        assert_eq!(cart.items().next().unwrap().quantity, MAX_QUANTITY);
    }

    #[test]
    fn test_total_of_oversized_snapshot_saturates() {
        let mut cart = Cart::new();
        cart.add_item(position(1, i32::MAX, i32::MAX), MAX_QUANTITY).unwrap();
        cart.add_item(position(2, i32::MAX, i32::MAX), MAX_QUANTITY).unwrap();
        assert_eq!(cart.total_price(), i64::MAX);
    }

    #[test]
    fn test_total_uses_default_weight() {
        let mut cart = Cart::new();
        cart.add_item(position(1, 250, 200), 2).unwrap();
        cart.add_item(position(2, 150, 99), 1).unwrap();
        // 500 * 2 + floor(148.5)
        assert_eq!(cart.total_price(), 1148);
    }

    #[test]
    fn test_order_lines() {
        let mut cart = Cart::new();
        cart.add_item(position(2, 150, 99), 1).unwrap();
        cart.add_item(position(1, 250, 200), 2).unwrap();
        let lines = cart.order_lines();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].position_id, 1);
        assert_eq!(lines[0].quantity, 2);
        assert_eq!(lines[0].weight, 250);
    }

    #[tokio::test]
    async fn test_store_keeps_carts_per_user() {
        let store = CartStore::new();
        store.add_item(1, position(1, 250, 200), 1).await.unwrap();
        store.add_item(2, position(2, 150, 99), 4).await.unwrap();

        assert_eq!(store.get(1).await.len(), 1);
        assert_eq!(store.get(2).await.items().next().unwrap().quantity, 4);
        assert!(store.get(3).await.is_empty());
    }

    #[tokio::test]
    async fn test_store_remove_and_clear() {
        let store = CartStore::new();
        store.add_item(1, position(1, 250, 200), 1).await.unwrap();
        store.add_item(1, position(2, 150, 99), 1).await.unwrap();

        let cart = store.remove_item(1, 1).await;
        assert_eq!(cart.len(), 1);
        assert!(store.remove_item(1, 42).await.len() == 1);

        store.clear(1).await;
        assert!(store.get(1).await.is_empty());
    }
}
