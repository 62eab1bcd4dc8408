use std::sync::Arc;

use cart::CartStore;
use model::{ObtainingMethod, OrderCreate, OrderRelation, OrderSchema, PositionRelation};
use repository::{PositionsRepository, Repository};
use tracing::{info, instrument, warn};

use crate::convert::{self, CartSchema};
use crate::{OrderService, Service, ServiceError};

/// Cart staging and checkout.
pub struct CartService {
    carts: CartStore,
    positions: Arc<dyn PositionsRepository>,
    orders: Arc<OrderService>,
}

impl CartService {
    pub fn new(
        carts: CartStore,
        positions: Arc<dyn PositionsRepository>,
        orders: Arc<OrderService>,
    ) -> Self {
        Self {
            carts,
            positions,
            orders,
        }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, user_id: i64) -> CartSchema {
        convert::cart_schema(user_id, &self.carts.get(user_id).await)
    }

    /// Snapshots the current position into the user's cart.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: i64,
        position_id: i64,
        quantity: i32,
    ) -> Result<CartSchema, ServiceError> {
        let position = self
            .positions
            .get(position_id, &[PositionRelation::Category])
            .await?
            .ok_or(ServiceError::not_found("position", position_id))?;
        let cart = self
            .carts
            .add_item(user_id, convert::position_schema(position), quantity)
            .await?;
        info!("Added {} x position {} to cart of user {}", quantity, position_id, user_id);
        Ok(convert::cart_schema(user_id, &cart))
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, user_id: i64, position_id: i64) -> CartSchema {
        let cart = self.carts.remove_item(user_id, position_id).await;
        convert::cart_schema(user_id, &cart)
    }

    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: i64) {
        self.carts.clear(user_id).await;
        info!("Cleared cart of user {}", user_id);
    }

    /// Turns the cart into an order. The cart is emptied only when the
    /// order was created.
    #[instrument(skip(self))]
    pub async fn checkout(
        &self,
        user_id: i64,
        obtaining_method: ObtainingMethod,
    ) -> Result<OrderSchema, ServiceError> {
        let cart = self.carts.get(user_id).await;
        if cart.is_empty() {
            warn!("Checkout of empty cart for user {}", user_id);
            return Err(ServiceError::Validation("Cart is empty".into()));
        }
        let data = OrderCreate {
            user_id,
            order_positions: cart.order_lines(),
            obtaining_method,
        };
        let order = self.orders.create(&data, &[OrderRelation::Lines]).await?;
        self.carts.clear(user_id).await;
        info!("User {} checked out order {}", user_id, order.id);
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{CategoryCreate, OrderStatus, PositionCreate, Role, UserCreate};
    use repository::memory::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        service: CartService,
        position: i64,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let tea = store
            .categories()
            .create(&CategoryCreate { name: "Чай".into() }, &[])
            .await
            .unwrap();
        let position = store
            .positions()
            .create(
                &PositionCreate {
                    name: "Зелёный чай".into(),
                    category_id: tea.id,
                    weight: 300,
                    price: 50,
                },
                &[],
            )
            .await
            .unwrap();
        store
            .users()
            .create(&UserCreate { id: 1, role: Role::Client }, &[])
            .await
            .unwrap();
        let orders = Arc::new(OrderService::new(
            Arc::new(store.orders()),
            Arc::new(store.users()),
            Arc::new(store.positions()),
        ));
        let service = CartService::new(CartStore::new(), Arc::new(store.positions()), orders);
        Fixture {
            store,
            service,
            position: position.id,
        }
    }

    #[tokio::test]
    async fn test_add_prices_cart() {
        let f = fixture().await;
        f.service.add(1, f.position, 1).await.unwrap();
        let cart = f.service.add(1, f.position, 2).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.total_price, 450);
        assert_eq!(cart.items[0].position.category.as_ref().unwrap().name, "Чай");
    }

    #[tokio::test]
    async fn test_add_unknown_position() {
        let f = fixture().await;
        assert!(matches!(
            f.service.add(1, 99, 1).await.unwrap_err(),
            ServiceError::NotFound { .. }
        ));
        assert!(matches!(
            f.service.add(1, f.position, 0).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_add_beyond_quantity_limit() {
        let f = fixture().await;
        assert!(matches!(
            f.service.add(1, f.position, 2_000_000_000).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
        assert!(f.service.get(1).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_creates_order_and_clears_cart() {
        let f = fixture().await;
        f.service.add(1, f.position, 2).await.unwrap();
        let order = f
            .service
            .checkout(1, ObtainingMethod::Delivery)
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.obtaining_method, ObtainingMethod::Delivery);
        assert_eq!(order.total_price, Some(300));
        assert!(f.service.get(1).await.items.is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_checkout_is_rejected() {
        let f = fixture().await;
        assert!(matches!(
            f.service.checkout(1, ObtainingMethod::Inplace).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart() {
        let f = fixture().await;
        f.service.add(5, f.position, 1).await.unwrap();
        // user 5 was never registered
        assert!(f.service.checkout(5, ObtainingMethod::Inplace).await.is_err());
        assert_eq!(f.service.get(5).await.items.len(), 1);

        f.service.add(1, f.position, 1).await.unwrap();
        f.store.positions().delete(f.position).await.unwrap();
        assert!(f.service.checkout(1, ObtainingMethod::Inplace).await.is_err());
        assert_eq!(f.service.get(1).await.items.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let f = fixture().await;
        f.service.add(1, f.position, 1).await.unwrap();
        assert!(f.service.remove(1, f.position).await.items.is_empty());
        f.service.add(1, f.position, 1).await.unwrap();
        f.service.clear(1).await;
        assert_eq!(f.service.get(1).await.total_price, 0);
    }
}
