use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use model::{
    Order, OrderCreate, OrderLineCreate, OrderRelation, OrderSchema, OrderStatus, OrderUpdate,
    Role, MAX_QUANTITY, MAX_WEIGHT,
};
use repository::{OrdersRepository, PositionsRepository, Repository, UsersRepository};
use tracing::{info, instrument, warn};

use crate::{convert, Service, ServiceError};

/// Orders, their lines and the status workflow.
///
/// Status changes follow [`OrderStatus::can_transition_to`]: a processing
/// order may be completed or cancelled, and nothing leaves a terminal
/// status.
pub struct OrderService {
    repo: Arc<dyn OrdersRepository>,
    users: Arc<dyn UsersRepository>,
    positions: Arc<dyn PositionsRepository>,
}

impl OrderService {
    pub fn new(
        repo: Arc<dyn OrdersRepository>,
        users: Arc<dyn UsersRepository>,
        positions: Arc<dyn PositionsRepository>,
    ) -> Self {
        Self {
            repo,
            users,
            positions,
        }
    }

    async fn ensure_user(&self, user_id: i64) -> Result<(), ServiceError> {
        if self.users.get(user_id, &[]).await?.is_none() {
            return Err(ServiceError::Validation(format!(
                "User {user_id} does not exist"
            )));
        }
        Ok(())
    }

    async fn validate_lines(&self, lines: &[OrderLineCreate]) -> Result<(), ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::Validation(
                "Order must contain at least one position".into(),
            ));
        }
        let mut seen = HashSet::new();
        for line in lines {
            if !(1..=MAX_QUANTITY).contains(&line.quantity) {
                return Err(ServiceError::Validation(format!(
                    "Quantity of position {} must be between 1 and {MAX_QUANTITY}",
                    line.position_id
                )));
            }
            if !(1..=MAX_WEIGHT).contains(&line.weight) {
                return Err(ServiceError::Validation(format!(
                    "Weight of position {} must be between 1 and {MAX_WEIGHT} grams",
                    line.position_id
                )));
            }
            if !seen.insert(line.position_id) {
                return Err(ServiceError::Validation(format!(
                    "Position {} appears more than once",
                    line.position_id
                )));
            }
            if self.positions.get(line.position_id, &[]).await?.is_none() {
                return Err(ServiceError::Validation(format!(
                    "Position {} does not exist",
                    line.position_id
                )));
            }
        }
        Ok(())
    }

    /// Processing orders with their lines, oldest first.
    #[instrument(skip(self))]
    pub async fn active(&self) -> Result<Vec<OrderSchema>, ServiceError> {
        let filter = OrderUpdate::status(OrderStatus::Processing);
        self.get_all(&[OrderRelation::Lines], Some(&filter)).await
    }

    /// Moves an order to `status` on behalf of a barista.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        order_id: i64,
        status: OrderStatus,
        barista_id: i64,
    ) -> Result<OrderSchema, ServiceError> {
        match self.users.get(barista_id, &[]).await? {
            Some(user) if user.role == Role::Barista => {}
            _ => {
                warn!("User {} is not allowed to change order status", barista_id);
                return Err(ServiceError::Forbidden(format!(
                    "User {barista_id} is not a barista"
                )));
            }
        }
        let order = self
            .update(order_id, &OrderUpdate::status(status), &[OrderRelation::Lines])
            .await?;
        info!("Order {} is now {}", order_id, status);
        Ok(order)
    }
}

#[async_trait]
impl Service for OrderService {
    type Entity = Order;
    type Create = OrderCreate;
    type Update = OrderUpdate;
    type Relation = OrderRelation;
    type Schema = OrderSchema;
    type Repo = dyn OrdersRepository;

    const NAME: &'static str = "order";

    fn repo(&self) -> &Self::Repo {
        self.repo.as_ref()
    }

    fn to_schema(entity: Order) -> OrderSchema {
        convert::order_schema(entity)
    }

    async fn validate_create(&self, data: &OrderCreate) -> Result<(), ServiceError> {
        self.ensure_user(data.user_id).await?;
        self.validate_lines(&data.order_positions).await
    }

    async fn validate_update(&self, current: &Order, data: &OrderUpdate) -> Result<(), ServiceError> {
        if let Some(status) = data.status {
            if !current.status.can_transition_to(status) {
                return Err(ServiceError::InvalidTransition {
                    from: current.status,
                    to: status,
                });
            }
        }
        if let Some(user_id) = data.user_id {
            self.ensure_user(user_id).await?;
        }
        if let Some(lines) = &data.order_positions {
            self.validate_lines(lines).await?;
        }
        Ok(())
    }
}
