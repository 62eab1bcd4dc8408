//! Business logic layer of the coffee shop.
//!
//! [`Service`] gives every entity the same create/read/update/delete flow
//! on top of its repository: validation hooks, logging and conversion of
//! records into the schemas handed to callers. The per-entity services add
//! their own rules, and [`CartService`] drives checkout.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use cart::{CartError, CartStore};
use model::{OrderStatus, PartialPayload};
use repository::{
    CategoriesRepository, OrdersRepository, PositionsRepository, Repository, RepositoryError,
    UsersRepository,
};
use thiserror::Error;
use tracing::{info, instrument, warn};

mod cart_service;
mod category;
pub mod convert;
mod order;
mod position;
mod user;

pub use cart_service::CartService;
pub use category::CategoryService;
pub use convert::{CartLineSchema, CartSchema};
pub use order::OrderService;
pub use position::PositionService;
pub use user::UserService;

/// The error type of every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Validation(String),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("{0}")]
    Forbidden(String),
    /// An operation that was attempted and refused.
    #[error("Operation failed: {0}")]
    Failed(String),
    #[error("Repository error: {0}")]
    Repository(#[source] RepositoryError),
}

/// How a [`ServiceError`] should be reported to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NotFound,
    Conflict,
    BadRequest,
    Forbidden,
    Internal,
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn status(&self) -> ErrorStatus {
        match self {
            ServiceError::NotFound { .. } => ErrorStatus::NotFound,
            ServiceError::Conflict(_) | ServiceError::InvalidTransition { .. } => {
                ErrorStatus::Conflict
            }
            ServiceError::Validation(_) | ServiceError::Failed(_) => ErrorStatus::BadRequest,
            ServiceError::Forbidden(_) => ErrorStatus::Forbidden,
            ServiceError::Repository(_) => ErrorStatus::Internal,
        }
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(detail) => {
                ServiceError::Conflict(format!("Record already exists: {detail}"))
            }
            RepositoryError::MissingReference(detail) => {
                ServiceError::Validation(format!("Referenced record does not exist: {detail}"))
            }
            other => ServiceError::Repository(other),
        }
    }
}

impl From<CartError> for ServiceError {
    fn from(err: CartError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

/// Create/read/update/delete flow shared by the entity services.
///
/// Implementors provide the repository, the record conversion and,
/// optionally, validation. Every provided operation logs what it does and
/// turns absence into [`ServiceError::NotFound`].
#[async_trait]
pub trait Service: Send + Sync {
    type Entity: Send + Sync;
    type Create: Send + Sync;
    type Update: PartialPayload + Send + Sync;
    type Relation: Copy + Eq + Debug + Send + Sync;
    type Schema: Send;
    type Repo: Repository<
            Entity = Self::Entity,
            Create = Self::Create,
            Update = Self::Update,
            Relation = Self::Relation,
        > + ?Sized;

    /// Entity name used in logs and errors.
    const NAME: &'static str;

    fn repo(&self) -> &Self::Repo;

    fn to_schema(entity: Self::Entity) -> Self::Schema;

    async fn validate_create(&self, _data: &Self::Create) -> Result<(), ServiceError> {
        Ok(())
    }

    /// Runs before an update; `current` is the stored record.
    async fn validate_update(
        &self,
        _current: &Self::Entity,
        _data: &Self::Update,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    #[instrument(skip(self, related))]
    async fn get(&self, id: i64, related: &[Self::Relation]) -> Result<Self::Schema, ServiceError> {
        info!("Fetching {} {}", Self::NAME, id);
        match self.repo().get(id, related).await? {
            Some(entity) => Ok(Self::to_schema(entity)),
            None => {
                warn!("{} {} not found", Self::NAME, id);
                Err(ServiceError::not_found(Self::NAME, id))
            }
        }
    }

    /// An empty result is not an error.
    #[instrument(skip(self, related, filters))]
    async fn get_all(
        &self,
        related: &[Self::Relation],
        filters: Option<&Self::Update>,
    ) -> Result<Vec<Self::Schema>, ServiceError> {
        let entities = self.repo().get_all(related, filters).await?;
        info!("Fetched {} {} record(s)", entities.len(), Self::NAME);
        Ok(entities.into_iter().map(Self::to_schema).collect())
    }

    #[instrument(skip(self, data, related))]
    async fn create(
        &self,
        data: &Self::Create,
        related: &[Self::Relation],
    ) -> Result<Self::Schema, ServiceError> {
        info!("Creating {}", Self::NAME);
        if let Err(err) = self.validate_create(data).await {
            warn!("Rejected new {}: {}", Self::NAME, err);
            return Err(err);
        }
        let entity = self.repo().create(data, related).await?;
        info!("Created {}", Self::NAME);
        Ok(Self::to_schema(entity))
    }

    /// An update that sets nothing returns the stored record unchanged.
    #[instrument(skip(self, data, related))]
    async fn update(
        &self,
        id: i64,
        data: &Self::Update,
        related: &[Self::Relation],
    ) -> Result<Self::Schema, ServiceError> {
        info!("Updating {} {}", Self::NAME, id);
        let Some(current) = self.repo().get(id, &[]).await? else {
            warn!("{} {} not found", Self::NAME, id);
            return Err(ServiceError::not_found(Self::NAME, id));
        };
        if let Err(err) = self.validate_update(&current, data).await {
            warn!("Rejected update of {} {}: {}", Self::NAME, id, err);
            return Err(err);
        }
        if data.is_empty() {
            return self.get(id, related).await;
        }
        let updated = self
            .repo()
            .update(id, data, related)
            .await?
            .ok_or(ServiceError::not_found(Self::NAME, id))?;
        info!("Updated {} {}", Self::NAME, id);
        Ok(Self::to_schema(updated))
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        info!("Deleting {} {}", Self::NAME, id);
        if self.repo().delete(id).await? {
            info!("Deleted {} {}", Self::NAME, id);
            Ok(())
        } else {
            warn!("{} {} not found", Self::NAME, id);
            Err(ServiceError::not_found(Self::NAME, id))
        }
    }
}

/// All services, wired to one set of repositories.
#[derive(Clone)]
pub struct Services {
    pub categories: Arc<CategoryService>,
    pub positions: Arc<PositionService>,
    pub users: Arc<UserService>,
    pub orders: Arc<OrderService>,
    pub carts: Arc<CartService>,
}

impl Services {
    pub fn new(
        categories: Arc<dyn CategoriesRepository>,
        positions: Arc<dyn PositionsRepository>,
        users: Arc<dyn UsersRepository>,
        orders: Arc<dyn OrdersRepository>,
        carts: CartStore,
    ) -> Self {
        let orders = Arc::new(OrderService::new(
            orders,
            users.clone(),
            positions.clone(),
        ));
        Self {
            categories: Arc::new(CategoryService::new(categories.clone())),
            positions: Arc::new(PositionService::new(positions.clone(), categories)),
            users: Arc::new(UserService::new(users)),
            carts: Arc::new(CartService::new(carts, positions, orders.clone())),
            orders,
        }
    }

    /// Services over the in-memory repositories of `store`.
    #[cfg(feature = "memory")]
    pub fn in_memory(store: &repository::memory::MemoryStore, carts: CartStore) -> Self {
        Self::new(
            Arc::new(store.categories()),
            Arc::new(store.positions()),
            Arc::new(store.users()),
            Arc::new(store.orders()),
            carts,
        )
    }
}
