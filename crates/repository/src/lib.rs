//! # Data Repository Layer
//!
//! This crate provides the generic [`Repository`] trait, one sub-trait per
//! entity, and two implementations of each:
//!
//! - [`postgres`]: PostgreSQL over a `deadpool-postgres` pool.
//! - `memory` (feature `memory`): an in-process store with the same
//!   constraints and cascades, used by the tests of the service and server
//!   crates.
//!
//! Repositories hold no business rules. Absence is reported as `None` or
//! `false`, never as an error; uniqueness and foreign-key violations are
//! reported as [`RepositoryError::Conflict`] and
//! [`RepositoryError::MissingReference`].

use std::fmt::Debug;

use async_trait::async_trait;
use model::{
    Category, CategoryCreate, CategoryRelation, CategoryUpdate, Order, OrderCreate, OrderRelation,
    OrderUpdate, ParseEnumError, PartialPayload, Position, PositionCreate, PositionRelation,
    PositionUpdate, User, UserCreate, UserRelation, UserUpdate,
};
use thiserror::Error;
use tokio_postgres::error::SqlState;

#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod postgres;

/// # RepositoryError
///
/// Error types that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// A unique constraint rejected the write.
    #[error("Unique constraint violated: {0}")]
    Conflict(String),
    /// A foreign key points at a row that does not exist.
    #[error("Referenced record does not exist: {0}")]
    MissingReference(String),
    /// A stored enum label could not be decoded.
    #[error("Cannot decode stored value: {0}")]
    Decode(#[from] ParseEnumError),
    /// The written row was gone when it was read back.
    #[error("Record {0} was not found after it was written")]
    Vanished(i64),
}

impl From<tokio_postgres::Error> for RepositoryError {
    fn from(err: tokio_postgres::Error) -> Self {
        let detail = || {
            err.as_db_error()
                .map(|db| db.detail().unwrap_or(db.message()).to_string())
                .unwrap_or_default()
        };
        match err.code() {
            Some(code) if *code == SqlState::UNIQUE_VIOLATION => Self::Conflict(detail()),
            Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => {
                Self::MissingReference(detail())
            }
            _ => Self::Db(err),
        }
    }
}

/// # Repository
///
/// Uniform create/read/update/delete for one entity type.
///
/// `related` lists the relations to load, one level deep. Anything not
/// listed comes back as `None` on the record.
#[async_trait]
pub trait Repository: Send + Sync {
    type Entity: Send + Sync;
    type Create: Send + Sync;
    /// Partial payload, used both for updates and as the listing filter.
    type Update: PartialPayload + Send + Sync;
    type Relation: Copy + Eq + Debug + Send + Sync;

    async fn get(
        &self,
        id: i64,
        related: &[Self::Relation],
    ) -> Result<Option<Self::Entity>, RepositoryError>;

    /// Records matching every set field of `filters`, ordered by id.
    /// Text fields match as case-insensitive substrings.
    async fn get_all(
        &self,
        related: &[Self::Relation],
        filters: Option<&Self::Update>,
    ) -> Result<Vec<Self::Entity>, RepositoryError>;

    /// Inserts, commits and reads the record back with `related` loaded.
    async fn create(
        &self,
        data: &Self::Create,
        related: &[Self::Relation],
    ) -> Result<Self::Entity, RepositoryError>;

    /// Applies only the set fields. `None` when the record does not exist.
    async fn update(
        &self,
        id: i64,
        data: &Self::Update,
        related: &[Self::Relation],
    ) -> Result<Option<Self::Entity>, RepositoryError>;

    /// `false` when the record does not exist.
    async fn delete(&self, id: i64) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CategoriesRepository:
    Repository<
        Entity = Category,
        Create = CategoryCreate,
        Update = CategoryUpdate,
        Relation = CategoryRelation,
    >
{
    /// Exact, case-sensitive name lookup.
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError>;
}

#[async_trait]
pub trait PositionsRepository:
    Repository<
        Entity = Position,
        Create = PositionCreate,
        Update = PositionUpdate,
        Relation = PositionRelation,
    >
{
    /// Exact, case-sensitive name lookup.
    async fn get_by_name(&self, name: &str) -> Result<Option<Position>, RepositoryError>;
}

pub trait UsersRepository:
    Repository<Entity = User, Create = UserCreate, Update = UserUpdate, Relation = UserRelation>
{
}

/// Orders are created together with their lines, atomically. An update
/// that carries `order_positions` replaces all lines of the order.
pub trait OrdersRepository:
    Repository<Entity = Order, Create = OrderCreate, Update = OrderUpdate, Relation = OrderRelation>
{
}
