//! In-process implementation of the repositories.
//!
//! All repositories created from one [`MemoryStore`] share its tables, so
//! foreign keys, unique names and cascading deletes behave as they do in
//! PostgreSQL. Every write holds the table lock for its whole duration,
//! which makes multi-row writes atomic.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use model::{
    Category, CategoryCreate, CategoryRelation, CategoryUpdate, Field, FieldValue, Order,
    OrderCreate, OrderLine, OrderLineCreate, OrderRelation, OrderStatus, OrderUpdate,
    PartialPayload, Position, PositionCreate, PositionRelation, PositionUpdate, User, UserCreate,
    UserRelation, UserUpdate,
};
use tokio::sync::RwLock;

use crate::{
    CategoriesRepository, OrdersRepository, PositionsRepository, Repository, RepositoryError,
    UsersRepository,
};

/// Column access used to evaluate filters.
trait Columns {
    fn column(&self, name: &str) -> Option<FieldValue>;
}

impl Columns for Category {
    fn column(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::BigInt(self.id)),
            "name" => Some(FieldValue::Text(self.name.clone())),
            _ => None,
        }
    }
}

impl Columns for Position {
    fn column(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::BigInt(self.id)),
            "name" => Some(FieldValue::Text(self.name.clone())),
            "category_id" => Some(FieldValue::BigInt(self.category_id)),
            "weight" => Some(FieldValue::Int(self.weight)),
            "price" => Some(FieldValue::Int(self.price)),
            _ => None,
        }
    }
}

impl Columns for User {
    fn column(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::BigInt(self.id)),
            "role" => Some(FieldValue::Keyword(self.role.as_str())),
            _ => None,
        }
    }
}

impl Columns for Order {
    fn column(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::BigInt(self.id)),
            "user_id" => Some(FieldValue::BigInt(self.user_id)),
            "date" => Some(FieldValue::Timestamp(self.date)),
            "status" => Some(FieldValue::Keyword(self.status.as_str())),
            "obtaining_method" => Some(FieldValue::Keyword(self.obtaining_method.as_str())),
            _ => None,
        }
    }
}

fn matches<T: Columns>(row: &T, fields: &[Field]) -> bool {
    fields.iter().all(|field| {
        row.column(field.column)
            .is_some_and(|stored| field.value.matches(&stored))
    })
}

fn filter_fields<U: PartialPayload>(filters: Option<&U>) -> Vec<Field> {
    filters.map(|f| f.fields()).unwrap_or_default()
}

/// Rows are stored without relations; reads attach them on demand.
#[derive(Debug, Default)]
struct Tables {
    categories: BTreeMap<i64, Category>,
    positions: BTreeMap<i64, Position>,
    users: BTreeMap<i64, User>,
    orders: BTreeMap<i64, Order>,
    lines: BTreeMap<(i64, i64), OrderLine>,
    category_seq: i64,
    position_seq: i64,
    order_seq: i64,
}

impl Tables {
    fn category(&self, row: &Category, related: &[CategoryRelation]) -> Category {
        let mut category = row.clone();
        if related.contains(&CategoryRelation::Positions) {
            category.positions = Some(
                self.positions
                    .values()
                    .filter(|p| p.category_id == row.id)
                    .cloned()
                    .collect(),
            );
        }
        category
    }

    fn position(&self, row: &Position, related: &[PositionRelation]) -> Position {
        let mut position = row.clone();
        if related.contains(&PositionRelation::Category) {
            position.category = self.categories.get(&row.category_id).cloned();
        }
        position
    }

    fn lines_of(&self, order_id: i64) -> Vec<OrderLine> {
        self.lines
            .range((order_id, i64::MIN)..=(order_id, i64::MAX))
            .map(|(_, line)| {
                let mut line = line.clone();
                line.position = self
                    .positions
                    .get(&line.position_id)
                    .map(|p| self.position(p, &[PositionRelation::Category]));
                line
            })
            .collect()
    }

    fn order(&self, row: &Order, related: &[OrderRelation]) -> Order {
        let mut order = row.clone();
        if related.contains(&OrderRelation::Lines) {
            order.lines = Some(self.lines_of(row.id));
        }
        order
    }

    fn user(&self, row: &User, related: &[UserRelation]) -> User {
        let mut user = row.clone();
        if related.contains(&UserRelation::Orders) {
            user.orders = Some(
                self.orders
                    .values()
                    .filter(|o| o.user_id == row.id)
                    .map(|o| self.order(o, &[OrderRelation::Lines]))
                    .collect(),
            );
        }
        user
    }

    fn check_category_name(&self, name: &str, except: Option<i64>) -> Result<(), RepositoryError> {
        if self
            .categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except)
        {
            return Err(RepositoryError::Conflict(format!("category name '{name}'")));
        }
        Ok(())
    }

    fn check_position_name(&self, name: &str, except: Option<i64>) -> Result<(), RepositoryError> {
        if self
            .positions
            .values()
            .any(|p| p.name == name && Some(p.id) != except)
        {
            return Err(RepositoryError::Conflict(format!("position name '{name}'")));
        }
        Ok(())
    }

    fn check_category_exists(&self, id: i64) -> Result<(), RepositoryError> {
        if !self.categories.contains_key(&id) {
            return Err(RepositoryError::MissingReference(format!("category {id}")));
        }
        Ok(())
    }

    fn check_user_exists(&self, id: i64) -> Result<(), RepositoryError> {
        if !self.users.contains_key(&id) {
            return Err(RepositoryError::MissingReference(format!("user {id}")));
        }
        Ok(())
    }

    fn check_lines(&self, lines: &[OrderLineCreate]) -> Result<(), RepositoryError> {
        for (i, line) in lines.iter().enumerate() {
            if !self.positions.contains_key(&line.position_id) {
                return Err(RepositoryError::MissingReference(format!(
                    "position {}",
                    line.position_id
                )));
            }
            if lines[..i].iter().any(|l| l.position_id == line.position_id) {
                return Err(RepositoryError::Conflict(format!(
                    "order line for position {}",
                    line.position_id
                )));
            }
        }
        Ok(())
    }

    fn insert_lines(&mut self, order_id: i64, lines: &[OrderLineCreate]) {
        for line in lines {
            self.lines.insert(
                (order_id, line.position_id),
                OrderLine {
                    order_id,
                    position_id: line.position_id,
                    quantity: line.quantity,
                    weight: line.weight,
                    position: None,
                },
            );
        }
    }

    fn delete_order(&mut self, id: i64) -> bool {
        self.lines.retain(|(order_id, _), _| *order_id != id);
        self.orders.remove(&id).is_some()
    }

    fn delete_position(&mut self, id: i64) -> bool {
        self.lines.retain(|(_, position_id), _| *position_id != id);
        self.positions.remove(&id).is_some()
    }

    fn delete_category(&mut self, id: i64) -> bool {
        let positions: Vec<i64> = self
            .positions
            .values()
            .filter(|p| p.category_id == id)
            .map(|p| p.id)
            .collect();
        for position_id in positions {
            self.delete_position(position_id);
        }
        self.categories.remove(&id).is_some()
    }

    fn delete_user(&mut self, id: i64) -> bool {
        let orders: Vec<i64> = self
            .orders
            .values()
            .filter(|o| o.user_id == id)
            .map(|o| o.id)
            .collect();
        for order_id in orders {
            self.delete_order(order_id);
        }
        self.users.remove(&id).is_some()
    }
}

/// Shared in-memory tables. Cloning yields another handle to the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn categories(&self) -> MemoryCategoriesRepository {
        MemoryCategoriesRepository { store: self.clone() }
    }

    pub fn positions(&self) -> MemoryPositionsRepository {
        MemoryPositionsRepository { store: self.clone() }
    }

    pub fn users(&self) -> MemoryUsersRepository {
        MemoryUsersRepository { store: self.clone() }
    }

    pub fn orders(&self) -> MemoryOrdersRepository {
        MemoryOrdersRepository { store: self.clone() }
    }
}

pub struct MemoryCategoriesRepository {
    store: MemoryStore,
}

#[async_trait]
impl Repository for MemoryCategoriesRepository {
    type Entity = Category;
    type Create = CategoryCreate;
    type Update = CategoryUpdate;
    type Relation = CategoryRelation;

    async fn get(
        &self,
        id: i64,
        related: &[CategoryRelation],
    ) -> Result<Option<Category>, RepositoryError> {
        let tables = self.store.tables.read().await;
        Ok(tables.categories.get(&id).map(|c| tables.category(c, related)))
    }

    async fn get_all(
        &self,
        related: &[CategoryRelation],
        filters: Option<&CategoryUpdate>,
    ) -> Result<Vec<Category>, RepositoryError> {
        let fields = filter_fields(filters);
        let tables = self.store.tables.read().await;
        Ok(tables
            .categories
            .values()
            .filter(|c| matches(*c, &fields))
            .map(|c| tables.category(c, related))
            .collect())
    }

    async fn create(
        &self,
        data: &CategoryCreate,
        related: &[CategoryRelation],
    ) -> Result<Category, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        tables.check_category_name(&data.name, None)?;
        tables.category_seq += 1;
        let row = Category {
            id: tables.category_seq,
            name: data.name.clone(),
            positions: None,
        };
        tables.categories.insert(row.id, row.clone());
        Ok(tables.category(&row, related))
    }

    async fn update(
        &self,
        id: i64,
        data: &CategoryUpdate,
        related: &[CategoryRelation],
    ) -> Result<Option<Category>, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        let Some(mut row) = tables.categories.get(&id).cloned() else {
            return Ok(None);
        };
        if let Some(name) = &data.name {
            tables.check_category_name(name, Some(id))?;
            row.name = name.clone();
        }
        tables.categories.insert(id, row.clone());
        Ok(Some(tables.category(&row, related)))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.store.tables.write().await.delete_category(id))
    }
}

#[async_trait]
impl CategoriesRepository for MemoryCategoriesRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let tables = self.store.tables.read().await;
        Ok(tables.categories.values().find(|c| c.name == name).cloned())
    }
}

pub struct MemoryPositionsRepository {
    store: MemoryStore,
}

#[async_trait]
impl Repository for MemoryPositionsRepository {
    type Entity = Position;
    type Create = PositionCreate;
    type Update = PositionUpdate;
    type Relation = PositionRelation;

    async fn get(
        &self,
        id: i64,
        related: &[PositionRelation],
    ) -> Result<Option<Position>, RepositoryError> {
        let tables = self.store.tables.read().await;
        Ok(tables.positions.get(&id).map(|p| tables.position(p, related)))
    }

    async fn get_all(
        &self,
        related: &[PositionRelation],
        filters: Option<&PositionUpdate>,
    ) -> Result<Vec<Position>, RepositoryError> {
        let fields = filter_fields(filters);
        let tables = self.store.tables.read().await;
        Ok(tables
            .positions
            .values()
            .filter(|p| matches(*p, &fields))
            .map(|p| tables.position(p, related))
            .collect())
    }

    async fn create(
        &self,
        data: &PositionCreate,
        related: &[PositionRelation],
    ) -> Result<Position, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        tables.check_position_name(&data.name, None)?;
        tables.check_category_exists(data.category_id)?;
        tables.position_seq += 1;
        let row = Position {
            id: tables.position_seq,
            name: data.name.clone(),
            category_id: data.category_id,
            weight: data.weight,
            price: data.price,
            category: None,
        };
        tables.positions.insert(row.id, row.clone());
        Ok(tables.position(&row, related))
    }

    async fn update(
        &self,
        id: i64,
        data: &PositionUpdate,
        related: &[PositionRelation],
    ) -> Result<Option<Position>, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        let Some(mut row) = tables.positions.get(&id).cloned() else {
            return Ok(None);
        };
        if let Some(name) = &data.name {
            tables.check_position_name(name, Some(id))?;
            row.name = name.clone();
        }
        if let Some(category_id) = data.category_id {
            tables.check_category_exists(category_id)?;
            row.category_id = category_id;
        }
        if let Some(weight) = data.weight {
            row.weight = weight;
        }
        if let Some(price) = data.price {
            row.price = price;
        }
        tables.positions.insert(id, row.clone());
        Ok(Some(tables.position(&row, related)))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.store.tables.write().await.delete_position(id))
    }
}

#[async_trait]
impl PositionsRepository for MemoryPositionsRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<Position>, RepositoryError> {
        let tables = self.store.tables.read().await;
        Ok(tables.positions.values().find(|p| p.name == name).cloned())
    }
}

pub struct MemoryUsersRepository {
    store: MemoryStore,
}

#[async_trait]
impl Repository for MemoryUsersRepository {
    type Entity = User;
    type Create = UserCreate;
    type Update = UserUpdate;
    type Relation = UserRelation;

    async fn get(&self, id: i64, related: &[UserRelation]) -> Result<Option<User>, RepositoryError> {
        let tables = self.store.tables.read().await;
        Ok(tables.users.get(&id).map(|u| tables.user(u, related)))
    }

    async fn get_all(
        &self,
        related: &[UserRelation],
        filters: Option<&UserUpdate>,
    ) -> Result<Vec<User>, RepositoryError> {
        let fields = filter_fields(filters);
        let tables = self.store.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| matches(*u, &fields))
            .map(|u| tables.user(u, related))
            .collect())
    }

    async fn create(
        &self,
        data: &UserCreate,
        related: &[UserRelation],
    ) -> Result<User, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        if tables.users.contains_key(&data.id) {
            return Err(RepositoryError::Conflict(format!("user {}", data.id)));
        }
        let row = User {
            id: data.id,
            role: data.role,
            orders: None,
        };
        tables.users.insert(row.id, row.clone());
        Ok(tables.user(&row, related))
    }

    async fn update(
        &self,
        id: i64,
        data: &UserUpdate,
        related: &[UserRelation],
    ) -> Result<Option<User>, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        let Some(row) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(role) = data.role {
            row.role = role;
        }
        let row = row.clone();
        Ok(Some(tables.user(&row, related)))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.store.tables.write().await.delete_user(id))
    }
}

impl UsersRepository for MemoryUsersRepository {}

pub struct MemoryOrdersRepository {
    store: MemoryStore,
}

#[async_trait]
impl Repository for MemoryOrdersRepository {
    type Entity = Order;
    type Create = OrderCreate;
    type Update = OrderUpdate;
    type Relation = OrderRelation;

    async fn get(
        &self,
        id: i64,
        related: &[OrderRelation],
    ) -> Result<Option<Order>, RepositoryError> {
        let tables = self.store.tables.read().await;
        Ok(tables.orders.get(&id).map(|o| tables.order(o, related)))
    }

    async fn get_all(
        &self,
        related: &[OrderRelation],
        filters: Option<&OrderUpdate>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let fields = filter_fields(filters);
        let tables = self.store.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| matches(*o, &fields))
            .map(|o| tables.order(o, related))
            .collect())
    }

    async fn create(
        &self,
        data: &OrderCreate,
        related: &[OrderRelation],
    ) -> Result<Order, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        tables.check_user_exists(data.user_id)?;
        tables.check_lines(&data.order_positions)?;

        tables.order_seq += 1;
        let row = Order {
            id: tables.order_seq,
            date: Utc::now(),
            status: OrderStatus::default(),
            obtaining_method: data.obtaining_method,
            user_id: data.user_id,
            lines: None,
        };
        tables.orders.insert(row.id, row.clone());
        tables.insert_lines(row.id, &data.order_positions);
        Ok(tables.order(&row, related))
    }

    async fn update(
        &self,
        id: i64,
        data: &OrderUpdate,
        related: &[OrderRelation],
    ) -> Result<Option<Order>, RepositoryError> {
        let mut tables = self.store.tables.write().await;
        let Some(mut row) = tables.orders.get(&id).cloned() else {
            return Ok(None);
        };
        if let Some(user_id) = data.user_id {
            tables.check_user_exists(user_id)?;
            row.user_id = user_id;
        }
        if let Some(lines) = &data.order_positions {
            tables.check_lines(lines)?;
        }
        if let Some(obtaining_method) = data.obtaining_method {
            row.obtaining_method = obtaining_method;
        }
        if let Some(date) = data.date {
            row.date = date;
        }
        if let Some(status) = data.status {
            row.status = status;
        }

        tables.orders.insert(id, row.clone());
        if let Some(lines) = &data.order_positions {
            tables.lines.retain(|(order_id, _), _| *order_id != id);
            tables.insert_lines(id, lines);
        }
        Ok(Some(tables.order(&row, related)))
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        Ok(self.store.tables.write().await.delete_order(id))
    }
}

impl OrdersRepository for MemoryOrdersRepository {}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{ObtainingMethod, Role};

    async fn seeded() -> (MemoryStore, Category, Position) {
        let store = MemoryStore::new();
        let coffee = store
            .categories()
            .create(&CategoryCreate { name: "Кофе".into() }, &[])
            .await
            .unwrap();
        let cappuccino = store
            .positions()
            .create(
                &PositionCreate {
                    name: "Капучино".into(),
                    category_id: coffee.id,
                    weight: 250,
                    price: 200,
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
        (store, coffee, cappuccino)
    }

    fn order_for(position_id: i64) -> OrderCreate {
        OrderCreate {
            user_id: 1,
            obtaining_method: ObtainingMethod::Takeaway,
            order_positions: vec![OrderLineCreate {
                position_id,
                quantity: 2,
                weight: 200,
            }],
        }
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = MemoryStore::new();
        assert!(store.categories().get(99, &[]).await.unwrap().is_none());
        assert!(!store.categories().delete(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_relations_are_loaded_only_on_request() {
        let (store, coffee, cappuccino) = seeded().await;

        let plain = store.categories().get(coffee.id, &[]).await.unwrap().unwrap();
        assert!(plain.positions.is_none());

        let loaded = store
            .categories()
            .get(coffee.id, &[CategoryRelation::Positions])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.positions.unwrap()[0].id, cappuccino.id);

        let position = store
            .positions()
            .get(cappuccino.id, &[PositionRelation::Category])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.category.unwrap().name, "Кофе");
    }

    #[tokio::test]
    async fn test_text_filter_is_case_insensitive_substring() {
        let (store, coffee, _) = seeded().await;
        let filter = PositionUpdate {
            name: Some("кап".into()),
            ..PositionUpdate::default()
        };
        let found = store.positions().get_all(&[], Some(&filter)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Капучино");

        let filter = PositionUpdate {
            name: Some("кап".into()),
            category_id: Some(coffee.id + 1),
            ..PositionUpdate::default()
        };
        assert!(store.positions().get_all(&[], Some(&filter)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unique_name_and_foreign_keys() {
        let (store, coffee, _) = seeded().await;
        let err = store
            .categories()
            .create(&CategoryCreate { name: "Кофе".into() }, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let err = store
            .positions()
            .create(
                &PositionCreate {
                    name: "Латте".into(),
                    category_id: coffee.id + 10,
                    weight: 300,
                    price: 200,
                },
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::MissingReference(_)));
    }

    #[tokio::test]
    async fn test_order_with_missing_position_persists_nothing() {
        let (store, _, cappuccino) = seeded().await;
        let mut data = order_for(cappuccino.id);
        data.order_positions.push(OrderLineCreate {
            position_id: 404,
            quantity: 1,
            weight: 100,
        });
        let err = store.orders().create(&data, &[]).await.unwrap_err();
        assert!(matches!(err, RepositoryError::MissingReference(_)));
        assert!(store.orders().get_all(&[], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_update_replaces_lines() {
        let (store, coffee, cappuccino) = seeded().await;
        let latte = store
            .positions()
            .create(
                &PositionCreate {
                    name: "Латте".into(),
                    category_id: coffee.id,
                    weight: 300,
                    price: 180,
                },
                &[],
            )
            .await
            .unwrap();
        let order = store.orders().create(&order_for(cappuccino.id), &[]).await.unwrap();

        let update = OrderUpdate {
            order_positions: Some(vec![OrderLineCreate {
                position_id: latte.id,
                quantity: 1,
                weight: 300,
            }]),
            ..OrderUpdate::default()
        };
        let updated = store
            .orders()
            .update(order.id, &update, &[OrderRelation::Lines])
            .await
            .unwrap()
            .unwrap();
        let lines = updated.lines.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].position_id, latte.id);
        assert_eq!(updated.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_deleting_category_cascades_to_positions_and_lines() {
        let (store, coffee, cappuccino) = seeded().await;
        let order = store.orders().create(&order_for(cappuccino.id), &[]).await.unwrap();

        assert!(store.categories().delete(coffee.id).await.unwrap());
        assert!(store.positions().get(cappuccino.id, &[]).await.unwrap().is_none());
        let order = store
            .orders()
            .get(order.id, &[OrderRelation::Lines])
            .await
            .unwrap()
            .unwrap();
        assert!(order.lines.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_to_orders() {
        let (store, _, cappuccino) = seeded().await;
        let order = store.orders().create(&order_for(cappuccino.id), &[]).await.unwrap();
        assert!(store.users().delete(1).await.unwrap());
        assert!(store.orders().get(order.id, &[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_filter_matches_exactly() {
        let (store, _, cappuccino) = seeded().await;
        let order = store.orders().create(&order_for(cappuccino.id), &[]).await.unwrap();
        let processing = OrderUpdate::status(OrderStatus::Processing);
        let completed = OrderUpdate::status(OrderStatus::Completed);
        assert_eq!(
            store.orders().get_all(&[], Some(&processing)).await.unwrap()[0].id,
            order.id
        );
        assert!(store.orders().get_all(&[], Some(&completed)).await.unwrap().is_empty());
    }
}
