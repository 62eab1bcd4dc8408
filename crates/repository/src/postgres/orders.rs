use async_trait::async_trait;
use deadpool_postgres::Pool;
use model::{
    Field, Order, OrderCreate, OrderLineCreate, OrderRelation, OrderUpdate, PartialPayload,
};
use tokio_postgres::GenericClient;

use super::{
    id_field, load_lines_of, order_from_row, set_clause, where_clause, Params, ORDER_COLUMNS,
};
use crate::{OrdersRepository, Repository, RepositoryError};

/// PostgreSQL implementation of [`OrdersRepository`].
///
/// Order rows and their lines are always written in one transaction.
pub struct PgOrdersRepository {
    pool: Pool,
}

impl PgOrdersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

async fn select<C: GenericClient + Sync>(
    client: &C,
    fields: &[Field],
    related: &[OrderRelation],
) -> Result<Vec<Order>, RepositoryError> {
    let mut params = Params::new();
    let query = format!(
        "SELECT {ORDER_COLUMNS} FROM orders{} ORDER BY id",
        where_clause(fields, &mut params)
    );
    let rows = client.query(query.as_str(), &params.as_refs()).await?;
    let mut orders = rows
        .iter()
        .map(order_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    if related.contains(&OrderRelation::Lines) {
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        let mut lines = load_lines_of(client, &ids).await?;
        for order in &mut orders {
            order.lines = Some(lines.remove(&order.id).unwrap_or_default());
        }
    }
    Ok(orders)
}

async fn insert_lines<C: GenericClient + Sync>(
    client: &C,
    order_id: i64,
    lines: &[OrderLineCreate],
) -> Result<(), RepositoryError> {
    let query = r#"
        INSERT INTO order_positions (order_id, position_id, quantity, weight)
        VALUES ($1, $2, $3, $4)
    "#;
    for line in lines {
        client
            .execute(
                query,
                &[&order_id, &line.position_id, &line.quantity, &line.weight],
            )
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Repository for PgOrdersRepository {
    type Entity = Order;
    type Create = OrderCreate;
    type Update = OrderUpdate;
    type Relation = OrderRelation;

    async fn get(
        &self,
        id: i64,
        related: &[OrderRelation],
    ) -> Result<Option<Order>, RepositoryError> {
        let client = self.pool.get().await?;
        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn get_all(
        &self,
        related: &[OrderRelation],
        filters: Option<&OrderUpdate>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let client = self.pool.get().await?;
        let fields = filters.map(|f| f.fields()).unwrap_or_default();
        select(&**client, &fields, related).await
    }

    async fn create(
        &self,
        data: &OrderCreate,
        related: &[OrderRelation],
    ) -> Result<Order, RepositoryError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                "INSERT INTO orders (user_id, obtaining_method) VALUES ($1, $2) RETURNING id",
                &[&data.user_id, &data.obtaining_method.as_str()],
            )
            .await?;
        let id: i64 = row.get("id");
        insert_lines(&*tx, id, &data.order_positions).await?;
        tx.commit().await?;

        select(&**client, &[id_field(id)], related)
            .await?
            .pop()
            .ok_or(RepositoryError::Vanished(id))
    }

    /// Updates the order row and, when `order_positions` is set, replaces
    /// every line of the order with the new set.
    async fn update(
        &self,
        id: i64,
        data: &OrderUpdate,
        related: &[OrderRelation],
    ) -> Result<Option<Order>, RepositoryError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let existing = tx
            .query_opt("SELECT id FROM orders WHERE id = $1 FOR UPDATE", &[&id])
            .await?;
        if existing.is_none() {
            return Ok(None);
        }

        let fields = data.fields();
        if !fields.is_empty() {
            let mut params = Params::new();
            let set = set_clause(&fields, &mut params);
            let query = format!("UPDATE orders SET {set} WHERE id = {}", params.bind(id));
            tx.execute(query.as_str(), &params.as_refs()).await?;
        }

        if let Some(lines) = &data.order_positions {
            tx.execute("DELETE FROM order_positions WHERE order_id = $1", &[&id])
                .await?;
            insert_lines(&*tx, id, lines).await?;
        }
        tx.commit().await?;

        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM orders WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}

impl OrdersRepository for PgOrdersRepository {}
