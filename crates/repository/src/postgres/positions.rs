use async_trait::async_trait;
use deadpool_postgres::Pool;
use model::{Field, PartialPayload, Position, PositionCreate, PositionRelation, PositionUpdate};
use tokio_postgres::GenericClient;

use super::{
    id_field, load_categories, position_from_row, set_clause, where_clause, Params,
    POSITION_COLUMNS,
};
use crate::{PositionsRepository, Repository, RepositoryError};

/// PostgreSQL implementation of [`PositionsRepository`].
pub struct PgPositionsRepository {
    pool: Pool,
}

impl PgPositionsRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

async fn select<C: GenericClient + Sync>(
    client: &C,
    fields: &[Field],
    related: &[PositionRelation],
) -> Result<Vec<Position>, RepositoryError> {
    let mut params = Params::new();
    let query = format!(
        "SELECT {POSITION_COLUMNS} FROM positions{} ORDER BY id",
        where_clause(fields, &mut params)
    );
    let rows = client.query(query.as_str(), &params.as_refs()).await?;
    let mut positions: Vec<Position> = rows.iter().map(position_from_row).collect();

    if related.contains(&PositionRelation::Category) {
        let ids: Vec<i64> = positions.iter().map(|p| p.category_id).collect();
        let categories = load_categories(client, &ids).await?;
        for position in &mut positions {
            position.category = categories.get(&position.category_id).cloned();
        }
    }
    Ok(positions)
}

#[async_trait]
impl Repository for PgPositionsRepository {
    type Entity = Position;
    type Create = PositionCreate;
    type Update = PositionUpdate;
    type Relation = PositionRelation;

    async fn get(
        &self,
        id: i64,
        related: &[PositionRelation],
    ) -> Result<Option<Position>, RepositoryError> {
        let client = self.pool.get().await?;
        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn get_all(
        &self,
        related: &[PositionRelation],
        filters: Option<&PositionUpdate>,
    ) -> Result<Vec<Position>, RepositoryError> {
        let client = self.pool.get().await?;
        let fields = filters.map(|f| f.fields()).unwrap_or_default();
        select(&**client, &fields, related).await
    }

    async fn create(
        &self,
        data: &PositionCreate,
        related: &[PositionRelation],
    ) -> Result<Position, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                r#"
                INSERT INTO positions (name, category_id, weight, price)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
                &[&data.name, &data.category_id, &data.weight, &data.price],
            )
            .await?;
        let id: i64 = row.get("id");
        select(&**client, &[id_field(id)], related)
            .await?
            .pop()
            .ok_or(RepositoryError::Vanished(id))
    }

    async fn update(
        &self,
        id: i64,
        data: &PositionUpdate,
        related: &[PositionRelation],
    ) -> Result<Option<Position>, RepositoryError> {
        let client = self.pool.get().await?;
        let fields = data.fields();
        if !fields.is_empty() {
            let mut params = Params::new();
            let set = set_clause(&fields, &mut params);
            let query = format!("UPDATE positions SET {set} WHERE id = {}", params.bind(id));
            if client.execute(query.as_str(), &params.as_refs()).await? == 0 {
                return Ok(None);
            }
        }
        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM positions WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl PositionsRepository for PgPositionsRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<Position>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {POSITION_COLUMNS} FROM positions WHERE name = $1");
        let row = client.query_opt(query.as_str(), &[&name]).await?;
        Ok(row.as_ref().map(position_from_row))
    }
}
