use async_trait::async_trait;
use deadpool_postgres::Pool;
use model::{Category, CategoryCreate, CategoryRelation, CategoryUpdate, Field, PartialPayload};
use tokio_postgres::GenericClient;

use super::{
    category_from_row, id_field, load_positions_of, set_clause, where_clause, Params,
    CATEGORY_COLUMNS,
};
use crate::{CategoriesRepository, Repository, RepositoryError};

/// PostgreSQL implementation of [`CategoriesRepository`].
pub struct PgCategoriesRepository {
    pool: Pool,
}

impl PgCategoriesRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

async fn select<C: GenericClient + Sync>(
    client: &C,
    fields: &[Field],
    related: &[CategoryRelation],
) -> Result<Vec<Category>, RepositoryError> {
    let mut params = Params::new();
    let query = format!(
        "SELECT {CATEGORY_COLUMNS} FROM categories{} ORDER BY id",
        where_clause(fields, &mut params)
    );
    let rows = client.query(query.as_str(), &params.as_refs()).await?;
    let mut categories: Vec<Category> = rows.iter().map(category_from_row).collect();

    if related.contains(&CategoryRelation::Positions) {
        let ids: Vec<i64> = categories.iter().map(|c| c.id).collect();
        let mut positions = load_positions_of(client, &ids).await?;
        for category in &mut categories {
            category.positions = Some(positions.remove(&category.id).unwrap_or_default());
        }
    }
    Ok(categories)
}

#[async_trait]
impl Repository for PgCategoriesRepository {
    type Entity = Category;
    type Create = CategoryCreate;
    type Update = CategoryUpdate;
    type Relation = CategoryRelation;

    async fn get(
        &self,
        id: i64,
        related: &[CategoryRelation],
    ) -> Result<Option<Category>, RepositoryError> {
        let client = self.pool.get().await?;
        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn get_all(
        &self,
        related: &[CategoryRelation],
        filters: Option<&CategoryUpdate>,
    ) -> Result<Vec<Category>, RepositoryError> {
        let client = self.pool.get().await?;
        let fields = filters.map(|f| f.fields()).unwrap_or_default();
        select(&**client, &fields, related).await
    }

    async fn create(
        &self,
        data: &CategoryCreate,
        related: &[CategoryRelation],
    ) -> Result<Category, RepositoryError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO categories (name) VALUES ($1) RETURNING id",
                &[&data.name],
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
        data: &CategoryUpdate,
        related: &[CategoryRelation],
    ) -> Result<Option<Category>, RepositoryError> {
        let client = self.pool.get().await?;
        let fields = data.fields();
        if !fields.is_empty() {
            let mut params = Params::new();
            let set = set_clause(&fields, &mut params);
            let query = format!("UPDATE categories SET {set} WHERE id = {}", params.bind(id));
            if client.execute(query.as_str(), &params.as_refs()).await? == 0 {
                return Ok(None);
            }
        }
        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM categories WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}

#[async_trait]
impl CategoriesRepository for PgCategoriesRepository {
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1");
        let row = client.query_opt(query.as_str(), &[&name]).await?;
        Ok(row.as_ref().map(category_from_row))
    }
}
