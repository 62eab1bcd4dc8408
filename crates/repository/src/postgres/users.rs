use async_trait::async_trait;
use deadpool_postgres::Pool;
use model::{Field, PartialPayload, User, UserCreate, UserRelation, UserUpdate};
use tokio_postgres::GenericClient;

use super::{
    id_field, load_orders_of, set_clause, user_from_row, where_clause, Params, USER_COLUMNS,
};
use crate::{Repository, RepositoryError, UsersRepository};

/// PostgreSQL implementation of [`UsersRepository`].
pub struct PgUsersRepository {
    pool: Pool,
}

impl PgUsersRepository {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

async fn select<C: GenericClient + Sync>(
    client: &C,
    fields: &[Field],
    related: &[UserRelation],
) -> Result<Vec<User>, RepositoryError> {
    let mut params = Params::new();
    let query = format!(
        "SELECT {USER_COLUMNS} FROM users{} ORDER BY id",
        where_clause(fields, &mut params)
    );
    let rows = client.query(query.as_str(), &params.as_refs()).await?;
    let mut users = rows
        .iter()
        .map(user_from_row)
        .collect::<Result<Vec<_>, _>>()?;

    if related.contains(&UserRelation::Orders) {
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let mut orders = load_orders_of(client, &ids).await?;
        for user in &mut users {
            user.orders = Some(orders.remove(&user.id).unwrap_or_default());
        }
    }
    Ok(users)
}

#[async_trait]
impl Repository for PgUsersRepository {
    type Entity = User;
    type Create = UserCreate;
    type Update = UserUpdate;
    type Relation = UserRelation;

    async fn get(&self, id: i64, related: &[UserRelation]) -> Result<Option<User>, RepositoryError> {
        let client = self.pool.get().await?;
        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn get_all(
        &self,
        related: &[UserRelation],
        filters: Option<&UserUpdate>,
    ) -> Result<Vec<User>, RepositoryError> {
        let client = self.pool.get().await?;
        let fields = filters.map(|f| f.fields()).unwrap_or_default();
        select(&**client, &fields, related).await
    }

    async fn create(
        &self,
        data: &UserCreate,
        related: &[UserRelation],
    ) -> Result<User, RepositoryError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO users (id, role) VALUES ($1, $2)",
                &[&data.id, &data.role.as_str()],
            )
            .await?;
        select(&**client, &[id_field(data.id)], related)
            .await?
            .pop()
            .ok_or(RepositoryError::Vanished(data.id))
    }

    async fn update(
        &self,
        id: i64,
        data: &UserUpdate,
        related: &[UserRelation],
    ) -> Result<Option<User>, RepositoryError> {
        let client = self.pool.get().await?;
        let fields = data.fields();
        if !fields.is_empty() {
            let mut params = Params::new();
            let set = set_clause(&fields, &mut params);
            let query = format!("UPDATE users SET {set} WHERE id = {}", params.bind(id));
            if client.execute(query.as_str(), &params.as_refs()).await? == 0 {
                return Ok(None);
            }
        }
        Ok(select(&**client, &[id_field(id)], related).await?.pop())
    }

    async fn delete(&self, id: i64) -> Result<bool, RepositoryError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute("DELETE FROM users WHERE id = $1", &[&id])
            .await?;
        Ok(deleted > 0)
    }
}

impl UsersRepository for PgUsersRepository {}
