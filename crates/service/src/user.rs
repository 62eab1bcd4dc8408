use std::sync::Arc;

use async_trait::async_trait;
use model::{User, UserCreate, UserRelation, UserSchema, UserUpdate};
use repository::{Repository, UsersRepository};

use crate::{convert, Service, ServiceError};

pub struct UserService {
    repo: Arc<dyn UsersRepository>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UsersRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl Service for UserService {
    type Entity = User;
    type Create = UserCreate;
    type Update = UserUpdate;
    type Relation = UserRelation;
    type Schema = UserSchema;
    type Repo = dyn UsersRepository;

    const NAME: &'static str = "user";

    fn repo(&self) -> &Self::Repo {
        self.repo.as_ref()
    }

    fn to_schema(entity: User) -> UserSchema {
        convert::user_schema(entity)
    }

    async fn validate_create(&self, data: &UserCreate) -> Result<(), ServiceError> {
        if self.repo.get(data.id, &[]).await?.is_some() {
            return Err(ServiceError::Conflict(format!("User {} already exists", data.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Role;
    use repository::memory::MemoryStore;

    fn service() -> UserService {
        UserService::new(Arc::new(MemoryStore::new().users()))
    }

    #[tokio::test]
    async fn test_register_and_promote() {
        let service = service();
        let user = service
            .create(&UserCreate { id: 42, role: Role::Client }, &[UserRelation::Orders])
            .await
            .unwrap();
        assert_eq!(user.orders, Some(vec![]));

        let update = UserUpdate {
            role: Some(Role::Barista),
        };
        let promoted = service.update(42, &update, &[]).await.unwrap();
        assert_eq!(promoted.role, Role::Barista);
    }

    #[tokio::test]
    async fn test_existing_id_is_conflict() {
        let service = service();
        let data = UserCreate { id: 42, role: Role::Client };
        service.create(&data, &[]).await.unwrap();
        assert!(matches!(
            service.create(&data, &[]).await.unwrap_err(),
            ServiceError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_filter_by_role() {
        let service = service();
        service
            .create(&UserCreate { id: 1, role: Role::Client }, &[])
            .await
            .unwrap();
        service
            .create(&UserCreate { id: 2, role: Role::Barista }, &[])
            .await
            .unwrap();
        let baristas = service
            .get_all(&[], Some(&UserUpdate { role: Some(Role::Barista) }))
            .await
            .unwrap();
        assert_eq!(baristas.len(), 1);
        assert_eq!(baristas[0].id, 2);
    }

    #[tokio::test]
    async fn test_update_missing_user_is_not_found() {
        let err = service()
            .update(5, &UserUpdate::default(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { id: 5, .. }));
    }
}
