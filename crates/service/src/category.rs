use std::sync::Arc;

use async_trait::async_trait;
use model::{Category, CategoryCreate, CategoryRelation, CategorySchema, CategoryUpdate};
use repository::CategoriesRepository;

use crate::{convert, Service, ServiceError};

pub struct CategoryService {
    repo: Arc<dyn CategoriesRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoriesRepository>) -> Self {
        Self { repo }
    }

    async fn ensure_name_free(&self, name: &str, except: Option<i64>) -> Result<(), ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("Category name must not be empty".into()));
        }
        match self.repo.get_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => Err(ServiceError::Conflict(
                format!("Category '{name}' already exists"),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Service for CategoryService {
    type Entity = Category;
    type Create = CategoryCreate;
    type Update = CategoryUpdate;
    type Relation = CategoryRelation;
    type Schema = CategorySchema;
    type Repo = dyn CategoriesRepository;

    const NAME: &'static str = "category";

    fn repo(&self) -> &Self::Repo {
        self.repo.as_ref()
    }

    fn to_schema(entity: Category) -> CategorySchema {
        convert::category_schema(entity)
    }

    async fn validate_create(&self, data: &CategoryCreate) -> Result<(), ServiceError> {
        self.ensure_name_free(&data.name, None).await
    }

    async fn validate_update(
        &self,
        current: &Category,
        data: &CategoryUpdate,
    ) -> Result<(), ServiceError> {
        match &data.name {
            Some(name) => self.ensure_name_free(name, Some(current.id)).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repository::memory::MemoryStore;

    fn service() -> CategoryService {
        CategoryService::new(Arc::new(MemoryStore::new().categories()))
    }

    fn named(name: &str) -> CategoryCreate {
        CategoryCreate { name: name.into() }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let service = service();
        let created = service.create(&named("Кофе"), &[]).await.unwrap();
        let fetched = service
            .get(created.id, &[CategoryRelation::Positions])
            .await
            .unwrap();
        assert_eq!(fetched.name, "Кофе");
        assert_eq!(fetched.positions, Some(vec![]));
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict() {
        let service = service();
        service.create(&named("Чай"), &[]).await.unwrap();
        let err = service.create(&named("Чай"), &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_all_empty_is_ok() {
        assert!(service().get_all(&[], None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_category_is_not_found() {
        let service = service();
        assert!(matches!(
            service.get(7, &[]).await.unwrap_err(),
            ServiceError::NotFound { id: 7, .. }
        ));
        assert!(matches!(
            service.delete(7).await.unwrap_err(),
            ServiceError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_rename_to_own_name_is_allowed() {
        let service = service();
        let created = service.create(&named("Десерты"), &[]).await.unwrap();
        let update = CategoryUpdate {
            name: Some("Десерты".into()),
        };
        let updated = service.update(created.id, &update, &[]).await.unwrap();
        assert_eq!(updated.name, "Десерты");
    }
}
