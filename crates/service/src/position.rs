use std::sync::Arc;

use async_trait::async_trait;
use model::{
    Position, PositionCreate, PositionRelation, PositionSchema, PositionUpdate, MAX_PRICE,
    MAX_WEIGHT,
};
use repository::{CategoriesRepository, PositionsRepository, Repository};

use crate::{convert, Service, ServiceError};

pub struct PositionService {
    repo: Arc<dyn PositionsRepository>,
    categories: Arc<dyn CategoriesRepository>,
}

impl PositionService {
    pub fn new(
        repo: Arc<dyn PositionsRepository>,
        categories: Arc<dyn CategoriesRepository>,
    ) -> Self {
        Self { repo, categories }
    }

    async fn ensure_category(&self, category_id: i64) -> Result<(), ServiceError> {
        if self.categories.get(category_id, &[]).await?.is_none() {
            return Err(ServiceError::Validation(format!(
                "Category {category_id} does not exist"
            )));
        }
        Ok(())
    }

    /// `except` is the position being renamed, which may keep its name.
    async fn ensure_name_free(&self, name: &str, except: Option<i64>) -> Result<(), ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation("Position name must not be empty".into()));
        }
        match self.repo.get_by_name(name).await? {
            Some(existing) if Some(existing.id) != except => Err(ServiceError::Conflict(
                format!("Position '{name}' already exists"),
            )),
            _ => Ok(()),
        }
    }
}

fn check_weight_and_price(weight: Option<i32>, price: Option<i32>) -> Result<(), ServiceError> {
    if weight.is_some_and(|w| !(1..=MAX_WEIGHT).contains(&w)) {
        return Err(ServiceError::Validation(format!(
            "Weight must be between 1 and {MAX_WEIGHT} grams"
        )));
    }
    if price.is_some_and(|p| !(0..=MAX_PRICE).contains(&p)) {
        return Err(ServiceError::Validation(format!(
            "Price must be between 0 and {MAX_PRICE}"
        )));
    }
    Ok(())
}

#[async_trait]
impl Service for PositionService {
    type Entity = Position;
    type Create = PositionCreate;
    type Update = PositionUpdate;
    type Relation = PositionRelation;
    type Schema = PositionSchema;
    type Repo = dyn PositionsRepository;

    const NAME: &'static str = "position";

    fn repo(&self) -> &Self::Repo {
        self.repo.as_ref()
    }

    fn to_schema(entity: Position) -> PositionSchema {
        convert::position_schema(entity)
    }

    async fn validate_create(&self, data: &PositionCreate) -> Result<(), ServiceError> {
        check_weight_and_price(Some(data.weight), Some(data.price))?;
        self.ensure_category(data.category_id).await?;
        self.ensure_name_free(&data.name, None).await
    }

    async fn validate_update(
        &self,
        current: &Position,
        data: &PositionUpdate,
    ) -> Result<(), ServiceError> {
        check_weight_and_price(data.weight, data.price)?;
        if let Some(category_id) = data.category_id {
            self.ensure_category(category_id).await?;
        }
        if let Some(name) = &data.name {
            self.ensure_name_free(name, Some(current.id)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::CategoryCreate;
    use repository::memory::MemoryStore;

    async fn setup() -> (PositionService, i64) {
        let store = MemoryStore::new();
        let coffee = store
            .categories()
            .create(&CategoryCreate { name: "Кофе".into() }, &[])
            .await
            .unwrap();
        let service = PositionService::new(Arc::new(store.positions()), Arc::new(store.categories()));
        (service, coffee.id)
    }

    fn latte(category_id: i64) -> PositionCreate {
        PositionCreate {
            name: "Латте".into(),
            category_id,
            weight: 300,
            price: 180,
        }
    }

    #[tokio::test]
    async fn test_create_with_category() {
        let (service, coffee) = setup().await;
        let created = service
            .create(&latte(coffee), &[PositionRelation::Category])
            .await
            .unwrap();
        assert_eq!(created.category.unwrap().name, "Кофе");
    }

    #[tokio::test]
    async fn test_unknown_category_is_rejected() {
        let (service, coffee) = setup().await;
        let err = service.create(&latte(coffee + 1), &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_name_taken_by_another_position() {
        let (service, coffee) = setup().await;
        service.create(&latte(coffee), &[]).await.unwrap();
        let mocha = service
            .create(
                &PositionCreate {
                    name: "Мокко".into(),
                    ..latte(coffee)
                },
                &[],
            )
            .await
            .unwrap();

        let rename = PositionUpdate {
            name: Some("Латте".into()),
            ..PositionUpdate::default()
        };
        let err = service.update(mocha.id, &rename, &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_partial_update_keeps_other_fields() {
        let (service, coffee) = setup().await;
        let created = service.create(&latte(coffee), &[]).await.unwrap();
        let update = PositionUpdate {
            price: Some(200),
            ..PositionUpdate::default()
        };
        let updated = service.update(created.id, &update, &[]).await.unwrap();
        assert_eq!(updated.price, 200);
        assert_eq!(updated.weight, 300);
        assert_eq!(updated.name, "Латте");
    }

    #[tokio::test]
    async fn test_empty_update_returns_current_record() {
        let (service, coffee) = setup().await;
        let created = service.create(&latte(coffee), &[]).await.unwrap();
        let same = service
            .update(created.id, &PositionUpdate::default(), &[])
            .await
            .unwrap();
        assert_eq!(same, created);
    }

    #[tokio::test]
    async fn test_rejects_values_above_limits() {
        let (service, coffee) = setup().await;
        for data in [
            PositionCreate {
                price: 2_000_000_000,
                ..latte(coffee)
            },
            PositionCreate {
                weight: MAX_WEIGHT + 1,
                ..latte(coffee)
            },
        ] {
            let err = service.create(&data, &[]).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{err}");
        }
        assert!(service.get_all(&[], None).await.unwrap().is_empty());

        let created = service.create(&latte(coffee), &[]).await.unwrap();
        let update = PositionUpdate {
            price: Some(MAX_PRICE + 1),
            ..PositionUpdate::default()
        };
        assert!(matches!(
            service.update(created.id, &update, &[]).await.unwrap_err(),
            ServiceError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_rejects_zero_weight() {
        let (service, coffee) = setup().await;
        let err = service
            .create(
                &PositionCreate {
                    weight: 0,
                    ..latte(coffee)
                },
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
