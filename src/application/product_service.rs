use std::sync::Arc;

use uuid::Uuid;

use crate::domain::product::{
    Product, ProductCreated, ProductDeleted, ProductError, ProductEvent, ProductUpdated,
};
use crate::metrics::Metrics;
use crate::persistence::{ProductRepository, StoreError, UnitOfWork, UnitOfWorkFactory};
use crate::utils::RetryConfig;

use super::{execute, publish, ProductCreate, ProductUpdate, ProductView, ServiceError};

// ============================================================================
// Product Service
// ============================================================================

pub struct ProductService<F: UnitOfWorkFactory> {
    store: Arc<F>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl<F: UnitOfWorkFactory> ProductService<F> {
    pub fn new(store: Arc<F>, metrics: Arc<Metrics>, retry: RetryConfig) -> Self {
        Self { store, metrics, retry }
    }

    pub async fn create_product(&self, input: &ProductCreate) -> Result<ProductView, ServiceError> {
        execute(&self.metrics, &self.retry, "create_product", move |_| self.try_create(input)).await
    }

    pub async fn get_product(&self, id: i64) -> Result<ProductView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let product = uow
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::product_not_found(id))?;
        Ok(ProductView::from(&product))
    }

    pub async fn list_products(&self, skip: i64, limit: i64) -> Result<Vec<ProductView>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let products = uow.list_products(skip, limit).await?;
        Ok(products.iter().map(ProductView::from).collect())
    }

    /// Apply every present field of `input`, all or nothing.
    pub async fn update_product(&self, id: i64, input: &ProductUpdate) -> Result<ProductView, ServiceError> {
        execute(&self.metrics, &self.retry, "update_product", move |_| self.try_update(id, input)).await
    }

    pub async fn delete_product(&self, id: i64) -> Result<(), ServiceError> {
        execute(&self.metrics, &self.retry, "delete_product", move |_| self.try_delete(id)).await
    }

    pub async fn search_products(&self, name: &str) -> Result<Vec<ProductView>, ServiceError> {
        let mut uow = self.store.begin().await?;
        let products = uow.find_products_by_name(name).await?;
        Ok(products.iter().map(ProductView::from).collect())
    }

    pub async fn filter_by_price(&self, min: f64, max: f64) -> Result<Vec<ProductView>, ServiceError> {
        if min > max {
            return Ok(Vec::new());
        }
        let mut uow = self.store.begin().await?;
        let products = uow.filter_products_by_price(min, max).await?;
        Ok(products.iter().map(ProductView::from).collect())
    }

    // ========================================================================
    // Units of work
    // ========================================================================

    async fn try_create(&self, input: &ProductCreate) -> Result<ProductView, ServiceError> {
        let product = Product::new(input.name.clone(), input.price, input.quantity)?;

        let mut uow = self.store.begin().await?;
        let product = uow.add_product(product).await?;
        let id = product.id.ok_or(StoreError::Unsaved("Product"))?;

        publish(
            &mut uow,
            id,
            ProductEvent::Created(ProductCreated {
                name: product.name().to_string(),
                price: product.price(),
                quantity: product.quantity(),
            }),
            Uuid::new_v4(),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(product_id = id, name = %product.name(), "Product created");
        Ok(ProductView::from(&product))
    }

    async fn try_update(&self, id: i64, input: &ProductUpdate) -> Result<ProductView, ServiceError> {
        let mut uow = self.store.begin().await?;
        let mut product = uow
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::product_not_found(id))?;

        if let Some(name) = &input.name {
            product.rename(name.clone())?;
        }
        if let Some(price) = input.price {
            if price != product.price() {
                product.update_price(price)?;
            }
        }
        if let Some(target) = input.quantity {
            set_stock_level(&mut product, target)?;
        }

        uow.update_product(&mut product).await?;
        publish(
            &mut uow,
            id,
            ProductEvent::Updated(ProductUpdated {
                name: product.name().to_string(),
                price: product.price(),
                quantity: product.quantity(),
            }),
            Uuid::new_v4(),
        )
        .await?;
        uow.commit().await?;

        tracing::info!(product_id = id, version = product.version(), "Product updated");
        Ok(ProductView::from(&product))
    }

    async fn try_delete(&self, id: i64) -> Result<(), ServiceError> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_product(id).await? {
            return Err(ServiceError::product_not_found(id));
        }

        publish(&mut uow, id, ProductEvent::Deleted(ProductDeleted {}), Uuid::new_v4()).await?;
        uow.commit().await?;

        tracing::info!(product_id = id, "Product deleted");
        Ok(())
    }
}

/// Move stock to `target` through the regular add/remove rules.
fn set_stock_level(product: &mut Product, target: i64) -> Result<(), ProductError> {
    if target < 0 {
        return Err(ProductError::NegativeQuantity(target));
    }
    let diff = target - product.quantity();
    match diff {
        d if d > 0 => product.add_stock(d),
        d if d < 0 => product.remove_stock(-d),
        _ => Ok(()),
    }
}
