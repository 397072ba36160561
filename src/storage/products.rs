//! Product persistence.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::Db;
use crate::error::ServiceError;
use crate::ids::ProductIdGenerator;
use crate::model::{NewProduct, Product, ProductChanges};

const PRODUCT_COLUMNS: &str = "id, product_id, name, price, stock, description, category";

const PRODUCT_NOT_FOUND: &str = "product not found";
const PRODUCT_NAME_TAKEN: &str = "product with the same name already exists";

/// Product operations used by the request handlers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Looks a product up by its external `product_id`.
    async fn find_product_by_external_id(&self, product_id: &str) -> Result<Product, ServiceError>;

    /// All products in storage order.
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError>;

    /// Validates, assigns an external ID and inserts in one transaction.
    async fn create_product(&self, product: NewProduct) -> Result<Product, ServiceError>;

    /// Applies the meaningful values in `changes` to the product currently
    /// named `current_name`. Sentinels (zero price, negative stock, blank
    /// text) leave their field as stored.
    async fn update_product(
        &self,
        current_name: &str,
        changes: ProductChanges,
    ) -> Result<Product, ServiceError>;

    /// Deletes the product with that name and returns the removed row.
    async fn delete_product_by_name(&self, name: &str) -> Result<Product, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct SqlProductRepository {
    db: Db,
    ids: Arc<ProductIdGenerator>,
}

impl SqlProductRepository {
    pub fn new(db: Db, ids: Arc<ProductIdGenerator>) -> Self {
        Self { db, ids }
    }
}

fn select_by(column: &str) -> String {
    format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE {column} = ? LIMIT 1")
}

fn not_found() -> ServiceError {
    ServiceError::NotFound(PRODUCT_NOT_FOUND.to_string())
}

fn name_taken() -> ServiceError {
    ServiceError::Duplicate(PRODUCT_NAME_TAKEN.to_string())
}

#[async_trait]
impl ProductStore for SqlProductRepository {
    #[instrument(skip(self))]
    async fn find_product_by_external_id(&self, product_id: &str) -> Result<Product, ServiceError> {
        let product: Product = sqlx::query_as(&select_by("product_id"))
            .bind(product_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(not_found)?;
        debug!(id = product.id, "Product found");
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, ServiceError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id");
        let products: Vec<Product> = sqlx::query_as(&sql).fetch_all(self.db.pool()).await?;
        debug!(count = products.len(), "Products listed");
        Ok(products)
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    async fn create_product(&self, product: NewProduct) -> Result<Product, ServiceError> {
        product.validate()?;

        let existing: Option<Product> = sqlx::query_as(&select_by("name"))
            .bind(&product.name)
            .fetch_optional(self.db.pool())
            .await?;
        if existing.is_some() {
            debug!("Product name taken");
            return Err(name_taken());
        }

        let row = product.into_product(self.ids.generate());

        let mut tx = self.db.begin().await?;
        let sql = format!(
            "INSERT INTO products (product_id, name, price, stock, description, category) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {PRODUCT_COLUMNS}"
        );
        let created: Product = sqlx::query_as(&sql)
            .bind(&row.product_id)
            .bind(&row.name)
            .bind(row.price)
            .bind(row.stock)
            .bind(&row.description)
            .bind(&row.category)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| ServiceError::from_sqlx(e, PRODUCT_NOT_FOUND, PRODUCT_NAME_TAKEN))?;
        tx.commit().await?;

        info!(id = created.id, product_id = %created.product_id, "Product created");
        Ok(created)
    }

    #[instrument(skip(self, changes))]
    async fn update_product(
        &self,
        current_name: &str,
        changes: ProductChanges,
    ) -> Result<Product, ServiceError> {
        let changes = changes.meaningful();

        let mut tx = self.db.begin().await?;

        let mut product: Product = sqlx::query_as(&select_by("name"))
            .bind(current_name)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(not_found)?;

        if let Some(new_name) = changes.name.as_deref() {
            if new_name != product.name {
                let taken: Option<Product> = sqlx::query_as(&select_by("name"))
                    .bind(new_name)
                    .fetch_optional(&mut *tx)
                    .await?;
                if taken.is_some() {
                    return Err(name_taken());
                }
            }
        }

        changes.apply(&mut product);

        sqlx::query(
            "UPDATE products SET name = ?, price = ?, stock = ?, description = ?, category = ? \
             WHERE id = ?",
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ServiceError::from_sqlx(e, PRODUCT_NOT_FOUND, PRODUCT_NAME_TAKEN))?;

        tx.commit().await?;

        info!(id = product.id, "Product updated");
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn delete_product_by_name(&self, name: &str) -> Result<Product, ServiceError> {
        let mut tx = self.db.begin().await?;

        let product: Product = sqlx::query_as(&select_by("name"))
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(not_found)?;

        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(product.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(id = product.id, "Product deleted");
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::is_product_id;

    async fn repository() -> SqlProductRepository {
        let db = Db::in_memory().await.unwrap();
        SqlProductRepository::new(db, Arc::new(ProductIdGenerator::with_seed(3)))
    }

    fn widget() -> NewProduct {
        NewProduct {
            name: "Widget".to_string(),
            price: 10,
            stock: 5,
            description: "A widget".to_string(),
            category: "tools".to_string(),
        }
    }

    async fn count(repo: &SqlProductRepository) -> usize {
        repo.list_products().await.unwrap().len()
    }

    #[tokio::test]
    async fn test_create_assigns_ids() {
        let repo = repository().await;
        let created = repo.create_product(widget()).await.unwrap();

        assert!(created.id > 0);
        assert!(is_product_id(&created.product_id));
        assert_eq!(created.name, "Widget");
        assert_eq!(created.stock, 5);
    }

    #[tokio::test]
    async fn test_find_by_external_id() {
        let repo = repository().await;
        let created = repo.create_product(widget()).await.unwrap();

        let found = repo
            .find_product_by_external_id(&created.product_id)
            .await
            .unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_find_unknown_external_id() {
        let repo = repository().await;
        let err = repo
            .find_product_by_external_id("product-1-1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), PRODUCT_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let repo = repository().await;
        repo.create_product(widget()).await.unwrap();

        let err = repo.create_product(widget()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(_)));
        assert_eq!(count(&repo).await, 1);
    }

    #[tokio::test]
    async fn test_invalid_product_is_not_stored() {
        let repo = repository().await;
        let err = repo
            .create_product(NewProduct { price: 0, ..widget() })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(count(&repo).await, 0);
    }

    #[tokio::test]
    async fn test_update_changes_only_present_fields() {
        let repo = repository().await;
        let created = repo.create_product(widget()).await.unwrap();

        let changes = ProductChanges {
            name: Some("Gadget".to_string()),
            stock: Some(0),
            ..ProductChanges::default()
        };
        let updated = repo.update_product("Widget", changes).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.product_id, created.product_id);
        assert_eq!(updated.name, "Gadget");
        assert_eq!(updated.stock, 0);
        assert_eq!(updated.price, 10);

        let stored = repo
            .find_product_by_external_id(&created.product_id)
            .await
            .unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_update_ignores_sentinel_values() {
        let repo = repository().await;
        repo.create_product(widget()).await.unwrap();

        let changes = ProductChanges {
            name: Some("Gadget".to_string()),
            price: Some(0),
            stock: Some(-4),
            description: Some(" ".to_string()),
            category: Some("toys".to_string()),
        };
        let updated = repo.update_product("Widget", changes).await.unwrap();

        assert_eq!(updated.name, "Gadget");
        assert_eq!(updated.price, 10);
        assert_eq!(updated.stock, 5);
        assert_eq!(updated.description, "A widget");
        assert_eq!(updated.category, "toys");
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let repo = repository().await;
        let err = repo
            .update_product("Nope", ProductChanges::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_leaves_both_rows() {
        let repo = repository().await;
        repo.create_product(widget()).await.unwrap();
        repo.create_product(NewProduct {
            name: "Gadget".to_string(),
            ..widget()
        })
        .await
        .unwrap();

        let changes = ProductChanges {
            name: Some("Gadget".to_string()),
            price: Some(99),
            ..ProductChanges::default()
        };
        let err = repo.update_product("Widget", changes).await.unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(_)));

        let products = repo.list_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert!(products.iter().all(|p| p.price == 10));
    }

    #[tokio::test]
    async fn test_delete_returns_removed_row() {
        let repo = repository().await;
        let created = repo.create_product(widget()).await.unwrap();

        let deleted = repo.delete_product_by_name("Widget").await.unwrap();
        assert_eq!(deleted, created);
        assert_eq!(count(&repo).await, 0);

        let err = repo.delete_product_by_name("Widget").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_only_that_product() {
        let repo = repository().await;
        repo.create_product(widget()).await.unwrap();
        let gadget = repo
            .create_product(NewProduct {
                name: "Gadget".to_string(),
                price: 25,
                ..widget()
            })
            .await
            .unwrap();

        repo.delete_product_by_name("Widget").await.unwrap();

        assert_eq!(repo.list_products().await.unwrap(), vec![gadget.clone()]);
        let stored = repo
            .find_product_by_external_id(&gadget.product_id)
            .await
            .unwrap();
        assert_eq!(stored, gadget);
    }
}
