use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// A product row from the `products` table.
///
/// `id` is the storage-assigned key. `product_id` is the external identifier
/// handed out by [`ProductIdGenerator`](crate::ids::ProductIdGenerator) and is
/// what callers use for lookups. `name` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub product_id: String,
    pub name: String,
    pub price: i64,
    pub stock: i64,
    pub description: String,
    pub category: String,
}

/// Payload for creating a new product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub price: i64,
    pub stock: i64,
    pub description: String,
    pub category: String,
}

impl NewProduct {
    /// Checks the creation rules.
    ///
    /// # Errors
    /// Returns [`ServiceError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ServiceError> {
        require_text("name", &self.name)?;
        require_price(self.price)?;
        require_stock(self.stock)?;
        require_text("description", &self.description)?;
        require_text("category", &self.category)?;
        Ok(())
    }

    /// Builds the row that will be inserted, minus the storage key.
    pub fn into_product(self, product_id: String) -> Product {
        Product {
            id: 0,
            product_id,
            name: self.name,
            price: self.price,
            stock: self.stock,
            description: self.description,
            category: self.category,
        }
    }
}

/// Partial update for a product. `None` leaves a field unchanged.
///
/// Callers may send a full record with zeroed or blank fields. Only
/// meaningful values survive [`ProductChanges::meaningful`]: non-blank text,
/// a price above zero, and a stock of zero or more.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub stock: Option<i64>,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl ProductChanges {
    /// Drops every value that means "leave unchanged".
    pub fn meaningful(self) -> Self {
        Self {
            name: self.name.filter(|text| !is_blank(text)),
            price: self.price.filter(|price| *price > 0),
            stock: self.stock.filter(|stock| *stock >= 0),
            description: self.description.filter(|text| !is_blank(text)),
            category: self.category.filter(|text| !is_blank(text)),
        }
    }

    /// Writes every present field onto `product`.
    pub fn apply(self, product: &mut Product) {
        if let Some(name) = self.name {
            product.name = name;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(category) = self.category {
            product.category = category;
        }
    }
}

/// Empty or whitespace-only text.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn require_text(field: &str, value: &str) -> Result<(), ServiceError> {
    if is_blank(value) {
        return Err(ServiceError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn require_price(price: i64) -> Result<(), ServiceError> {
    if price <= 0 {
        return Err(ServiceError::Validation(
            "price must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn require_stock(stock: i64) -> Result<(), ServiceError> {
    if stock < 0 {
        return Err(ServiceError::Validation("stock cannot be negative".to_string()));
    }
    Ok(())
}
