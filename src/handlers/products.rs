//! Product patterns.

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::dispatch::{Handler, ServiceContext};
use crate::error::ServiceError;
use crate::model::{is_blank, NewProduct, Product, ProductChanges};

/// `GET_PRODUCT`: the payload is the external ID as a bare JSON string.
pub struct GetProduct;

#[async_trait]
impl Handler for GetProduct {
    const PATTERN: &'static str = "GET_PRODUCT";
    const SUCCESS_MESSAGE: &'static str = "Product retrieved";
    const ERROR_MESSAGE: &'static str = "Error getting product";
    const DECODE_ERROR_MESSAGE: &'static str = "Error parsing request data";
    type Request = String;
    type Reply = Product;

    async fn handle(&self, product_id: String, ctx: &ServiceContext) -> Result<Product, ServiceError> {
        ctx.products.find_product_by_external_id(&product_id).await
    }
}

/// `FIND_ALL`: lists every product. The payload is ignored.
pub struct FindAllProducts;

#[async_trait]
impl Handler for FindAllProducts {
    const PATTERN: &'static str = "FIND_ALL";
    const SUCCESS_MESSAGE: &'static str = "Products retrieved";
    const ERROR_MESSAGE: &'static str = "Error getting products";
    type Request = IgnoredAny;
    type Reply = Vec<Product>;

    async fn handle(&self, _: IgnoredAny, ctx: &ServiceContext) -> Result<Vec<Product>, ServiceError> {
        ctx.products.list_products().await
    }
}

/// `EDIT_PRODUCT` payload.
///
/// Every `new*` field is optional. Absent, `null`, blank text, a price of
/// zero or less and a negative stock all mean "leave unchanged" (see
/// [`ProductChanges::meaningful`]). Older callers spell the rename field
/// `newnameProduct`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditProductRequest {
    pub product: String,
    #[serde(default, alias = "newnameProduct")]
    pub new_name_product: Option<String>,
    #[serde(default)]
    pub new_price: Option<i64>,
    #[serde(default)]
    pub new_stock: Option<i64>,
    #[serde(default)]
    pub new_description: Option<String>,
    #[serde(default)]
    pub new_category: Option<String>,
}

impl EditProductRequest {
    pub fn into_changes(self) -> (String, ProductChanges) {
        let changes = ProductChanges {
            name: self.new_name_product,
            price: self.new_price,
            stock: self.new_stock,
            description: self.new_description,
            category: self.new_category,
        };
        (self.product, changes)
    }
}

const UPDATE_DTO_KEY: &str = "updateDTO";

/// Accepts the edit either bare or wrapped as `{"updateDTO": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditProductPayload {
    Wrapped(EditProductRequest),
    Bare(EditProductRequest),
}

impl EditProductPayload {
    pub fn into_inner(self) -> EditProductRequest {
        match self {
            Self::Wrapped(update) | Self::Bare(update) => update,
        }
    }
}

// Picks the shape by the wrapper key so a bad field reports its own error.
impl<'de> Deserialize<'de> for EditProductPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let decoded = match value.get_mut(UPDATE_DTO_KEY).map(Value::take) {
            Some(update) => serde_json::from_value(update).map(Self::Wrapped),
            None => serde_json::from_value(value).map(Self::Bare),
        };
        decoded.map_err(serde::de::Error::custom)
    }
}

pub struct EditProduct;

#[async_trait]
impl Handler for EditProduct {
    const PATTERN: &'static str = "EDIT_PRODUCT";
    const SUCCESS_MESSAGE: &'static str = "Product updated";
    const ERROR_MESSAGE: &'static str = "Error updating product";
    type Request = EditProductPayload;
    type Reply = Product;

    async fn handle(&self, payload: EditProductPayload, ctx: &ServiceContext) -> Result<Product, ServiceError> {
        let (current_name, changes) = payload.into_inner().into_changes();
        if is_blank(&current_name) {
            return Err(ServiceError::Validation("product cannot be empty".to_string()));
        }
        ctx.products.update_product(&current_name, changes).await
    }
}

pub struct CreateProduct;

#[async_trait]
impl Handler for CreateProduct {
    const PATTERN: &'static str = "CREATE_PRODUCT";
    const SUCCESS_MESSAGE: &'static str = "Product created";
    const ERROR_MESSAGE: &'static str = "Error creating product";
    type Request = NewProduct;
    type Reply = Product;

    async fn handle(&self, product: NewProduct, ctx: &ServiceContext) -> Result<Product, ServiceError> {
        ctx.products.create_product(product).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteProductRequest {
    pub name: String,
}

/// `DELETE_PRODUCT`: replies with the row that was removed.
pub struct DeleteProduct;

#[async_trait]
impl Handler for DeleteProduct {
    const PATTERN: &'static str = "DELETE_PRODUCT";
    const SUCCESS_MESSAGE: &'static str = "Product deleted";
    const ERROR_MESSAGE: &'static str = "Error Deleting product";
    type Request = DeleteProductRequest;
    type Reply = Product;

    async fn handle(&self, request: DeleteProductRequest, ctx: &ServiceContext) -> Result<Product, ServiceError> {
        ctx.products.delete_product_by_name(&request.name).await
    }
}
