//! The request patterns this service answers.
//!
//! | pattern          | payload                                   | reply data        |
//! |------------------|-------------------------------------------|-------------------|
//! | `GET_PRODUCT`    | external ID as a JSON string              | product           |
//! | `FIND_ALL`       | ignored                                   | list of products  |
//! | `EDIT_PRODUCT`   | `{product, newNameProduct?, newPrice?, …}`| updated product   |
//! | `CREATE_PRODUCT` | `{name, price, stock, description, category}` | created product |
//! | `DELETE_PRODUCT` | `{name}`                                  | deleted product   |
//! | `GET_USERBYNAME` | `{username}`                              | user or `null`    |
//! | `GET_USERS`      | ignored                                   | list of users     |
//! | `EDIT_USER`      | `{currentUsername, newUsername}`          | `null`            |
//! | `CREATE_USER`    | `{username}`                              | created user      |
//! | `DELETE_USER`    | `{username}`                              | `null`            |

pub mod products;
pub mod users;

pub use products::*;
pub use users::*;

use crate::dispatch::{Handler, Router, RouterError};

/// Patterns the service must be able to answer. Startup fails without them.
pub const REQUIRED_PATTERNS: &[&str] = &[
    GetProduct::PATTERN,
    FindAllProducts::PATTERN,
    EditProduct::PATTERN,
    CreateProduct::PATTERN,
    DeleteProduct::PATTERN,
    GetUserByName::PATTERN,
    GetUsers::PATTERN,
    EditUser::PATTERN,
    CreateUser::PATTERN,
    DeleteUser::PATTERN,
];

/// A router with every product and user handler registered.
///
/// # Errors
/// Returns a [`RouterError`] if registration is inconsistent.
pub fn default_router() -> Result<Router, RouterError> {
    Router::builder()
        .route(GetProduct)?
        .route(FindAllProducts)?
        .route(EditProduct)?
        .route(CreateProduct)?
        .route(DeleteProduct)?
        .route(GetUserByName)?
        .route(GetUsers)?
        .route(EditUser)?
        .route(CreateUser)?
        .route(DeleteUser)?
        .build_validated(REQUIRED_PATTERNS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_router_serves_every_required_pattern() {
        let router = default_router().unwrap();
        assert_eq!(router.patterns().len(), REQUIRED_PATTERNS.len());
        for pattern in REQUIRED_PATTERNS {
            assert!(router.contains(pattern), "missing {pattern}");
        }
    }
}
