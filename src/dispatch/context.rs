use std::sync::Arc;

use crate::ids::ProductIdGenerator;
use crate::storage::{Db, ProductStore, SqlProductRepository, SqlUserRepository, UserStore};

/// Dependencies injected into every handler call.
///
/// Handlers never open connections themselves; they go through the stores
/// held here, which makes them easy to run against mocks.
#[derive(Clone)]
pub struct ServiceContext {
    pub products: Arc<dyn ProductStore>,
    pub users: Arc<dyn UserStore>,
}

impl ServiceContext {
    pub fn new(products: Arc<dyn ProductStore>, users: Arc<dyn UserStore>) -> Self {
        Self { products, users }
    }

    /// SQL-backed stores sharing one pool and one ID generator.
    pub fn from_db(db: Db, ids: Arc<ProductIdGenerator>) -> Self {
        Self::new(
            Arc::new(SqlProductRepository::new(db.clone(), ids)),
            Arc::new(SqlUserRepository::new(db)),
        )
    }
}
