//! Plain data types stored in the `products` and `users` tables, plus the
//! DTOs used to create and change them.

pub mod product;
pub mod user;

pub use product::*;
pub use user::*;
