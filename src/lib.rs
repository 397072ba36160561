//! # Product Service
//!
//! > **A message-driven product and user service.**
//!
//! Requests arrive on a queue as JSON envelopes `{pattern, data, id}`. Each
//! one is routed by `pattern` to a typed handler, runs against SQLite inside
//! a scoped transaction, and is answered with exactly one
//! `{success, message, data}` envelope published to the request's reply
//! queue under its correlation ID.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One consumer, one request at a time
//! The consumer works like an actor: it owns its receiver and handles
//! deliveries sequentially. No request observes another half-done, and every
//! delivery is acked exactly once whatever happens to it.
//!
//! ### Typed handlers behind a string router
//! Each pattern is a [`Handler`](dispatch::Handler) with its own `Request` and
//! `Reply` types. The router stores them erased and does the JSON plumbing
//! once: an unknown pattern, a payload of the wrong shape or a failed
//! operation all turn into an `error` envelope instead of a crash.
//!
//! ### Storage behind traits
//! Handlers only see [`ProductStore`](storage::ProductStore) and
//! [`UserStore`](storage::UserStore). The SQL repositories implement them for
//! real; `mockall` mocks implement them in unit tests.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Data ([`model`], [`ids`], [`error`])
//! - Products, users, validation rules and the external product ID format.
//! - [`ServiceError`](error::ServiceError) covers every per-request failure.
//!
//! ### 2. Persistence ([`storage`])
//! - [`Db`](storage::Db) wraps the pool; the `Sql*Repository` types run every
//!   write in a transaction that commits only on success.
//!
//! ### 3. The Wire ([`protocol`], [`transport`])
//! - Request and response envelopes.
//! - The broker boundary: [`Delivery`](transport::Delivery),
//!   [`Publisher`](transport::Publisher), an in-process broker and a mock.
//!
//! ### 4. The Engine ([`dispatch`], [`handlers`], [`consumer`])
//! - Pattern routing, the ten request handlers, and the message loop.
//!
//! ### 5. The Orchestrator ([`lifecycle`], [`config`])
//! - [`ProductService`](lifecycle::ProductService) wires everything together
//!   and shuts it down cleanly; [`setup_tracing`](lifecycle::setup_tracing)
//!   initializes logging.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Create the tables and serve newline-delimited requests from stdin
//! INIT_SCHEMA=true cargo run
//! {"pattern":"CREATE_USER","data":{"username":"alice"}}
//! ```
//!
//! ### Running Tests
//!
//! ```bash
//! cargo test
//! ```

pub mod config;
pub mod consumer;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod ids;
pub mod lifecycle;
pub mod model;
pub mod protocol;
pub mod storage;
pub mod transport;
