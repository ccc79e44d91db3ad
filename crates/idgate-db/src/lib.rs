//! idgate Database: SurrealDB connection management, schema migrations
//! and repository implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Repository implementations of the `idgate-core` traits
//! - Client-side transactions ([`SurrealTransaction`])

mod connection;
mod error;
pub mod repository;
mod schema;
mod transaction;

pub use connection::{DbConfig, DbManager, Repositories};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
pub use transaction::SurrealTransaction;
