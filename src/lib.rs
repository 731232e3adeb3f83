//! DigiUrban: multi-tenant municipal administration data platform over PostgreSQL.

pub mod cache;
pub mod crud;
pub mod domains;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod model;
pub mod response;
pub mod routes;
pub mod schema;
pub mod services;
pub mod settings;
pub mod sql;
pub mod state;
pub mod storage;
pub mod store;
pub mod validation;

pub use crud::{DataContext, EntityCrud, RetryPolicy};
pub use error::{AppError, ConfigError, StoreError};
pub use migration::{ensure_database_exists, ensure_tables};
pub use response::{success_many, success_one, success_one_ok, success_page};
pub use routes::{app, common_routes, entity_routes, service_routes};
pub use settings::Settings;
pub use state::AppState;
pub use storage::{FileStorage, MemoryStorage, S3Storage};
pub use store::{Filters, MemoryStore, Order, PgStore, Query, Store};
