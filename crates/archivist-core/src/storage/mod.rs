pub mod lock;
pub mod models;
pub mod queries;
pub mod sqlite;

pub use lock::CatalogLock;
pub use sqlite::Database;
