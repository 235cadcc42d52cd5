pub mod db;
pub mod memory;
pub mod models;
pub mod pg_store;
pub mod store;

pub use db::Db;
pub use memory::MemoryStore;
pub use pg_store::PgStore;
pub use store::SitemapStore;
