//! Persistence implementations for CloudWarden.
//!
//! Both backends implement `cloudwarden_core::PersistQueueStore` with the
//! same semantics; the tests below run one behaviour suite against each.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;
