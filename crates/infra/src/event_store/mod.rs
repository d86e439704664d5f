//! Append-only event store boundary.
//!
//! Every event is persisted here before any listener sees it. The store is keyed
//! by event id: saving an id that is already present is a no-op, so an event that
//! is redelivered upstream is still stored exactly once.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError};
