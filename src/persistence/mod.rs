// ============================================================================
// Persistence Layer
// ============================================================================
//
// Repository traits plus the unit of work that groups them into one
// transaction. Two interchangeable backends:
// - memory  - keyed maps behind an async mutex
// - sqlite  - sqlx transactions with optimistic versioning
//
// ============================================================================

mod errors;
mod memory;
mod repository;
mod sqlite;

pub use errors::StoreError;
pub use memory::{InMemoryStore, InMemoryUnitOfWork};
pub use repository::{
    OrderRepository, OutboxRepository, ProductRepository, UnitOfWork, UnitOfWorkFactory,
};
pub use sqlite::{SqliteStore, SqliteUnitOfWork};
