// ============================================================================
// Persistence Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Concurrency conflict on {entity} {id}: expected version {expected}")]
    VersionConflict {
        entity: &'static str,
        id: i64,
        expected: i64,
    },

    #[error("Cannot update {0} that has not been saved")]
    Unsaved(&'static str),

    #[error("Corrupt {entity} row: {reason}")]
    Corrupt { entity: &'static str, reason: String },

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Conflicts and exhausted pools go away on their own; everything else
    /// will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::VersionConflict { .. } => true,
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            StoreError::Database(sqlx::Error::Database(db)) => {
                // SQLITE_BUSY / SQLITE_LOCKED
                matches!(db.code().as_deref(), Some("5") | Some("6"))
            }
            _ => false,
        }
    }
}
