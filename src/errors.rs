//! Typed error hierarchy for the task board.
//!
//! Two top-level enums cover the two surfaces:
//! - `RelocationError`: the relocation engine's caller-visible outcomes
//! - `BoardError`: card/board CRUD failures around it

use thiserror::Error;
use uuid::Uuid;

/// Errors from the relocation engine.
#[derive(Debug, Error)]
pub enum RelocationError {
    /// The card does not exist, or the actor may not touch the source or
    /// destination board. Callers cannot tell the two cases apart.
    #[error("Card {card_id} not found")]
    NotFound { card_id: Uuid },

    /// The store was busy or locked by a concurrent writer. Safe to retry.
    #[error("Relocation of card {card_id} conflicted with a concurrent write: {source}")]
    Conflict {
        card_id: Uuid,
        #[source]
        source: anyhow::Error,
    },

    #[error("Relocation failed: {0}")]
    Internal(#[source] anyhow::Error),
}

impl RelocationError {
    /// Classify a store failure: SQLite busy/locked anywhere in the chain is
    /// a `Conflict`, anything else is `Internal`.
    pub fn from_store(card_id: Uuid, err: anyhow::Error) -> Self {
        if is_contention(&err) {
            Self::Conflict { card_id, source: err }
        } else {
            Self::Internal(err)
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors from the card/board CRUD paths.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Environment {id} not found")]
    EnvironmentNotFound { id: Uuid },

    #[error("Board {id} not found")]
    BoardNotFound { id: Uuid },

    #[error("Card {id} not found")]
    CardNotFound { id: Uuid },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Relocation(#[from] RelocationError),

    #[error("Database error: {0}")]
    Database(#[source] anyhow::Error),
}

fn is_contention(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if matches!(
                    e.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    })
}
