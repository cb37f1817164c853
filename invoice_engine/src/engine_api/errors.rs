use thiserror::Error;

use crate::{db_types::ValidationError, traits::LedgerError};

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    /// The ledger could not be read at all, so there is no state to reconcile against. Callers should ask for a
    /// retry.
    #[error("The invoice ledger is unavailable. {0}")]
    LedgerUnavailable(LedgerError),
    #[error("Invalid request. {0}")]
    Validation(#[from] ValidationError),
}
