use crate::record::{Category, PlayerId};
use thiserror::Error;

/// Failures of the backing document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Sled I/O error: {0}")]
    Io(#[from] sled::Error),

    #[error("Record encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Stored record for player {id} is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Error types returned by ledger operations.
///
/// The rule violations (`CapReached`, `InsufficientFunds`) display the text
/// shown to players.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No record for player {0}")]
    NotFound(PlayerId),

    #[error("Player {0} already has a record")]
    AlreadyExists(PlayerId),

    #[error("You may only buy 12 of each upgrade.")]
    CapReached { category: Category },

    #[error("You don't have sufficient manna.")]
    InsufficientFunds {
        category: Category,
        price: u64,
        available: u64,
    },

    #[error("Granting {amount} manna to player {id} would overflow their total")]
    GrantOverflow { id: PlayerId, amount: u64 },

    #[error("Invalid player record: {0}")]
    InvalidRecord(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Ledger write lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    /// True for errors caused by a player's request rather than the system.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::NotFound(_)
                | LedgerError::AlreadyExists(_)
                | LedgerError::CapReached { .. }
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::GrantOverflow { .. }
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::NotFound(_) => "not_found",
            LedgerError::AlreadyExists(_) => "already_exists",
            LedgerError::CapReached { .. } => "cap_reached",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::GrantOverflow { .. } => "grant_overflow",
            LedgerError::InvalidRecord(_) => "invalid_record",
            LedgerError::Store(_) => "store",
            LedgerError::LockPoisoned => "lock_poisoned",
        }
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
