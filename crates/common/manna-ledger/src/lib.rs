#![forbid(unsafe_code)]

//! Manna balances and upgrade purchases for the players of a Lancer campaign.
//!
//! [`Ledger`] is the only way to create or change a [`PlayerRecord`]; it owns a
//! [`PlayerStore`] and serialises writes to it behind a single lock.

pub mod error;
pub mod ledger;
pub mod metrics;
pub mod pricing;
pub mod record;
pub mod sled_store;
pub mod store;

pub use error::{LedgerError, StoreError};
pub use ledger::Ledger;
pub use pricing::PurchasePricing;
pub use record::{
    Category, ParsePlayerIdError, PlayerId, PlayerRecord, LICENCE_PRICE, MANNA_PER_LEVEL,
    TALENT_PRICE, TRAINING_PRICE, UPGRADE_CAP,
};
pub use sled_store::SledPlayerStore;
pub use store::{InMemoryPlayerStore, PlayerStore};
