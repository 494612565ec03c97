//! Credit Ledger.
//!
//! Users hold prepaid usage rights in [`CreditPack`]s. Six resource types are counted
//! independently (four interview types, aptitude and coding). Balances are never stored: they are
//! recomputed from the live packs on every read, so the pack rows stay the single source of truth.
//!
//! # Modules
//!
//! - [`plans`]: the closed plan catalog and its allocation rules
//! - [`packs`]: pack, usage log and balance types
//! - [`store`]: the [`PackStore`](store::PackStore) persistence trait and its implementations
//! - `ledger`: [`CreditLedger`], the only writer of packs
//!
//! # Deduction
//!
//! [`CreditLedger::deduct`] picks the first live pack with a remaining credit according to the
//! configured [`DrawOrder`] and asks the store to consume it with a single conditional update. A
//! lost race against a concurrent deduction shows up as a refused consume, and the ledger moves
//! on to the next candidate pack.

use thiserror::Error;

use crate::db::errors::DbError;

mod ledger;
pub mod packs;
pub mod plans;
pub mod store;

pub use ledger::{CreditLedger, DEFAULT_HISTORY_LIMIT, DrawOrder, MAX_HISTORY_LIMIT, default_validity};
pub use packs::{Balance, CreditCounts, CreditPack, Currency, PackStatus, PaymentReferences, ResourceType, UsageLog, UsageRecord};
pub use plans::{PlanConfig, PlanTier};

#[derive(Error, Debug)]
pub enum LedgerError {
    /// No live pack holds a remaining credit of this type. Recoverable by purchasing more.
    #[error("No {resource_type} credits remaining")]
    InsufficientCredits { resource_type: ResourceType },

    /// The plan identifier is not in the catalog
    #[error("Unknown plan: {plan}")]
    InvalidPlan { plan: String },

    /// The plan does not sell packs of this size
    #[error("Plan {plan} does not support a quantity of {quantity}")]
    InvalidQuantity { plan: PlanTier, quantity: u32 },

    #[error(transparent)]
    Store(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
