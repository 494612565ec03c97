//! Repository implementations for database access.
//!
//! - [`CreditPacks`]: credit pack counters and the usage log

pub mod credit_packs;

pub use credit_packs::CreditPacks;
