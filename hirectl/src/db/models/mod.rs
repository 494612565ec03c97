//! Database record models matching table schemas.
//!
//! Rows derive `sqlx::FromRow` and convert into the domain types in [`crate::credits::packs`], so
//! the storage layout can change without touching the ledger or the API.

pub mod credit_packs;
