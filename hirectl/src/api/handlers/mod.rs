//! HTTP request handlers.
//!
//! - [`credits`]: balances, packs, usage history, purchases and admin grants
//! - [`guardrails`]: realtime checks, transcript audits and interviewer instructions
//!
//! Handlers extract the caller with [`CurrentUser`](crate::api::models::users::CurrentUser),
//! delegate to the ledger or the evaluator held in [`AppState`](crate::AppState), and return
//! [`Error`](crate::errors::Error) on failure.

pub mod credits;
pub mod guardrails;
