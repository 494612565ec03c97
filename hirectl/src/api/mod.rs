//! HTTP API.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response bodies and extractors
//!
//! All routes are nested under `/admin/api/v1`:
//!
//! - **Credits** (`/users/current/credits/*`, `/users/{user_id}/credits/*`): balances, packs,
//!   usage history, simulated purchases and admin grants
//! - **Guardrails** (`/guardrails/*`): realtime checks, transcript audits and interviewer
//!   instructions
//!
//! Handlers are annotated with `utoipa`; the document is served at `/api-docs/openapi.json`.

pub mod handlers;
pub mod models;
