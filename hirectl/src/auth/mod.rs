//! Caller identity.
//!
//! Authentication itself happens upstream: a trusted reverse proxy sets the user header (a UUID)
//! and, for administrators, the admin header. [`current_user`] turns those headers into a
//! [`CurrentUser`](crate::api::models::users::CurrentUser) extractor.

pub mod current_user;

pub use current_user::require_admin;
