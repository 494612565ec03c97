//! API models for the calling user.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::types::UserId;

/// Identity asserted by the trusted proxy. Extracted in handlers via
/// [`FromRequestParts`](axum::extract::FromRequestParts).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub is_admin: bool,
}
