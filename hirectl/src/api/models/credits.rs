//! API request/response models for credits.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::credits::Balance;
use crate::types::UserId;

/// Body for purchases and admin grants.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PackRequest {
    /// Plan identifier, e.g. `BUSINESS` (case-insensitive)
    pub plan: String,
    /// Seats for per-seat plans; ignored by fixed packs. Defaults to the plan's smallest size.
    #[serde(default)]
    pub quantity: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    #[serde(flatten)]
    pub balance: Balance,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    /// Maximum entries to return (1-100, default 50)
    pub limit: Option<u32>,
}
