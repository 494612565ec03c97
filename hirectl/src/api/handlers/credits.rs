use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use tracing::info;

use crate::{
    AppState,
    api::models::{
        credits::{BalanceResponse, HistoryQuery, PackRequest},
        users::CurrentUser,
    },
    auth::require_admin,
    credits::{CreditPack, LedgerError, PaymentReferences, PlanTier, UsageRecord},
    errors::{Error, Result},
    types::{UserId, abbrev_uuid},
};

fn ledger_error(state: &AppState) -> impl Fn(LedgerError) -> Error + '_ {
    |err| Error::from_ledger(err, &state.config.credits.pricing_url)
}

async fn balance_for(state: &AppState, user_id: UserId) -> Result<BalanceResponse> {
    let balance = state.ledger.get_balance(user_id).await.map_err(ledger_error(state))?;
    Ok(BalanceResponse { user_id, balance })
}

/// Get current user's credit balance
#[utoipa::path(
    get,
    path = "/users/current/credits/balance",
    tag = "credits",
    summary = "Get current user's credit balance",
    description = "Remaining credits per resource type, summed over live packs",
    responses(
        (status = 200, description = "User's current balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn get_current_user_balance(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<BalanceResponse>> {
    Ok(Json(balance_for(&state, current_user.id).await?))
}

/// List current user's credit packs
#[utoipa::path(
    get,
    path = "/users/current/credits/packs",
    tag = "credits",
    summary = "List current user's credit packs",
    description = "All packs of the current user, including expired and exhausted ones, newest purchase first",
    responses(
        (status = 200, description = "List of packs", body = [CreditPack]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn list_current_user_packs(State(state): State<AppState>, current_user: CurrentUser) -> Result<Json<Vec<CreditPack>>> {
    let packs = state.ledger.list_packs(current_user.id).await.map_err(ledger_error(&state))?;
    Ok(Json(packs))
}

/// List current user's credit usage
#[utoipa::path(
    get,
    path = "/users/current/credits/history",
    tag = "credits",
    summary = "List current user's credit usage",
    description = "Most recent deductions, newest first",
    params(
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Usage history", body = [UsageRecord]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn list_current_user_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    current_user: CurrentUser,
) -> Result<Json<Vec<UsageRecord>>> {
    let history = state
        .ledger
        .usage_history(current_user.id, query.limit)
        .await
        .map_err(ledger_error(&state))?;
    Ok(Json(history))
}

/// Purchase a credit pack without a payment gateway
#[utoipa::path(
    post,
    path = "/users/current/credits/purchase",
    tag = "credits",
    summary = "Simulate a credit pack purchase",
    description = "Creates a paid pack at the plan's list price. Only available when `credits.allow_simulated_purchases` is enabled.",
    request_body = PackRequest,
    responses(
        (status = 201, description = "Pack created", body = CreditPack),
        (status = 400, description = "Simulated purchases disabled, unknown plan or unsupported quantity"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn purchase_credits(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<PackRequest>,
) -> Result<(StatusCode, Json<CreditPack>)> {
    if !state.config.credits.allow_simulated_purchases {
        return Err(Error::BadRequest {
            message: "Simulated purchases are disabled".to_string(),
        });
    }

    let plan = PlanTier::from_str(&request.plan).map_err(ledger_error(&state))?;
    let plan_config = plan.config();
    let amount_paid = plan_config.price(request.quantity).map_err(ledger_error(&state))?;

    let pack = state
        .ledger
        .create_pack(
            current_user.id,
            plan,
            amount_paid,
            plan_config.currency,
            request.quantity,
            PaymentReferences::default(),
        )
        .await
        .map_err(ledger_error(&state))?;

    info!(user_id = %abbrev_uuid(&current_user.id), %plan, amount_paid, "Simulated purchase");
    Ok((StatusCode::CREATED, Json(pack)))
}

/// Grant a credit pack to a user (admin only)
#[utoipa::path(
    post,
    path = "/users/{user_id}/credits/packs",
    tag = "credits",
    summary = "Grant a credit pack",
    description = "Creates a free pack for the given user (administrator required)",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
    ),
    request_body = PackRequest,
    responses(
        (status = 201, description = "Pack granted", body = CreditPack),
        (status = 400, description = "Unknown plan or unsupported quantity"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires administrator"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn grant_user_credits(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
    Json(request): Json<PackRequest>,
) -> Result<(StatusCode, Json<CreditPack>)> {
    let admin = require_admin(current_user)?;

    let plan = PlanTier::from_str(&request.plan).map_err(ledger_error(&state))?;
    let pack = state
        .ledger
        .grant_pack(user_id, plan, request.quantity)
        .await
        .map_err(ledger_error(&state))?;

    info!(
        user_id = %abbrev_uuid(&user_id),
        granted_by = %abbrev_uuid(&admin.id),
        %plan,
        "Granted credit pack"
    );
    Ok((StatusCode::CREATED, Json(pack)))
}

/// Get a user's credit balance (admin only)
#[utoipa::path(
    get,
    path = "/users/{user_id}/credits/balance",
    tag = "credits",
    summary = "Get a user's credit balance",
    params(
        ("user_id" = String, Path, description = "User ID (UUID)"),
    ),
    responses(
        (status = 200, description = "User's balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires administrator"),
        (status = 500, description = "Internal server error"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn get_user_balance(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    current_user: CurrentUser,
) -> Result<Json<BalanceResponse>> {
    require_admin(current_user)?;
    Ok(Json(balance_for(&state, user_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::ResourceType;
    use crate::test_utils::{admin_headers, create_test_app, create_test_config, user_header};
    use serde_json::{Value, json};
    use uuid::Uuid;

    #[test_log::test(tokio::test)]
    async fn test_balance_starts_empty() {
        let (app, _) = create_test_app(create_test_config());
        let user = Uuid::new_v4();
        let (name, value) = user_header(user);

        let response = app.get("/admin/api/v1/users/current/credits/balance").add_header(name, value).await;

        response.assert_status_ok();
        let balance: BalanceResponse = response.json();
        assert_eq!(balance.user_id, user);
        assert_eq!(balance.balance.get(ResourceType::Technical), 0);
        assert!(!balance.balance.has_business_plan);
    }

    #[test_log::test(tokio::test)]
    async fn test_requires_identity() {
        let (app, _) = create_test_app(create_test_config());

        let response = app.get("/admin/api/v1/users/current/credits/balance").await;
        response.assert_status(StatusCode::UNAUTHORIZED);

        let response = app
            .get("/admin/api/v1/users/current/credits/balance")
            .add_header("x-hirectl-user", "not-a-uuid")
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[test_log::test(tokio::test)]
    async fn test_admin_grant_then_balance() {
        let (app, _) = create_test_app(create_test_config());
        let user = Uuid::new_v4();

        let mut request = app
            .post(&format!("/admin/api/v1/users/{user}/credits/packs"))
            .json(&json!({"plan": "business", "quantity": 25}));
        for (name, value) in admin_headers() {
            request = request.add_header(name, value);
        }
        let response = request.await;
        response.assert_status(StatusCode::CREATED);
        let pack: CreditPack = response.json();
        assert_eq!(pack.plan, PlanTier::Business);
        assert_eq!(pack.amount_paid, 0);
        assert_eq!(pack.credits.technical, 15);

        // Owner sees the same numbers as the admin view
        let (name, value) = user_header(user);
        let response = app.get("/admin/api/v1/users/current/credits/balance").add_header(name, value).await;
        let own: Value = response.json();
        assert_eq!(own["technical"], 15);
        assert_eq!(own["hr"], 5);
        assert_eq!(own["behavioral"], 5);
        assert_eq!(own["has_business_plan"], true);

        let mut request = app.get(&format!("/admin/api/v1/users/{user}/credits/balance"));
        for (name, value) in admin_headers() {
            request = request.add_header(name, value);
        }
        let admin_view: Value = request.await.json();
        assert_eq!(admin_view, own);
    }

    #[test_log::test(tokio::test)]
    async fn test_admin_routes_forbidden_for_users() {
        let (app, _) = create_test_app(create_test_config());
        let user = Uuid::new_v4();
        let (name, value) = user_header(user);

        let response = app
            .post(&format!("/admin/api/v1/users/{user}/credits/packs"))
            .add_header(name.clone(), value.clone())
            .json(&json!({"plan": "ELITE"}))
            .await;
        response.assert_status(StatusCode::FORBIDDEN);

        let response = app
            .get(&format!("/admin/api/v1/users/{}/credits/balance", Uuid::new_v4()))
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[test_log::test(tokio::test)]
    async fn test_grant_rejects_unknown_plan_and_quantity() {
        let (app, _) = create_test_app(create_test_config());
        let user = Uuid::new_v4();

        for body in [json!({"plan": "GOLD"}), json!({"plan": "ENTERPRISE", "quantity": 60})] {
            let mut request = app.post(&format!("/admin/api/v1/users/{user}/credits/packs")).json(&body);
            for (name, value) in admin_headers() {
                request = request.add_header(name, value);
            }
            request.await.assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_simulated_purchase_disabled_by_default() {
        let mut config = create_test_config();
        config.credits.allow_simulated_purchases = false;
        let (app, _) = create_test_app(config);
        let (name, value) = user_header(Uuid::new_v4());

        let response = app
            .post("/admin/api/v1/users/current/credits/purchase")
            .add_header(name, value)
            .json(&json!({"plan": "LITE"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn test_simulated_purchase_charges_list_price() {
        let (app, _) = create_test_app(create_test_config());
        let user = Uuid::new_v4();
        let (name, value) = user_header(user);

        let response = app
            .post("/admin/api/v1/users/current/credits/purchase")
            .add_header(name.clone(), value.clone())
            .json(&json!({"plan": "ESSENTIAL", "quantity": 3}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let pack: CreditPack = response.json();
        assert_eq!(pack.user_id, user);
        assert_eq!(pack.amount_paid, 3 * 2499);
        assert_eq!(pack.credits.general, 3);
        assert_eq!(pack.credits.aptitude, 9);

        let response = app.get("/admin/api/v1/users/current/credits/packs").add_header(name, value).await;
        let packs: Vec<CreditPack> = response.json();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0].id, pack.id);
    }

    #[test_log::test(tokio::test)]
    async fn test_exhausted_balance_is_payment_required() {
        let (app, state) = create_test_app(create_test_config());
        let user = Uuid::new_v4();
        state.ledger.grant_pack(user, PlanTier::Lite, None).await.unwrap();

        let err = state.ledger.deduct(user, ResourceType::Technical, None).await.unwrap_err();
        let response = axum::response::IntoResponse::into_response(Error::from_ledger(err, &state.config.credits.pricing_url));
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["upgrade_url"], "/pricing");
        assert_eq!(body["message"], "No technical credits remaining. Purchase more at /pricing");

        // The refusal did not touch the balance
        let (name, value) = user_header(user);
        let balance: Value = app
            .get("/admin/api/v1/users/current/credits/balance")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(balance["general"], 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_history_respects_limit() {
        let (app, state) = create_test_app(create_test_config());
        let user = Uuid::new_v4();
        state.ledger.grant_pack(user, PlanTier::Pro, None).await.unwrap();
        for i in 0..3 {
            state
                .ledger
                .deduct(user, ResourceType::Coding, Some(&format!("coding-{i}")))
                .await
                .unwrap();
        }

        let (name, value) = user_header(user);
        let response = app
            .get("/admin/api/v1/users/current/credits/history")
            .add_query_param("limit", 2)
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        let history: Vec<UsageRecord> = response.json();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].log.reference_id.as_deref(), Some("coding-2"));
        assert_eq!(history[0].plan, PlanTier::Pro);
    }
}
