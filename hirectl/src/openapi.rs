//! OpenAPI document for the `/admin/api/v1` surface, served at `/api-docs/openapi.json`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::{api, credits, guardrails, sessions};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "X-Hirectl-User",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-hirectl-user",
                    "User id (UUID) asserted by the trusted proxy. Administrators additionally carry `x-hirectl-admin: true`.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/admin/api/v1", description = "Admin API server")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::credits::get_current_user_balance,
        api::handlers::credits::list_current_user_packs,
        api::handlers::credits::list_current_user_history,
        api::handlers::credits::purchase_credits,
        api::handlers::credits::grant_user_credits,
        api::handlers::credits::get_user_balance,
        api::handlers::guardrails::check_utterance,
        api::handlers::guardrails::audit_transcript,
        api::handlers::guardrails::build_instructions,
    ),
    components(
        schemas(
            api::models::credits::PackRequest,
            api::models::credits::BalanceResponse,
            api::models::credits::HistoryQuery,
            api::models::guardrails::CheckRequest,
            api::models::guardrails::TranscriptRequest,
            api::models::guardrails::InstructionsResponse,
            api::models::users::CurrentUser,
            credits::Balance,
            credits::CreditCounts,
            credits::CreditPack,
            credits::Currency,
            credits::PackStatus,
            credits::PaymentReferences,
            credits::PlanTier,
            credits::ResourceType,
            credits::UsageLog,
            credits::UsageRecord,
            guardrails::OrgGuardrails,
            guardrails::RealtimeVerdict,
            guardrails::TranscriptVerdict,
            guardrails::GuardrailViolation,
            guardrails::Severity,
            guardrails::ViolationType,
            guardrails::Role,
            guardrails::TranscriptTurn,
            sessions::Session,
            sessions::SessionKind,
            sessions::SessionStatus,
            sessions::InterviewType,
        )
    ),
    tags(
        (name = "credits", description = "Credit packs, balances and usage history"),
        (name = "guardrails", description = "Content-safety checks on candidate speech"),
    )
)]
pub struct ApiDoc;
