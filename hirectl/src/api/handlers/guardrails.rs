use axum::{extract::State, response::Json};
use tracing::warn;

use crate::{
    AppState,
    api::models::{
        guardrails::{CheckRequest, InstructionsResponse, TranscriptRequest},
        users::CurrentUser,
    },
    auth::require_admin,
    errors::Result,
    guardrails::{OrgGuardrails, RealtimeVerdict, TranscriptVerdict, build_do_not_ask_instruction},
    types::abbrev_uuid,
};

/// Check one candidate utterance
#[utoipa::path(
    post,
    path = "/guardrails/check",
    tag = "guardrails",
    summary = "Check a candidate utterance",
    description = "Realtime verdict for a single utterance. The reason is intentionally non-specific; \
                   violation details are only available through the transcript audit.",
    request_body = CheckRequest,
    responses(
        (status = 200, description = "Verdict", body = RealtimeVerdict),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn check_utterance(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<CheckRequest>,
) -> Result<Json<RealtimeVerdict>> {
    let policy = request.policy.as_ref().unwrap_or(&state.config.guardrails.default_policy);
    let verdict = state.guardrails.check_realtime(&request.text, policy.toxicity_terminate_on_high);

    if verdict.terminate {
        warn!(user_id = %abbrev_uuid(&current_user.id), "Utterance rejected by guardrails");
    }
    Ok(Json(verdict))
}

/// Audit a full transcript (admin only)
#[utoipa::path(
    post,
    path = "/guardrails/transcript",
    tag = "guardrails",
    summary = "Audit a transcript",
    description = "Evaluates every candidate turn and returns all violations with their turn index, \
                   whether the session must be terminated, and the positions of entries that could not be parsed.",
    request_body = TranscriptRequest,
    responses(
        (status = 200, description = "Transcript verdict", body = TranscriptVerdict),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - requires administrator"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn audit_transcript(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<TranscriptRequest>,
) -> Result<Json<TranscriptVerdict>> {
    require_admin(current_user)?;

    let terminate_on_high = request
        .toxicity_terminate_on_high
        .unwrap_or(state.config.guardrails.default_policy.toxicity_terminate_on_high);
    Ok(Json(state.guardrails.check_raw_transcript(&request.transcript, terminate_on_high)))
}

/// Build the interviewer's do-not-ask instruction
#[utoipa::path(
    post,
    path = "/guardrails/instructions",
    tag = "guardrails",
    summary = "Build do-not-ask instructions",
    description = "Resolves the effective do-not-ask topics for an organisation policy and renders the \
                   instruction block appended to the interviewer prompt.",
    request_body = OrgGuardrails,
    responses(
        (status = 200, description = "Instruction", body = InstructionsResponse),
        (status = 400, description = "Invalid policy"),
        (status = 401, description = "Unauthorized"),
    ),
    security(
        ("X-Hirectl-User" = [])
    )
)]
pub async fn build_instructions(_current_user: CurrentUser, Json(policy): Json<OrgGuardrails>) -> Result<Json<InstructionsResponse>> {
    Ok(Json(InstructionsResponse {
        topics: policy.effective_topics().into_iter().map(str::to_string).collect(),
        instruction: build_do_not_ask_instruction(&policy),
    }))
}
