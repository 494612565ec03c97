//! API request/response models for guardrails.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::guardrails::OrgGuardrails;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckRequest {
    /// Candidate utterance to check before it reaches the interviewer
    pub text: String,
    /// Organisation policy; the configured default applies when absent
    #[serde(default)]
    pub policy: Option<OrgGuardrails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TranscriptRequest {
    /// Turns as stored by the session, `{"role": "user" | "assistant", "text": ...}`. Entries
    /// that do not parse are reported rather than rejected.
    #[schema(value_type = Vec<Object>)]
    pub transcript: Vec<serde_json::Value>,
    /// Overrides the default policy's setting
    #[serde(default)]
    pub toxicity_terminate_on_high: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstructionsResponse {
    /// Topics in force after applying the EEO defaults
    pub topics: Vec<String>,
    /// Text appended to the interviewer's instructions; empty when no topic applies
    pub instruction: String,
}
