//! Session lifecycle driven by the ledger and the guardrails.
//!
//! A session is only materialised after a credit has been deducted for it. From there it moves
//! through a small state machine:
//!
//! ```text
//! IN_PROGRESS ──complete()──────────────▶ COMPLETED
//!      │
//!      └──guardrail termination─────────▶ CANCELLED (terminated_by_guardrails)
//! ```
//!
//! Both end states are terminal.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::credits::{CreditLedger, LedgerError, ResourceType};
use crate::guardrails::{GuardrailEvaluator, GuardrailViolation, OrgGuardrails, RealtimeVerdict, TranscriptTurn, TranscriptVerdict};
use crate::types::{SessionId, UsageLogId, UserId, abbrev_uuid};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session already finished with status {status}")]
    AlreadyFinished { status: SessionStatus },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum InterviewType {
    Technical,
    Hr,
    Behavioral,
    #[default]
    General,
}

impl InterviewType {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            InterviewType::Technical => ResourceType::Technical,
            InterviewType::Hr => ResourceType::Hr,
            InterviewType::Behavioral => ResourceType::Behavioral,
            InterviewType::General => ResourceType::General,
        }
    }
}

/// What is being started, and therefore which credit it costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", content = "interview_type", rename_all = "snake_case")]
pub enum SessionKind {
    Interview(InterviewType),
    Aptitude,
    Coding,
}

impl SessionKind {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            SessionKind::Interview(interview_type) => interview_type.resource_type(),
            SessionKind::Aptitude => ResourceType::Aptitude,
            SessionKind::Coding => ResourceType::Coding,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Session {
    #[schema(value_type = String, format = "uuid")]
    pub id: SessionId,
    #[schema(value_type = String, format = "uuid")]
    pub user_id: UserId,
    pub kind: SessionKind,
    pub status: SessionStatus,
    /// Usage log of the credit that paid for this session
    #[schema(value_type = String, format = "uuid")]
    pub usage_log_id: UsageLogId,
    /// Violations from the latest transcript evaluation, if any
    pub guardrail_flags: Option<Vec<GuardrailViolation>>,
    pub terminated_by_guardrails: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Deduct one credit for `kind` and open an IN_PROGRESS session.
///
/// The deduction is the availability check; `InsufficientCredits` is passed through for the
/// caller to turn into a payment-required response. `reference` defaults to the new session id.
#[instrument(skip(ledger), fields(user_id = %abbrev_uuid(&user_id)), err)]
pub async fn start_session(ledger: &CreditLedger, user_id: UserId, kind: SessionKind, reference: Option<&str>) -> Result<Session> {
    let id = Uuid::new_v4();
    let session_ref = id.to_string();
    let log = ledger
        .deduct(user_id, kind.resource_type(), Some(reference.unwrap_or(&session_ref)))
        .await?;

    info!(session_id = %abbrev_uuid(&id), resource_type = %kind.resource_type(), "Started session");
    Ok(Session {
        id,
        user_id,
        kind,
        status: SessionStatus::InProgress,
        usage_log_id: log.id,
        guardrail_flags: None,
        terminated_by_guardrails: false,
        started_at: log.created_at,
        completed_at: None,
    })
}

impl Session {
    fn ensure_in_progress(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(SessionError::AlreadyFinished { status: self.status });
        }
        Ok(())
    }

    fn terminate_by_guardrails(&mut self) {
        self.status = SessionStatus::Cancelled;
        self.terminated_by_guardrails = true;
        self.completed_at = Some(Utc::now());
        warn!(session_id = %abbrev_uuid(&self.id), user_id = %abbrev_uuid(&self.user_id), "Session terminated by guardrails");
    }

    /// Normal end of the session.
    pub fn complete(&mut self) -> Result<()> {
        self.ensure_in_progress()?;
        self.status = SessionStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Evaluate the transcript so far and write the verdict back to the session.
    pub fn apply_transcript(
        &mut self,
        evaluator: &GuardrailEvaluator,
        transcript: &[TranscriptTurn],
        policy: &OrgGuardrails,
    ) -> Result<TranscriptVerdict> {
        self.ensure_in_progress()?;
        let verdict = evaluator.check_transcript(transcript, policy.toxicity_terminate_on_high);

        if !verdict.violations.is_empty() {
            self.guardrail_flags = Some(verdict.violations.clone());
        }
        if verdict.should_terminate {
            self.terminate_by_guardrails();
        }
        Ok(verdict)
    }

    /// Check one candidate utterance mid-session, terminating on a positive verdict.
    pub fn apply_utterance(&mut self, evaluator: &GuardrailEvaluator, text: &str, policy: &OrgGuardrails) -> Result<RealtimeVerdict> {
        self.ensure_in_progress()?;
        let verdict = evaluator.check_realtime(text, policy.toxicity_terminate_on_high);
        if verdict.terminate {
            self.terminate_by_guardrails();
        }
        Ok(verdict)
    }
}
