//! Organisation guardrail policy and the do-not-ask instruction block.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Protected-characteristic topics used when EEO-safe mode is on and no topics are configured.
pub const EEO_DEFAULT_TOPICS: &[&str] = &[
    "age",
    "date of birth",
    "race",
    "ethnicity",
    "national origin",
    "religion",
    "religious beliefs",
    "political affiliation",
    "marital status",
    "family plans",
    "pregnancy",
    "disability",
    "sexual orientation",
    "gender identity",
    "salary history",
    "citizenship status",
    "arrest record",
    "credit score",
];

const RULE: &str = "═══════════════════════════════════════";

/// Guardrail settings of one organisation, supplied as plain data by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default, deny_unknown_fields)]
pub struct OrgGuardrails {
    pub eeo_safe_mode: bool,
    pub do_not_ask_topics: Vec<String>,
    pub toxicity_terminate_on_high: bool,
}

impl Default for OrgGuardrails {
    fn default() -> Self {
        Self {
            eeo_safe_mode: true,
            do_not_ask_topics: Vec::new(),
            toxicity_terminate_on_high: true,
        }
    }
}

impl OrgGuardrails {
    /// Configured topics win; otherwise the EEO defaults when EEO-safe mode is on.
    pub fn effective_topics(&self) -> Vec<&str> {
        if !self.do_not_ask_topics.is_empty() {
            self.do_not_ask_topics.iter().map(String::as_str).collect()
        } else if self.eeo_safe_mode {
            EEO_DEFAULT_TOPICS.to_vec()
        } else {
            Vec::new()
        }
    }
}

/// System-prompt block telling the interviewer never to ask about the effective topics. Empty
/// when no topic applies.
pub fn build_do_not_ask_instruction(guardrails: &OrgGuardrails) -> String {
    let topics = guardrails.effective_topics();
    if topics.is_empty() {
        return String::new();
    }

    let list = topics.iter().map(|t| format!("- {t}")).collect::<Vec<_>>().join("\n");
    [
        "",
        RULE,
        "COMPLIANCE — DO NOT ASK (STRICT)",
        RULE,
        "You MUST NOT ask the candidate about, or make assumptions based on, any of the following topics. \
         If the candidate volunteers such information, acknowledge briefly and steer the conversation back \
         to job-related questions only.",
        &list,
        "Do not ask follow-up questions about these topics. Keep the interview strictly job- and competency-based.",
        "",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_uses_eeo_topics() {
        let policy = OrgGuardrails::default();
        assert_eq!(policy.effective_topics().len(), 18);

        let text = build_do_not_ask_instruction(&policy);
        assert!(text.starts_with('\n'));
        assert!(text.ends_with('\n'));
        assert!(text.contains("COMPLIANCE — DO NOT ASK (STRICT)"));
        assert!(text.contains("\n- date of birth\n"));
        assert!(text.contains("\n- credit score\n"));
    }

    #[test]
    fn test_configured_topics_replace_defaults() {
        let policy = OrgGuardrails {
            do_not_ask_topics: vec!["visa sponsorship".to_string()],
            ..Default::default()
        };
        let text = build_do_not_ask_instruction(&policy);
        assert!(text.contains("- visa sponsorship"));
        assert!(!text.contains("- age"));
    }

    #[test]
    fn test_no_topics_gives_empty_instruction() {
        let policy = OrgGuardrails {
            eeo_safe_mode: false,
            ..Default::default()
        };
        assert!(policy.effective_topics().is_empty());
        assert_eq!(build_do_not_ask_instruction(&policy), "");
    }

    #[test]
    fn test_partial_policy_deserializes_with_defaults() {
        let policy: OrgGuardrails = serde_json::from_str(r#"{"toxicity_terminate_on_high": false}"#).unwrap();
        assert!(policy.eeo_safe_mode);
        assert!(!policy.toxicity_terminate_on_high);
    }
}
