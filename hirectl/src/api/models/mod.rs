pub mod credits;
pub mod guardrails;
pub mod users;
