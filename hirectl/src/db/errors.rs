use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::credits::ResourceType;

const USED_BOUNDS_PREFIX: &str = "credit_packs_used_";
const USED_BOUNDS_SUFFIX: &str = "_bounds";
const USAGE_LOG_PACK_FK: &str = "usage_logs_credit_pack_id_fkey";

/// Storage failures the ledger can tell apart. Anything else is [`DbError::Other`].
#[derive(Error, Debug)]
pub enum DbError {
    /// A `fetch_one` found no row
    #[error("Entity not found")]
    NotFound,

    /// A `used_*` counter update would leave `0 <= used <= allotted`. The ledger's conditional
    /// update never issues one, so this is an invariant breach rather than a client error.
    #[error("{resource_type} usage would exceed its allotment ({constraint})")]
    AllotmentExceeded {
        resource_type: ResourceType,
        constraint: String,
    },

    /// A usage log referenced a pack id with no row behind it
    #[error("Usage log references unknown credit pack")]
    UnknownPack { message: String },

    /// Catch-all for non-recoverable errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DbError {
    /// Name the pack-store constraint behind a database error, if it is one we categorise.
    fn from_constraint(kind: ErrorKind, constraint: Option<&str>, message: &str) -> Option<Self> {
        match kind {
            ErrorKind::CheckViolation => {
                let constraint = constraint?;
                let resource_type = constraint
                    .strip_prefix(USED_BOUNDS_PREFIX)?
                    .strip_suffix(USED_BOUNDS_SUFFIX)?
                    .parse()
                    .ok()?;
                Some(DbError::AllotmentExceeded {
                    resource_type,
                    constraint: constraint.to_string(),
                })
            }
            ErrorKind::ForeignKeyViolation if constraint == Some(USAGE_LOG_PACK_FK) => Some(DbError::UnknownPack {
                message: message.to_string(),
            }),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let categorised = match &err {
            sqlx::Error::RowNotFound => Some(DbError::NotFound),
            sqlx::Error::Database(db_err) => DbError::from_constraint(db_err.kind(), db_err.constraint(), db_err.message()),
            _ => None,
        };
        categorised.unwrap_or_else(|| DbError::Other(anyhow::Error::from(err)))
    }
}

/// Type alias for database operation results
pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("credit_packs_used_technical_bounds", ResourceType::Technical)]
    #[case("credit_packs_used_hr_bounds", ResourceType::Hr)]
    #[case("credit_packs_used_coding_bounds", ResourceType::Coding)]
    fn test_used_bounds_violation_is_allotment_breach(#[case] constraint: &str, #[case] expected: ResourceType) {
        let err = DbError::from_constraint(ErrorKind::CheckViolation, Some(constraint), "violates check constraint").unwrap();
        match err {
            DbError::AllotmentExceeded {
                resource_type,
                constraint: name,
            } => {
                assert_eq!(resource_type, expected);
                assert_eq!(name, constraint);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_other_check_constraints_are_not_categorised() {
        assert!(DbError::from_constraint(ErrorKind::CheckViolation, Some("credit_packs_status_check"), "").is_none());
        assert!(DbError::from_constraint(ErrorKind::CheckViolation, Some("credit_packs_used_bogus_bounds"), "").is_none());
        assert!(DbError::from_constraint(ErrorKind::CheckViolation, None, "").is_none());
    }

    #[test]
    fn test_usage_log_fk_is_unknown_pack() {
        let err = DbError::from_constraint(ErrorKind::ForeignKeyViolation, Some(USAGE_LOG_PACK_FK), "insert violates fk").unwrap();
        assert!(matches!(err, DbError::UnknownPack { ref message } if message == "insert violates fk"));

        assert!(DbError::from_constraint(ErrorKind::ForeignKeyViolation, Some("some_other_fkey"), "").is_none());
        assert!(DbError::from_constraint(ErrorKind::UniqueViolation, Some("credit_packs_pkey"), "").is_none());
    }

    #[test]
    fn test_row_not_found_and_fallthrough() {
        assert!(matches!(DbError::from(sqlx::Error::RowNotFound), DbError::NotFound));
        assert!(matches!(DbError::from(sqlx::Error::PoolTimedOut), DbError::Other(_)));
    }
}
