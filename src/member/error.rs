//! Member Error Types
//!
//! Every driver failure is translated into [`MemberError::DataAccess`] at the
//! store boundary; nothing above the store handles a raw `sqlx::Error`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemberError {
    #[error("Member not found: memberId={0}")]
    NotFound(String),

    /// Business rule violated inside a transaction
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Data access failure: {0}")]
    DataAccess(#[source] sqlx::Error),
}

impl MemberError {
    /// Stable code for logs and the CLI exit message
    pub fn code(&self) -> &'static str {
        match self {
            MemberError::NotFound(_) => "NOT_FOUND",
            MemberError::Validation(_) => "VALIDATION_FAILED",
            MemberError::DataAccess(_) => "DATA_ACCESS",
        }
    }

    /// True when the same call may succeed if simply tried again
    ///
    /// Only transient storage conditions qualify: an exhausted pool, a
    /// dropped connection or a worker crash. Not-found, validation and
    /// constraint failures will fail the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            MemberError::DataAccess(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::WorkerCrashed
            ),
            _ => false,
        }
    }

    /// Unique, foreign-key or check constraint rejected the write
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            MemberError::DataAccess(sqlx::Error::Database(db)) => {
                db.is_unique_violation()
                    || db.is_foreign_key_violation()
                    || db.is_check_violation()
            }
            _ => false,
        }
    }
}

impl From<sqlx::Error> for MemberError {
    fn from(e: sqlx::Error) -> Self {
        MemberError::DataAccess(e)
    }
}
