//! Error types for the parking service.

/// Domain-level errors (business rule violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Fixed error codes returned to clients alongside a 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    RegisterUsernameTaken,
    RegisterPhoneNumTaken,
    RegisterPlanNotFound,
    RegisterStripeFailed,
    LogMessageFailed,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            Self::RegisterUsernameTaken => 1001,
            Self::RegisterPhoneNumTaken => 1002,
            Self::RegisterPlanNotFound => 1003,
            Self::RegisterStripeFailed => 1004,
            Self::LogMessageFailed => -1,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::RegisterUsernameTaken => "username is already in use!",
            Self::RegisterPhoneNumTaken => "mobile phone number is already in use!",
            Self::RegisterPlanNotFound => "Unable to find suitable plan.",
            Self::RegisterStripeFailed => "register with stripe failed!",
            Self::LogMessageFailed => "Failed to save log message",
        }
    }
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("{}", .0.message())]
    Rejected(ErrorCode),

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::ValidationError(msg)) => AppError::BadRequest(msg),
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError(msg) => AppError::BadRequest(msg),
            e => AppError::BadRequest(e.to_string()),
        }
    }
}
