use crate::domain::money::Balance;
use thiserror::Error;

/// Failures raised by a ledger store implementation.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("balance changed concurrently (expected {expected}, found {actual})")]
    Conflict { expected: Balance, actual: Balance },
    #[error("payment {0} already recorded")]
    DuplicatePayment(String),
    #[error("student {0} is not registered")]
    UnknownStudent(String),
    #[error("no tuition line for term {0}")]
    UnknownTerm(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised by a settlement backend.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("resource not found")]
    NotFound,
    #[error("balance changed concurrently")]
    Conflict,
    #[error("payment {0} already recorded")]
    DuplicatePayment(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected response: {0}")]
    Protocol(String),
    /// The payment call was sent but its outcome could not be confirmed.
    #[error("payment outcome unknown: {0}")]
    PartialCommit(String),
    #[error(transparent)]
    Ledger(LedgerError),
}

impl From<LedgerError> for BackendError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Conflict { .. } => BackendError::Conflict,
            LedgerError::DuplicatePayment(key) => BackendError::DuplicatePayment(key),
            LedgerError::UnknownStudent(_) | LedgerError::UnknownTerm(_) => BackendError::NotFound,
            other => BackendError::Ledger(other),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Reasons the classifier output could not be turned into an intent.
#[derive(Error, Debug)]
pub enum ClassificationError {
    #[error("classifier transport error: {0}")]
    Transport(String),
    #[error("classifier call timed out")]
    Timeout,
    #[error("classifier returned no content")]
    EmptyResponse,
    #[error("classifier payload is not a JSON object: {0}")]
    Malformed(String),
    #[error("classifier payload violates schema: {0}")]
    Schema(String),
}

impl From<reqwest::Error> for ClassificationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClassificationError::Timeout
        } else {
            ClassificationError::Transport(err.to_string())
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("amount must be positive")]
    NonPositiveAmount,
    #[error("student number must not be empty")]
    EmptyStudentNo,
}

/// Failures at the chat transport boundary.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("reply channel closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
