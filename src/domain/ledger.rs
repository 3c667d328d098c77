use super::money::{Amount, Balance};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// External, user-facing student number. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentNo(String);

impl StudentNo {
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into().trim().to_string();
        if value.is_empty() {
            Err(ValidationError::EmptyStudentNo)
        } else {
            Ok(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StudentNo {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StudentNo> for String {
    fn from(value: StudentNo) -> Self {
        value.0
    }
}

impl fmt::Display for StudentNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Internal ledger key for a student. Opaque to callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub String);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub student_no: StudentNo,
    /// Display name, when the backend knows it.
    pub name: Option<String>,
}

/// One outstanding tuition line of a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuitionBalance {
    pub student_id: StudentId,
    pub term: String,
    pub balance: Balance,
}

impl TuitionBalance {
    /// Whether this line is for `term`, ignoring case and surrounding blanks.
    pub fn matches_term(&self, term: &str) -> bool {
        self.term.trim().eq_ignore_ascii_case(term.trim())
    }
}

/// Key that makes a settlement replay-safe. Derived from the inbound message id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(pub String);

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only ledger entry, one per committed payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub idempotency_key: IdempotencyKey,
    pub student_no: StudentNo,
    pub amount: Amount,
    pub term: String,
    pub balance_before: Balance,
    pub balance_after: Balance,
    pub recorded_at: DateTime<Utc>,
}

/// Conditional update of one tuition line: applied only while the stored
/// balance still equals `expected`.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceUpdate {
    pub student_id: StudentId,
    pub term: String,
    pub expected: Balance,
    pub new_balance: Balance,
}
