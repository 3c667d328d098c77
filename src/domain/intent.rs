use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    Greeting,
    QueryDebt,
    PayDebt,
    Unknown,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Intent::Greeting => "GREETING",
            Intent::QueryDebt => "QUERY_DEBT",
            Intent::PayDebt => "PAY_DEBT",
            Intent::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// Structured reading of one user message. Never persisted.
///
/// Field values are as the classifier reported them; the dispatcher decides
/// whether they are sufficient for the chosen intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntentRecord {
    pub intent: Intent,
    pub student_no: Option<String>,
    pub amount: Option<Decimal>,
    pub term: Option<String>,
}

impl IntentRecord {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            student_no: None,
            amount: None,
            term: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(Intent::Unknown)
    }

    pub fn with_student_no(mut self, student_no: impl Into<String>) -> Self {
        self.student_no = Some(student_no.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }
}
