use crate::domain::ledger::{Student, StudentNo, TuitionBalance};
use crate::domain::money::Balance;
use crate::domain::ports::SettlementBackendRef;
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq)]
pub enum InquiryOutcome {
    Found {
        student: Student,
        total: Balance,
        lines: Vec<TuitionBalance>,
    },
    NotFound,
    /// Backend unreachable or erroring. Details are logged, not replied.
    Failed,
}

/// Read-only balance lookup. Safe to retry.
pub struct DebtInquiry {
    backend: SettlementBackendRef,
}

impl DebtInquiry {
    pub fn new(backend: SettlementBackendRef) -> Self {
        Self { backend }
    }

    pub async fn inquire(&self, student_no: &StudentNo) -> InquiryOutcome {
        match self.lookup(student_no).await {
            Ok(outcome) => outcome,
            Err(BackendError::NotFound) => InquiryOutcome::NotFound,
            Err(err) => {
                tracing::error!(student_no = %student_no, error = %err, "debt inquiry failed");
                InquiryOutcome::Failed
            }
        }
    }

    async fn lookup(&self, student_no: &StudentNo) -> Result<InquiryOutcome, BackendError> {
        let Some(student) = self.backend.resolve_student(student_no).await? else {
            return Ok(InquiryOutcome::NotFound);
        };
        let lines = self.backend.get_balance(&student).await?;
        let total = lines.iter().map(|line| line.balance).sum();
        tracing::info!(student_no = %student_no, total = %total, "debt inquiry answered");
        Ok(InquiryOutcome::Found {
            student,
            total,
            lines,
        })
    }
}
