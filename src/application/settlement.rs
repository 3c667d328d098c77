use super::locks::StudentLocks;
use crate::config::{OverpaymentPolicy, SettlementConfig};
use crate::domain::ledger::{BalanceUpdate, IdempotencyKey, PaymentRecord, StudentNo, TuitionBalance};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::SettlementBackendRef;
use crate::error::BackendError;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq)]
pub struct SettlementRequest {
    pub student_no: StudentNo,
    pub amount: Amount,
    /// Term named by the user; the first owed line is used when absent.
    pub term: Option<String>,
    pub idempotency_key: IdempotencyKey,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    /// Payment committed. `requested` differs from `receipt.amount` when clamped.
    Settled {
        receipt: PaymentRecord,
        requested: Amount,
    },
    /// The same request was settled before; nothing was deducted this time.
    AlreadyProcessed(PaymentRecord),
    StudentNotRegistered,
    NoTuitionRecord,
    NoTuitionRecordForTerm(String),
    NothingOwed,
    OverpaymentRejected {
        amount: Amount,
        outstanding: Balance,
    },
    Failed,
    /// Payment may have been taken but could not be confirmed as recorded.
    PartialCommit,
}

/// Deducts a payment from a student's tuition line and records it.
///
/// Steps: resolve the student, read the lines, pick the line, compute the
/// new balance, then commit the conditional balance write together with the
/// payment record. All steps for one student run under that student's lock;
/// a lost conditional write re-reads and retries up to the configured bound.
pub struct DebtSettlement {
    backend: SettlementBackendRef,
    locks: StudentLocks,
    overpayment: OverpaymentPolicy,
    max_conflict_retries: u32,
}

impl DebtSettlement {
    pub fn new(backend: SettlementBackendRef, config: &SettlementConfig) -> Self {
        Self {
            backend,
            locks: StudentLocks::default(),
            overpayment: config.overpayment,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    pub async fn settle(&self, request: SettlementRequest) -> SettlementOutcome {
        let _guard = self.locks.lock(&request.student_no).await;
        match self.run(&request).await {
            Ok(outcome) => outcome,
            Err(BackendError::NotFound) => SettlementOutcome::StudentNotRegistered,
            Err(err) => {
                tracing::error!(
                    student_no = %request.student_no,
                    key = %request.idempotency_key,
                    error = %err,
                    "settlement failed"
                );
                SettlementOutcome::Failed
            }
        }
    }

    async fn run(&self, request: &SettlementRequest) -> Result<SettlementOutcome, BackendError> {
        if let Some(previous) = self.backend.find_payment(&request.idempotency_key).await? {
            tracing::info!(key = %request.idempotency_key, "payment replay ignored");
            return Ok(SettlementOutcome::AlreadyProcessed(previous));
        }

        let Some(student) = self.backend.resolve_student(&request.student_no).await? else {
            return Ok(SettlementOutcome::StudentNotRegistered);
        };

        let mut conflicts = 0;
        loop {
            let lines = self.backend.get_balance(&student).await?;
            let line = match select_line(&lines, request.term.as_deref()) {
                Ok(line) => line,
                Err(outcome) => return Ok(outcome),
            };

            let charged = match self.charge(request.amount, line.balance) {
                Ok(charged) => charged,
                Err(outcome) => return Ok(outcome),
            };
            let new_balance = line.balance - charged;

            let update = BalanceUpdate {
                student_id: student.id.clone(),
                term: line.term.clone(),
                expected: line.balance,
                new_balance,
            };
            let record = PaymentRecord {
                idempotency_key: request.idempotency_key.clone(),
                student_no: request.student_no.clone(),
                amount: charged,
                term: line.term.clone(),
                balance_before: line.balance,
                balance_after: new_balance,
                recorded_at: Utc::now(),
            };

            match self.backend.apply_payment(update, record.clone()).await {
                Ok(receipt) => {
                    tracing::info!(
                        student_no = %request.student_no,
                        term = %receipt.term,
                        amount = %receipt.amount,
                        balance_after = %receipt.balance_after,
                        "payment settled"
                    );
                    return Ok(SettlementOutcome::Settled {
                        receipt,
                        requested: request.amount,
                    });
                }
                Err(BackendError::Conflict) if conflicts < self.max_conflict_retries => {
                    conflicts += 1;
                    tracing::warn!(
                        student_no = %request.student_no,
                        attempt = conflicts,
                        "balance changed during settlement, re-reading"
                    );
                }
                Err(BackendError::DuplicatePayment(_)) => {
                    tracing::info!(key = %request.idempotency_key, "backend reports payment already applied");
                    let previous = self
                        .backend
                        .find_payment(&request.idempotency_key)
                        .await?
                        .unwrap_or(record);
                    return Ok(SettlementOutcome::AlreadyProcessed(previous));
                }
                Err(BackendError::PartialCommit(detail)) => {
                    tracing::error!(
                        alert = true,
                        student_no = %request.student_no,
                        key = %request.idempotency_key,
                        amount = %request.amount,
                        detail = %detail,
                        "payment outcome unconfirmed, manual reconciliation required"
                    );
                    return Ok(SettlementOutcome::PartialCommit);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn charge(&self, amount: Amount, outstanding: Balance) -> Result<Amount, SettlementOutcome> {
        if Balance::from(amount) <= outstanding {
            return Ok(amount);
        }
        match self.overpayment {
            OverpaymentPolicy::Allow => Ok(amount),
            OverpaymentPolicy::Clamp => {
                Amount::new(outstanding.value()).map_err(|_| SettlementOutcome::NothingOwed)
            }
            OverpaymentPolicy::Reject => Err(SettlementOutcome::OverpaymentRejected {
                amount,
                outstanding,
            }),
        }
    }
}

/// Picks the line a payment applies to.
///
/// A named term must match a line exactly (ignoring case). Without a term
/// the first line with a positive balance, in stored order, is used.
pub fn select_line<'a>(
    lines: &'a [TuitionBalance],
    term: Option<&str>,
) -> Result<&'a TuitionBalance, SettlementOutcome> {
    if lines.is_empty() {
        return Err(SettlementOutcome::NoTuitionRecord);
    }
    let line = match term {
        Some(term) => lines
            .iter()
            .find(|line| line.matches_term(term))
            .ok_or_else(|| SettlementOutcome::NoTuitionRecordForTerm(term.to_string()))?,
        None => lines
            .iter()
            .find(|line| line.balance.is_owed())
            .ok_or(SettlementOutcome::NothingOwed)?,
    };
    if line.balance.is_owed() {
        Ok(line)
    } else {
        Err(SettlementOutcome::NothingOwed)
    }
}
