use crate::domain::ledger::{
    BalanceUpdate, IdempotencyKey, PaymentRecord, Student, StudentId, StudentNo, TuitionBalance,
};
use crate::domain::ports::LedgerStore;
use crate::error::LedgerError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct LedgerState {
    students: BTreeMap<StudentNo, Student>,
    lines: HashMap<StudentId, Vec<TuitionBalance>>,
    payments: Vec<PaymentRecord>,
    payment_index: HashMap<IdempotencyKey, usize>,
}

/// A thread-safe in-memory tuition ledger.
///
/// All state sits behind one `RwLock`, so `commit_payment` checks the
/// expected balance, updates the line and appends the record while holding
/// a single write guard. Ideal for testing and for ledgers seeded from CSV.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    /// Creates a new, empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn register(&self, student: Student, lines: Vec<TuitionBalance>) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        let student_id = state
            .students
            .entry(student.student_no.clone())
            .or_insert(student)
            .id
            .clone();

        let existing = state.lines.entry(student_id.clone()).or_default();
        for mut line in lines {
            line.student_id = student_id.clone();
            match existing.iter_mut().find(|l| l.matches_term(&line.term)) {
                Some(current) => current.balance = line.balance,
                None => existing.push(line),
            }
        }
        Ok(())
    }

    async fn find_student(&self, student_no: &StudentNo) -> Result<Option<Student>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.students.get(student_no).cloned())
    }

    async fn balances(&self, student_id: &StudentId) -> Result<Vec<TuitionBalance>, LedgerError> {
        let state = self.state.read().await;
        Ok(state.lines.get(student_id).cloned().unwrap_or_default())
    }

    async fn find_payment(&self, key: &IdempotencyKey) -> Result<Option<PaymentRecord>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .payment_index
            .get(key)
            .and_then(|&idx| state.payments.get(idx))
            .cloned())
    }

    async fn commit_payment(&self, update: BalanceUpdate, record: PaymentRecord) -> Result<(), LedgerError> {
        let mut state = self.state.write().await;
        if state.payment_index.contains_key(&record.idempotency_key) {
            return Err(LedgerError::DuplicatePayment(record.idempotency_key.0));
        }

        let line = state
            .lines
            .get_mut(&update.student_id)
            .ok_or_else(|| LedgerError::UnknownStudent(update.student_id.0.clone()))?
            .iter_mut()
            .find(|line| line.matches_term(&update.term))
            .ok_or_else(|| LedgerError::UnknownTerm(update.term.clone()))?;

        if line.balance != update.expected {
            return Err(LedgerError::Conflict {
                expected: update.expected,
                actual: line.balance,
            });
        }
        line.balance = update.new_balance;

        let idx = state.payments.len();
        state.payment_index.insert(record.idempotency_key.clone(), idx);
        state.payments.push(record);
        Ok(())
    }

    async fn payments(&self, student_no: &StudentNo) -> Result<Vec<PaymentRecord>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .iter()
            .filter(|p| &p.student_no == student_no)
            .cloned()
            .collect())
    }

    async fn snapshot(&self) -> Result<Vec<(Student, Vec<TuitionBalance>)>, LedgerError> {
        let state = self.state.read().await;
        Ok(state
            .students
            .values()
            .map(|s| (s.clone(), state.lines.get(&s.id).cloned().unwrap_or_default()))
            .collect())
    }
}
