use super::intent::IntentRecord;
use super::ledger::{
    BalanceUpdate, IdempotencyKey, PaymentRecord, Student, StudentId, StudentNo, TuitionBalance,
};
use super::message::{InboundMessage, ReplyMessage};
use crate::error::{BackendError, ClassificationError, LedgerError, TransportError};
use async_trait::async_trait;
use std::sync::Arc;

/// Durable store of students, tuition lines and payment records.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Registers a student (if new) and upserts the given lines by term.
    async fn register(&self, student: Student, lines: Vec<TuitionBalance>) -> Result<(), LedgerError>;
    async fn find_student(&self, student_no: &StudentNo) -> Result<Option<Student>, LedgerError>;
    /// Tuition lines of a student in stored order.
    async fn balances(&self, student_id: &StudentId) -> Result<Vec<TuitionBalance>, LedgerError>;
    async fn find_payment(&self, key: &IdempotencyKey) -> Result<Option<PaymentRecord>, LedgerError>;
    /// Applies `update` and appends `record` as one atomic unit.
    ///
    /// Fails with `Conflict` when the stored balance no longer equals
    /// `update.expected`, and with `DuplicatePayment` when a record with the
    /// same idempotency key exists. Nothing is written in either case.
    async fn commit_payment(&self, update: BalanceUpdate, record: PaymentRecord) -> Result<(), LedgerError>;
    async fn payments(&self, student_no: &StudentNo) -> Result<Vec<PaymentRecord>, LedgerError>;
    /// Every student with its lines, ordered by student number.
    async fn snapshot(&self) -> Result<Vec<(Student, Vec<TuitionBalance>)>, LedgerError>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

/// The capability settlement and inquiry run against: either the ledger
/// directly or the tuition office's REST service.
#[async_trait]
pub trait SettlementBackend: Send + Sync {
    async fn resolve_student(&self, student_no: &StudentNo) -> Result<Option<Student>, BackendError>;
    async fn get_balance(&self, student: &Student) -> Result<Vec<TuitionBalance>, BackendError>;
    /// Looks up an already-committed payment. Backends that cannot answer return `None`.
    async fn find_payment(&self, key: &IdempotencyKey) -> Result<Option<PaymentRecord>, BackendError>;
    async fn apply_payment(
        &self,
        update: BalanceUpdate,
        record: PaymentRecord,
    ) -> Result<PaymentRecord, BackendError>;
}

pub type SettlementBackendRef = Arc<dyn SettlementBackend>;

/// Raw text completion against an external language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, instruction: &str, text: &str) -> Result<String, ClassificationError>;
}

/// Turns free text into an intent. Never fails; failures read as `UNKNOWN`.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> IntentRecord;
}

/// Ordered, possibly duplicated stream of inbound chat messages.
#[async_trait]
pub trait MessageFeed: Send {
    /// Next message, or `None` once the feed has ended.
    async fn next_message(&mut self) -> Option<Result<InboundMessage, TransportError>>;
}

#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn emit(&self, reply: ReplyMessage) -> Result<(), TransportError>;
}
