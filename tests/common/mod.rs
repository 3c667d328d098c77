#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tuition_desk::application::settlement::SettlementRequest;
use tuition_desk::domain::intent::IntentRecord;
use tuition_desk::domain::ledger::{
    BalanceUpdate, IdempotencyKey, PaymentRecord, Student, StudentId, StudentNo, TuitionBalance,
};
use tuition_desk::domain::message::ReplyMessage;
use tuition_desk::domain::money::{Amount, Balance};
use tuition_desk::domain::ports::{
    IntentClassifier, LedgerStore, ReplySink, SettlementBackend, SettlementBackendRef,
};
use tuition_desk::error::{BackendError, TransportError};
use tuition_desk::infrastructure::in_memory::InMemoryLedger;
use tuition_desk::infrastructure::ledger_backend::LedgerBackend;

pub const STUDENT_NO: &str = "12345";
pub const STUDENT_NAME: &str = "Ayse Yilmaz";

pub fn student_no() -> StudentNo {
    StudentNo::new(STUDENT_NO).unwrap()
}

pub fn student_id() -> StudentId {
    StudentId(format!("stu-{STUDENT_NO}"))
}

/// Ledger holding student 12345 with the given `(term, balance)` lines.
pub async fn seeded_ledger(lines: &[(&str, Decimal)]) -> InMemoryLedger {
    let ledger = InMemoryLedger::new();
    let student = Student {
        id: student_id(),
        student_no: student_no(),
        name: Some(STUDENT_NAME.into()),
    };
    let lines = lines
        .iter()
        .map(|(term, balance)| TuitionBalance {
            student_id: student_id(),
            term: term.to_string(),
            balance: Balance::new(*balance),
        })
        .collect();
    ledger.register(student, lines).await.unwrap();
    ledger
}

pub fn ledger_backend(ledger: &InMemoryLedger) -> SettlementBackendRef {
    Arc::new(LedgerBackend::new(Box::new(ledger.clone())))
}

pub async fn balance_of(ledger: &InMemoryLedger, term: &str) -> Balance {
    ledger
        .balances(&student_id())
        .await
        .unwrap()
        .into_iter()
        .find(|line| line.matches_term(term))
        .map(|line| line.balance)
        .unwrap()
}

pub fn request(key: &str, amount: Decimal, term: Option<&str>) -> SettlementRequest {
    SettlementRequest {
        student_no: student_no(),
        amount: Amount::new(amount).unwrap(),
        term: term.map(str::to_string),
        idempotency_key: IdempotencyKey(key.into()),
    }
}

/// Classifier answering from a fixed table; anything else is `UNKNOWN`.
#[derive(Default)]
pub struct ScriptedClassifier {
    answers: HashMap<String, IntentRecord>,
}

impl ScriptedClassifier {
    pub fn answer(mut self, text: &str, record: IntentRecord) -> Self {
        self.answers.insert(text.into(), record);
        self
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, text: &str) -> IntentRecord {
        self.answers
            .get(text)
            .cloned()
            .unwrap_or_else(IntentRecord::unknown)
    }
}

/// Backend that knows no students and counts every call made to it.
#[derive(Default)]
pub struct CountingBackend {
    pub calls: AtomicUsize,
}

impl CountingBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SettlementBackend for CountingBackend {
    async fn resolve_student(&self, _student_no: &StudentNo) -> Result<Option<Student>, BackendError> {
        self.touch();
        Ok(None)
    }

    async fn get_balance(&self, _student: &Student) -> Result<Vec<TuitionBalance>, BackendError> {
        self.touch();
        Ok(Vec::new())
    }

    async fn find_payment(&self, _key: &IdempotencyKey) -> Result<Option<PaymentRecord>, BackendError> {
        self.touch();
        Ok(None)
    }

    async fn apply_payment(
        &self,
        _update: BalanceUpdate,
        _record: PaymentRecord,
    ) -> Result<PaymentRecord, BackendError> {
        self.touch();
        Err(BackendError::NotFound)
    }
}

/// Ledger backend whose payment call fails with a fixed error.
pub struct FailingPayments {
    pub inner: SettlementBackendRef,
    pub error: fn() -> BackendError,
}

#[async_trait]
impl SettlementBackend for FailingPayments {
    async fn resolve_student(&self, student_no: &StudentNo) -> Result<Option<Student>, BackendError> {
        self.inner.resolve_student(student_no).await
    }

    async fn get_balance(&self, student: &Student) -> Result<Vec<TuitionBalance>, BackendError> {
        self.inner.get_balance(student).await
    }

    async fn find_payment(&self, key: &IdempotencyKey) -> Result<Option<PaymentRecord>, BackendError> {
        self.inner.find_payment(key).await
    }

    async fn apply_payment(
        &self,
        _update: BalanceUpdate,
        _record: PaymentRecord,
    ) -> Result<PaymentRecord, BackendError> {
        Err((self.error)())
    }
}

pub struct FailingSink;

#[async_trait]
impl ReplySink for FailingSink {
    async fn emit(&self, _reply: ReplyMessage) -> Result<(), TransportError> {
        Err(TransportError::Closed)
    }
}

/// Serves `app` on an ephemeral local port and returns its base URL.
pub async fn spawn_server(app: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}
