use crate::domain::ledger::{
    BalanceUpdate, IdempotencyKey, PaymentRecord, Student, StudentNo, TuitionBalance,
};
use crate::domain::ports::{LedgerStoreBox, SettlementBackend};
use crate::error::BackendError;
use async_trait::async_trait;

/// Settlement backend that reads and writes the tuition ledger directly.
pub struct LedgerBackend {
    ledger: LedgerStoreBox,
}

impl LedgerBackend {
    pub fn new(ledger: LedgerStoreBox) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &LedgerStoreBox {
        &self.ledger
    }
}

#[async_trait]
impl SettlementBackend for LedgerBackend {
    async fn resolve_student(&self, student_no: &StudentNo) -> Result<Option<Student>, BackendError> {
        Ok(self.ledger.find_student(student_no).await?)
    }

    async fn get_balance(&self, student: &Student) -> Result<Vec<TuitionBalance>, BackendError> {
        Ok(self.ledger.balances(&student.id).await?)
    }

    async fn find_payment(&self, key: &IdempotencyKey) -> Result<Option<PaymentRecord>, BackendError> {
        Ok(self.ledger.find_payment(key).await?)
    }

    async fn apply_payment(
        &self,
        update: BalanceUpdate,
        record: PaymentRecord,
    ) -> Result<PaymentRecord, BackendError> {
        self.ledger.commit_payment(update, record.clone()).await?;
        Ok(record)
    }
}
