use crate::domain::ledger::{
    BalanceUpdate, IdempotencyKey, PaymentRecord, Student, StudentId, StudentNo, TuitionBalance,
};
use crate::domain::ports::LedgerStore;
use crate::error::LedgerError;
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for students, keyed by student number.
pub const CF_STUDENTS: &str = "students";
/// Column Family for tuition lines, keyed by student id.
pub const CF_LINES: &str = "tuition_lines";
/// Column Family for payment records, keyed by idempotency key.
pub const CF_PAYMENTS: &str = "payments";

impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

/// A persistent tuition ledger on RocksDB.
///
/// A payment commit writes the updated tuition lines and the payment record
/// in one `WriteBatch`, so either both land or neither does. Commits are
/// serialized through `commit_lock` to make the balance check and the write
/// a single step.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBLedger {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBLedger {
    /// Opens or creates a RocksDB ledger at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_STUDENTS, CF_LINES, CF_PAYMENTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily, LedgerError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LedgerError::Storage(format!("column family {name} not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>, LedgerError> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>, LedgerError> {
        let mut items = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            items.push(serde_json::from_slice(&value)?);
        }
        Ok(items)
    }
}

#[async_trait]
impl LedgerStore for RocksDBLedger {
    async fn register(&self, student: Student, lines: Vec<TuitionBalance>) -> Result<(), LedgerError> {
        let _guard = self.commit_lock.lock().await;
        let key = student.student_no.as_str().as_bytes().to_vec();
        let student = match self.read::<Student>(CF_STUDENTS, &key)? {
            Some(existing) => existing,
            None => {
                self.write(CF_STUDENTS, &key, &student)?;
                student
            }
        };

        let mut existing: Vec<TuitionBalance> =
            self.read(CF_LINES, student.id.0.as_bytes())?.unwrap_or_default();
        for mut line in lines {
            line.student_id = student.id.clone();
            match existing.iter_mut().find(|l| l.matches_term(&line.term)) {
                Some(current) => current.balance = line.balance,
                None => existing.push(line),
            }
        }
        self.write(CF_LINES, student.id.0.as_bytes(), &existing)
    }

    async fn find_student(&self, student_no: &StudentNo) -> Result<Option<Student>, LedgerError> {
        self.read(CF_STUDENTS, student_no.as_str().as_bytes())
    }

    async fn balances(&self, student_id: &StudentId) -> Result<Vec<TuitionBalance>, LedgerError> {
        Ok(self.read(CF_LINES, student_id.0.as_bytes())?.unwrap_or_default())
    }

    async fn find_payment(&self, key: &IdempotencyKey) -> Result<Option<PaymentRecord>, LedgerError> {
        self.read(CF_PAYMENTS, key.0.as_bytes())
    }

    async fn commit_payment(&self, update: BalanceUpdate, record: PaymentRecord) -> Result<(), LedgerError> {
        let _guard = self.commit_lock.lock().await;

        let payment_key = record.idempotency_key.0.as_bytes();
        // Existence check only, without deserializing the value.
        if self.db.get_pinned_cf(self.cf(CF_PAYMENTS)?, payment_key)?.is_some() {
            return Err(LedgerError::DuplicatePayment(record.idempotency_key.0.clone()));
        }

        let mut lines: Vec<TuitionBalance> = self
            .read(CF_LINES, update.student_id.0.as_bytes())?
            .ok_or_else(|| LedgerError::UnknownStudent(update.student_id.0.clone()))?;
        let line = lines
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

        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_LINES)?, update.student_id.0.as_bytes(), serde_json::to_vec(&lines)?);
        batch.put_cf(self.cf(CF_PAYMENTS)?, payment_key, serde_json::to_vec(&record)?);
        self.db.write(batch)?;
        Ok(())
    }

    async fn payments(&self, student_no: &StudentNo) -> Result<Vec<PaymentRecord>, LedgerError> {
        let mut records: Vec<PaymentRecord> = self
            .scan::<PaymentRecord>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| &p.student_no == student_no)
            .collect();
        records.sort_by_key(|p| p.recorded_at);
        Ok(records)
    }

    async fn snapshot(&self) -> Result<Vec<(Student, Vec<TuitionBalance>)>, LedgerError> {
        let mut students = self.scan::<Student>(CF_STUDENTS)?;
        students.sort_by(|a, b| a.student_no.cmp(&b.student_no));
        students
            .into_iter()
            .map(|student| {
                let lines = self.read(CF_LINES, student.id.0.as_bytes())?.unwrap_or_default();
                Ok((student, lines))
            })
            .collect()
    }
}
