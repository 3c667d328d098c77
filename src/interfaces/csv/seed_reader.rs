use crate::domain::ledger::{Student, StudentId, StudentNo, TuitionBalance};
use crate::domain::money::Balance;
use crate::domain::ports::LedgerStore;
use crate::error::{AppError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

/// One row of a ledger seed file: `student_no,student_name,term,balance`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct SeedRow {
    pub student_no: String,
    #[serde(default)]
    pub student_name: Option<String>,
    pub term: String,
    pub balance: Decimal,
}

/// Reads ledger seed rows from a CSV source.
///
/// Whitespace is trimmed and record lengths are flexible, so a file without
/// the `student_name` column still loads.
pub struct SeedReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> SeedReader<R> {
    /// Creates a new `SeedReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes seed rows.
    pub fn rows(self) -> impl Iterator<Item = Result<SeedRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(AppError::from))
    }
}

/// Loads every row into `ledger`; rows of one student keep their file order.
///
/// Unreadable rows are logged and skipped. Returns the number of rows loaded.
pub async fn load_seed<R: Read>(ledger: &dyn LedgerStore, source: R) -> Result<usize> {
    let mut loaded = 0;
    for (line_no, row) in SeedReader::new(source).rows().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(row = line_no + 1, error = %err, "skipping unreadable seed row");
                continue;
            }
        };
        let student_no = match StudentNo::new(row.student_no) {
            Ok(student_no) => student_no,
            Err(err) => {
                tracing::warn!(row = line_no + 1, error = %err, "skipping seed row without a student number");
                continue;
            }
        };
        let student = Student {
            id: StudentId(format!("stu-{student_no}")),
            student_no,
            name: row.student_name.filter(|n| !n.is_empty()),
        };
        let line = TuitionBalance {
            student_id: student.id.clone(),
            term: row.term,
            balance: Balance::new(row.balance),
        };
        ledger.register(student, vec![line]).await?;
        loaded += 1;
    }
    tracing::info!(rows = loaded, "ledger seeded");
    Ok(loaded)
}
