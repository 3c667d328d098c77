use crate::domain::ledger::{Student, TuitionBalance};
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct BalanceRow<'a> {
    student_no: &'a str,
    term: &'a str,
    balance: String,
}

/// Writes the ledger's tuition lines as CSV.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per tuition line, then flushes.
    pub fn write_balances(&mut self, ledger: &[(Student, Vec<TuitionBalance>)]) -> Result<()> {
        for (student, lines) in ledger {
            for line in lines {
                self.writer.serialize(BalanceRow {
                    student_no: student.student_no.as_str(),
                    term: &line.term,
                    balance: line.balance.to_string(),
                })?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}
