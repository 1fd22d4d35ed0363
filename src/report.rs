use crate::error::Error;
use crate::models::datetime_utils::{DATE_FORMAT, TIMESTAMP_FORMAT};
use crate::models::{DelegationRecord, EpochTotal, FixedPoint};
use std::io::Write;

const CSV_HEADER: [&str; 3] = ["Epoch time (UTC)", "Transaction ID", "Rewards (FLOW)"];

/// Writes the report as it is produced: delegation summary, one CSV row per
/// epoch, then the grand total. Each line is flushed as soon as it is written.
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write_delegations(&mut self, records: &[DelegationRecord]) -> Result<(), Error> {
        writeln!(self.out, "You have delegated to:")?;
        for record in records {
            let start = record
                .created_at
                .map(|t| t.format(DATE_FORMAT).to_string())
                .unwrap_or_else(|| "unknown".to_string());
            writeln!(
                self.out,
                "- Node: {} (Delegator: {}, Start Date: {})",
                record.node_id, record.delegator_id, start
            )?;
        }
        writeln!(self.out)?;
        writeln!(self.out, "Rewards received:")?;
        self.write_row(CSV_HEADER)
    }

    pub fn write_epoch(&mut self, epoch: &EpochTotal) -> Result<(), Error> {
        self.write_row([
            epoch.epoch.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            epoch.epoch.transaction_id.clone(),
            epoch.total.to_string(),
        ])
    }

    pub fn write_grand_total(&mut self, total: FixedPoint) -> Result<(), Error> {
        writeln!(self.out)?;
        writeln!(self.out, "Grand total: {} FLOW", total)?;
        self.out.flush()?;
        Ok(())
    }

    // Rows share the sink with the free-text lines, so each one goes through
    // its own CSV writer and is flushed before returning.
    fn write_row<I, T>(&mut self, record: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut row = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(&mut self.out);
        row.write_record(record)?;
        row.flush()?;
        Ok(())
    }
}
