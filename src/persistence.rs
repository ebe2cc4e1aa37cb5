use crate::errors::TrackerError;
use crate::logger::{self, LogTag};
use crate::record::AccountRecord;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Column headers written when the backing store is created
pub const SHEET_HEADERS: [&str; 6] = [
    "Date",
    "Hash",
    "SOL count",
    "SOL usd",
    "SPL count",
    "SPL usd",
];

/// External record persister: one row per record, failures are reported to
/// the orchestrator and never abort the run.
pub trait RecordSink {
    fn persist(&mut self, record: &AccountRecord) -> Result<(), TrackerError>;
}

/// CSV-backed sink. Finds or creates the backing file and appends one row
/// per record, writing the header row on creation.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl RecordSink for CsvSink {
    fn persist(&mut self, record: &AccountRecord) -> Result<(), TrackerError> {
        let fresh = !self.path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                TrackerError::Persistence(format!("cannot open {}: {}", self.path.display(), e))
            })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if fresh {
            logger::info(
                LogTag::Sheet,
                &format!("Creating record store at {}", self.path.display()),
            );
            writer
                .write_record(SHEET_HEADERS)
                .map_err(|e| TrackerError::Persistence(format!("header write failed: {}", e)))?;
        }

        writer
            .write_record(record.to_row())
            .map_err(|e| TrackerError::Persistence(format!("row write failed: {}", e)))?;
        writer
            .flush()
            .map_err(|e| TrackerError::Persistence(format!("flush failed: {}", e)))?;

        logger::debug(
            LogTag::Sheet,
            &format!("Appended row for {}", record.account),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SENTINEL;

    #[test]
    fn test_creates_store_with_headers_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = CsvSink::new(&path);

        let mut record = AccountRecord::new("hash-1");
        record.sol_balance = "12.5".to_string();
        sink.persist(&record).unwrap();

        let record2 = AccountRecord::new("hash-2");
        sink.persist(&record2).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Date,Hash,SOL count"));
        assert!(lines[1].contains("hash-1"));
        assert!(lines[1].contains("12.5"));
        assert!(lines[2].contains("hash-2"));
        assert!(lines[2].contains(SENTINEL));
    }

    #[test]
    fn test_unwritable_path_reports_persistence_error() {
        let mut sink = CsvSink::new("/no/such/dir/results.csv");
        let err = sink.persist(&AccountRecord::new("hash")).unwrap_err();
        assert!(matches!(err, TrackerError::Persistence(_)));
    }
}
