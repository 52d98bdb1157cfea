//! Append-only JSONL ledger of pipeline passes.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directive_core::LedgerRecord;

/// Destination for completed pipeline records.
pub trait LedgerSink: Send + Sync {
    fn append(&self, record: &LedgerRecord) -> std::io::Result<()>;
}

/// One self-delimited JSON record per line, appends serialized by a mutex so
/// each record is fully written before the next begins.
pub struct JsonlLedger {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlLedger {
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replay every record in the ledger, skipping blank lines.
    pub fn stream(path: impl AsRef<Path>) -> std::io::Result<Vec<LedgerRecord>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: LedgerRecord = serde_json::from_str(&line)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            records.push(record);
        }
        Ok(records)
    }
}

impl LedgerSink for JsonlLedger {
    fn append(&self, record: &LedgerRecord) -> std::io::Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = self.file.lock().expect("ledger mutex poisoned");
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }
}

/// In-memory sink for tests.
#[derive(Default)]
pub struct MemoryLedger {
    records: Mutex<Vec<LedgerRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LedgerRecord> {
        self.records.lock().expect("ledger mutex poisoned").clone()
    }
}

impl LedgerSink for MemoryLedger {
    fn append(&self, record: &LedgerRecord) -> std::io::Result<()> {
        self.records
            .lock()
            .expect("ledger mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}
