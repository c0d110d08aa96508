use docscan_core::{NormalizedRecord, StoredRow};
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("{path} is not a record store: unexpected header {found:?}")]
    HeaderMismatch { path: PathBuf, found: Vec<String> },
}

/// Append-only CSV file of extracted records.
///
/// Every append opens the file, takes an exclusive lock, numbers the row
/// from the rows already present, writes it and closes the file again.
/// Appenders in other threads or processes wait for the lock, so numbering
/// stays gapless.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    /// The file is created on the first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number `record` and append it, writing the header first if the file is new.
    pub fn append(&self, record: &NormalizedRecord) -> Result<StoredRow, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.lock()?;

        let is_new = file.metadata()?.len() == 0;
        let existing = if is_new { 0 } else { self.count_rows(&mut file)? };
        let row = StoredRow::from_record(existing + 1, record);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut file);
        if is_new {
            writer.write_record(StoredRow::HEADER)?;
        }
        writer.serialize(&row)?;
        writer.flush()?;
        drop(writer);

        file.unlock()?;
        tracing::info!(path = %self.path.display(), sr_no = row.sr_no, filename = %row.filename, "Appended record");
        Ok(row)
    }

    /// All stored rows in file order. A store that was never written is empty.
    pub fn rows(&self) -> Result<Vec<StoredRow>, StoreError> {
        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut reader = csv::Reader::from_reader(&mut file);
        self.check_header(&mut reader)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<StoredRow>, _>>()?;
        Ok(rows)
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        Ok(self.rows()?.len() as u64)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn count_rows(&self, file: &mut File) -> Result<u64, StoreError> {
        file.seek(SeekFrom::Start(0))?;
        let mut reader = csv::Reader::from_reader(file);
        self.check_header(&mut reader)?;
        let mut count = 0;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    fn check_header<R: std::io::Read>(&self, reader: &mut csv::Reader<R>) -> Result<(), StoreError> {
        let headers = reader.headers()?;
        if headers.iter().ne(StoredRow::HEADER) {
            return Err(StoreError::HeaderMismatch {
                path: self.path.clone(),
                found: headers.iter().map(str::to_string).collect(),
            });
        }
        Ok(())
    }
}
