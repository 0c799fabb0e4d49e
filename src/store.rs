use log::{debug, info, warn};
use std::collections::HashSet;
use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::models::ApplicationRecord;

/// On-disk header, in order. Must match the field order of `ApplicationRecord`.
pub const COLUMNS: [&str; 8] = [
    "Job Title",
    "Company",
    "Location",
    "Link",
    "Cover Letter Path",
    "Status",
    "Match Score",
    "Deadline",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderLayout {
    Current,
    MissingDeadline,
}

pub struct ApplicationStore {
    path: PathBuf,
}

impl ApplicationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header() -> &'static [&'static str] {
        &COLUMNS
    }

    /// Reads the whole log. A missing or empty file is an empty table.
    pub fn load(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        if self.is_blank()? {
            debug!("no application log at {}", self.path.display());
            return Ok(Vec::new());
        }

        let (_, records) = self.read_table()?;
        debug!("loaded {} applications from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Adds one row. Existing rows are never rewritten, except that a log
    /// without the `Deadline` column is upgraded to the full header first.
    pub fn append(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        let needs_header = self.is_blank()?;

        if !needs_header {
            let (layout, mut existing) = self.read_table()?;
            if existing.iter().any(|row| dedup_key(row) == dedup_key(record)) {
                warn!(
                    "'{}' at '{}' is already in the log; adding a duplicate row",
                    record.title, record.company
                );
            }

            if layout == HeaderLayout::MissingDeadline {
                info!("adding Deadline column to {}", self.path.display());
                existing.push(record.clone());
                return self.overwrite(&existing);
            }

            if !self.ends_with_newline()? {
                debug!("terminating last row of {}", self.path.display());
                self.open_for_append()?
                    .write_all(b"\n")
                    .map_err(|e| self.io_error(e))?;
            }
        }

        self.ensure_parent()?;
        let file = self.open_for_append()?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(record).map_err(|e| self.csv_error(e))?;
        writer.flush().map_err(|e| self.io_error(e))?;

        info!("logged '{}' at '{}' to {}", record.title, record.company, self.path.display());
        Ok(())
    }

    /// Replaces the whole log with `records`.
    pub fn overwrite(&self, records: &[ApplicationRecord]) -> Result<(), StoreError> {
        self.ensure_parent()?;
        let tmp_path = self.tmp_path();

        {
            let mut writer = csv::Writer::from_path(&tmp_path).map_err(|e| self.csv_error(e))?;
            if records.is_empty() {
                writer.write_record(COLUMNS).map_err(|e| self.csv_error(e))?;
            }
            for record in records {
                writer.serialize(record).map_err(|e| self.csv_error(e))?;
            }
            writer.flush().map_err(|e| self.io_error(e))?;
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(self.io_error(e));
        }
        info!("saved {} applications to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Loads, edits the 0-based `row` and overwrites.
    pub fn update_row<F>(&self, row: usize, edit: F) -> Result<ApplicationRecord, StoreError>
    where
        F: FnOnce(&mut ApplicationRecord),
    {
        let mut records = self.load()?;
        let len = records.len();
        let record = records
            .get_mut(row)
            .ok_or(StoreError::RowOutOfRange { row: row + 1, len })?;
        edit(record);
        let updated = record.clone();
        self.overwrite(&records)?;
        Ok(updated)
    }

    fn is_blank(&self) -> Result<bool, StoreError> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(meta.len() == 0),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Every row, failing on the first malformed one.
    fn read_table(&self) -> Result<(HeaderLayout, Vec<ApplicationRecord>), StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| self.csv_error(e))?;

        let headers = reader.headers().map_err(|e| self.csv_error(e))?.clone();
        let layout = self.check_header(&headers)?;

        let records = reader
            .deserialize()
            .collect::<Result<Vec<ApplicationRecord>, _>>()
            .map_err(|e| self.csv_error(e))?;
        Ok((layout, records))
    }

    fn check_header(&self, headers: &csv::StringRecord) -> Result<HeaderLayout, StoreError> {
        if headers.iter().eq(COLUMNS.iter().copied()) {
            return Ok(HeaderLayout::Current);
        }
        // Logs written before deadlines were tracked.
        if headers.iter().eq(COLUMNS[..COLUMNS.len() - 1].iter().copied()) {
            return Ok(HeaderLayout::MissingDeadline);
        }
        Err(StoreError::HeaderMismatch {
            path: self.path.clone(),
            expected: COLUMNS.join(", "),
            found: headers.iter().collect::<Vec<_>>().join(", "),
        })
    }

    fn ends_with_newline(&self) -> Result<bool, StoreError> {
        let mut file = fs::File::open(&self.path).map_err(|e| self.io_error(e))?;
        let mut last = [0u8; 1];
        file.seek(SeekFrom::End(-1)).map_err(|e| self.io_error(e))?;
        file.read_exact(&mut last).map_err(|e| self.io_error(e))?;
        Ok(last[0] == b'\n')
    }

    fn open_for_append(&self) -> Result<fs::File, StoreError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))
    }

    fn ensure_parent(&self) -> Result<(), StoreError> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))
            }
            _ => Ok(()),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn csv_error(&self, source: csv::Error) -> StoreError {
        StoreError::Csv {
            path: self.path.clone(),
            source,
        }
    }
}

/// Sort key putting earlier deadlines first and undated rows last.
pub fn deadline_key(record: &ApplicationRecord) -> (bool, Option<NaiveDate>) {
    (record.deadline.is_none(), record.deadline)
}

/// Ascending by deadline, undated rows last. Ties keep their relative order.
pub fn sort_by_deadline(records: &mut [ApplicationRecord]) {
    records.sort_by_key(deadline_key);
}

fn dedup_key(record: &ApplicationRecord) -> (String, String, String) {
    (
        record.title.trim().to_lowercase(),
        record.company.trim().to_lowercase(),
        record.link.trim().to_lowercase(),
    )
}

/// Indices of rows whose (title, company, link) already appeared earlier.
pub fn find_duplicates(records: &[ApplicationRecord]) -> Vec<usize> {
    let mut seen = HashSet::new();
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| !seen.insert(dedup_key(record)))
        .map(|(i, _)| i)
        .collect()
}

/// Keeps the first occurrence of each (title, company, link).
pub fn dedupe(records: Vec<ApplicationRecord>) -> Vec<ApplicationRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(dedup_key(record)))
        .collect()
}
