//! CSV output sink
//!
//! Rows are written with the unit column first. A crash part-way through a
//! unit can leave a torn final line; readers treat the first unparsable row
//! as end-of-data and `truncate_after` cuts the file back before it.

use crate::output::traits::{
    header, OutputError, OutputResult, OutputSink, Record, SinkMode, SinkStatus, TabularRow,
};
use crate::state::WorkUnit;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use std::fs::{self, File, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// CSV file sink for one job
pub struct CsvSink<T> {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
    _row: PhantomData<fn() -> T>,
}

impl<T: TabularRow> CsvSink<T> {
    /// Creates a sink for the given file; nothing is touched until `open`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            _row: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn reader(&self) -> OutputResult<csv::Reader<File>> {
        Ok(ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)?)
    }

    /// Fails unless the file's header matches the row type's columns
    fn check_header(reader: &mut csv::Reader<File>) -> OutputResult<()> {
        let expected = header::<T>();
        let found = reader.headers()?;

        if found.iter().eq(expected.iter().copied()) {
            Ok(())
        } else {
            Err(OutputError::SchemaMismatch {
                expected: expected.iter().map(|c| c.to_string()).collect(),
                found: found.iter().map(str::to_string).collect(),
            })
        }
    }

    fn is_empty_file(&self) -> OutputResult<bool> {
        Ok(fs::metadata(&self.path)?.len() == 0)
    }

    fn write_header(writer: &mut csv::Writer<File>) -> OutputResult<()> {
        writer.write_record(header::<T>())?;
        writer.flush()?;
        Ok(())
    }

    fn close(&mut self) -> OutputResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Parses one stored row into its unit and data fields
fn parse_row<T: TabularRow>(row: &StringRecord) -> Option<(WorkUnit, Vec<Option<String>>)> {
    let unit = row.get(0)?.trim().parse::<u64>().ok().map(WorkUnit)?;
    let fields = row
        .iter()
        .skip(1)
        .map(|cell| (!cell.is_empty()).then(|| cell.to_string()))
        .collect::<Vec<_>>();

    (fields.len() == T::COLUMNS.len()).then_some((unit, fields))
}

impl<T: TabularRow> OutputSink<T> for CsvSink<T> {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn inspect(&self) -> OutputResult<SinkStatus> {
        if !self.path.exists() {
            return Ok(SinkStatus::Missing);
        }
        if self.is_empty_file()? {
            return Ok(SinkStatus::Present {
                rows: 0,
                last_unit: None,
            });
        }

        let mut reader = self.reader()?;
        Self::check_header(&mut reader)?;

        let mut rows = 0;
        let mut last_unit = None;
        let mut row = StringRecord::new();

        loop {
            match reader.read_record(&mut row) {
                Ok(true) => match parse_row::<T>(&row) {
                    Some((unit, _)) => {
                        rows += 1;
                        last_unit = Some(unit);
                    }
                    None => break,
                },
                Ok(false) => break,
                Err(e) => {
                    debug!("Stopping at unreadable row in {}: {}", self.location(), e);
                    break;
                }
            }
        }

        Ok(SinkStatus::Present { rows, last_unit })
    }

    fn open(&mut self, mode: SinkMode) -> OutputResult<()> {
        self.close()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let writer = match mode {
            SinkMode::Fresh => {
                let file = File::create(&self.path)?;
                let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
                Self::write_header(&mut writer)?;
                writer
            }
            SinkMode::Append => {
                let needs_header = !self.path.exists() || self.is_empty_file()?;
                if !needs_header {
                    Self::check_header(&mut self.reader()?)?;
                }

                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
                if needs_header {
                    Self::write_header(&mut writer)?;
                }
                writer
            }
        };

        debug!("Opened {} ({:?})", self.location(), mode);
        self.writer = Some(writer);
        Ok(())
    }

    fn append(&mut self, records: &[Record<T>]) -> OutputResult<()> {
        let location = self.location();
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| OutputError::NotOpen(location))?;

        for record in records {
            let mut row = Vec::with_capacity(T::COLUMNS.len() + 1);
            row.push(record.unit.to_string());
            row.extend(
                record
                    .data
                    .to_fields()
                    .into_iter()
                    .map(Option::unwrap_or_default),
            );
            writer.write_record(&row)?;
        }

        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }

    fn truncate_after(&mut self, last_kept: Option<WorkUnit>) -> OutputResult<u64> {
        self.close()?;

        if !self.path.exists() || self.is_empty_file()? {
            return Ok(0);
        }

        let mut reader = self.reader()?;
        Self::check_header(&mut reader)?;

        let mut cut_at = None;
        let mut removed = 0;
        let mut row = StringRecord::new();

        loop {
            let offset = reader.position().byte();
            match reader.read_record(&mut row) {
                Ok(true) => {
                    let keep = cut_at.is_none()
                        && matches!(
                            (parse_row::<T>(&row), last_kept),
                            (Some((unit, _)), Some(kept)) if unit <= kept
                        );
                    if !keep {
                        cut_at.get_or_insert(offset);
                        removed += 1;
                    }
                }
                Ok(false) => break,
                Err(_) => {
                    cut_at.get_or_insert(offset);
                    break;
                }
            }
        }
        drop(reader);

        if let Some(offset) = cut_at {
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(offset)?;
            file.sync_all()?;
            warn!(
                "Truncated {} row(s) of unfinished work from {}",
                removed,
                self.location()
            );
        }

        Ok(removed)
    }

    fn read_records(&self) -> OutputResult<Vec<Record<T>>> {
        if !self.path.exists() || self.is_empty_file()? {
            return Ok(Vec::new());
        }

        let mut reader = self.reader()?;
        Self::check_header(&mut reader)?;

        let mut records = Vec::new();
        let mut row = StringRecord::new();

        loop {
            match reader.read_record(&mut row) {
                Ok(true) => {
                    let parsed = parse_row::<T>(&row)
                        .and_then(|(unit, fields)| T::from_fields(&fields).map(|d| (unit, d)));
                    match parsed {
                        Some((unit, data)) => records.push(Record::new(unit, data)),
                        None => {
                            warn!("Skipping malformed row in {}", self.location());
                        }
                    }
                }
                Ok(false) => break,
                Err(e) => {
                    warn!("Stopping at unreadable row in {}: {}", self.location(), e);
                    break;
                }
            }
        }

        Ok(records)
    }

    fn remove(&mut self) -> OutputResult<()> {
        self.close()?;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OrganizationSummary;
    use std::io::Write;
    use tempfile::TempDir;

    fn org(unit: u64, name: &str) -> Record<OrganizationSummary> {
        Record::new(
            WorkUnit(unit),
            OrganizationSummary::new(name, format!("https://x/{}", name.to_lowercase())),
        )
    }

    fn sink(dir: &TempDir) -> CsvSink<OrganizationSummary> {
        CsvSink::new(dir.path().join("orgs.csv"))
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert_eq!(sink(&dir).inspect().unwrap(), SinkStatus::Missing);
    }

    #[test]
    fn test_fresh_header_only() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        out.open(SinkMode::Fresh).unwrap();

        let content = fs::read_to_string(out.path()).unwrap();
        assert_eq!(content, "page_number,organization_name,organization_url\n");
        assert_eq!(
            out.inspect().unwrap(),
            SinkStatus::Present {
                rows: 0,
                last_unit: None
            }
        );
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        out.open(SinkMode::Fresh).unwrap();
        out.append(&[org(0, "Acme"), org(0, "Zeta")]).unwrap();
        out.append(&[org(2, "Beta")]).unwrap();

        let status = out.inspect().unwrap();
        assert_eq!(
            status,
            SinkStatus::Present {
                rows: 3,
                last_unit: Some(WorkUnit(2))
            }
        );

        let records = out.read_records().unwrap();
        assert_eq!(records, vec![org(0, "Acme"), org(0, "Zeta"), org(2, "Beta")]);
    }

    #[test]
    fn test_append_mode_keeps_rows() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        out.open(SinkMode::Fresh).unwrap();
        out.append(&[org(0, "Acme")]).unwrap();

        let mut reopened = sink(&dir);
        reopened.open(SinkMode::Append).unwrap();
        reopened.append(&[org(1, "Beta")]).unwrap();

        assert_eq!(reopened.read_records().unwrap().len(), 2);
    }

    #[test]
    fn test_append_without_open_fails() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        assert!(matches!(
            out.append(&[org(0, "Acme")]),
            Err(OutputError::NotOpen(_))
        ));
    }

    #[test]
    fn test_header_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orgs.csv");
        fs::write(&path, "name,url\nAcme,https://x/acme\n").unwrap();

        let out: CsvSink<OrganizationSummary> = CsvSink::new(&path);
        assert!(matches!(
            out.inspect(),
            Err(OutputError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_truncate_after_drops_later_units() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        out.open(SinkMode::Fresh).unwrap();
        out.append(&[org(0, "Acme")]).unwrap();
        out.append(&[org(1, "Beta"), org(1, "Gamma")]).unwrap();

        let removed = out.truncate_after(Some(WorkUnit(0))).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(out.read_records().unwrap(), vec![org(0, "Acme")]);
    }

    #[test]
    fn test_truncate_all() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        out.open(SinkMode::Fresh).unwrap();
        out.append(&[org(0, "Acme")]).unwrap();

        assert_eq!(out.truncate_after(None).unwrap(), 1);
        assert_eq!(
            out.inspect().unwrap(),
            SinkStatus::Present {
                rows: 0,
                last_unit: None
            }
        );
    }

    #[test]
    fn test_torn_row_is_cut() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        out.open(SinkMode::Fresh).unwrap();
        out.append(&[org(0, "Acme")]).unwrap();
        drop(out);

        let path = dir.path().join("orgs.csv");
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "1,Bet").unwrap();
        drop(file);

        let mut out = sink(&dir);
        assert_eq!(
            out.inspect().unwrap(),
            SinkStatus::Present {
                rows: 1,
                last_unit: Some(WorkUnit(0))
            }
        );

        out.truncate_after(Some(WorkUnit(0))).unwrap();
        out.open(SinkMode::Append).unwrap();
        out.append(&[org(1, "Beta")]).unwrap();

        assert_eq!(
            out.read_records().unwrap(),
            vec![org(0, "Acme"), org(1, "Beta")]
        );
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        let mut out = sink(&dir);
        out.open(SinkMode::Fresh).unwrap();
        out.remove().unwrap();

        assert!(!out.path().exists());
        assert_eq!(out.inspect().unwrap(), SinkStatus::Missing);
    }
}
