//! SQLite output sink
//!
//! Each job writes to its own table in the database file, so the listing and
//! details crawls can share one database. Rows of a unit are inserted in a
//! single transaction, which makes every `append` all-or-nothing.

use crate::output::traits::{
    header, OutputError, OutputResult, OutputSink, Record, SinkMode, SinkStatus, TabularRow,
};
use crate::state::WorkUnit;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// SQLite table sink for one job
pub struct SqliteSink<T> {
    path: PathBuf,
    table: String,
    conn: Option<Connection>,
    _row: PhantomData<fn() -> T>,
}

impl<T: TabularRow> SqliteSink<T> {
    /// Creates a new SQLite sink
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `table` - Table holding this job's rows
    ///
    /// # Returns
    ///
    /// A sink that opens the database lazily
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
            conn: None,
            _row: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(path: &Path) -> OutputResult<Connection> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        Ok(conn)
    }

    /// Opens the existing database read-side without creating the file
    fn existing_connection(&self) -> OutputResult<Option<Connection>> {
        if !self.path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::connect(&self.path)?))
    }

    fn quoted_table(&self) -> String {
        quote_ident(&self.table)
    }

    fn table_exists(&self, conn: &Connection) -> OutputResult<bool> {
        let found: Option<String> = conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![self.table],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn check_columns(&self, conn: &Connection) -> OutputResult<()> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let found = stmt
            .query_map(params![self.table], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let expected = header::<T>();

        if found.iter().map(String::as_str).eq(expected.iter().copied()) {
            Ok(())
        } else {
            Err(OutputError::SchemaMismatch {
                expected: expected.iter().map(|c| c.to_string()).collect(),
                found,
            })
        }
    }

    fn create_table(&self, conn: &Connection) -> OutputResult<()> {
        let columns = T::COLUMNS
            .iter()
            .map(|c| format!("{} TEXT", quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let unit = quote_ident(T::UNIT_COLUMN);

        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} ({unit} INTEGER NOT NULL, {columns});
             CREATE INDEX IF NOT EXISTS {index} ON {table} ({unit});",
            table = self.quoted_table(),
            unit = unit,
            columns = columns,
            index = quote_ident(&format!("idx_{}_unit", self.table)),
        ))?;
        Ok(())
    }

    fn select_sql(&self) -> String {
        let columns = header::<T>()
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "SELECT {} FROM {} ORDER BY {}, rowid",
            columns,
            self.quoted_table(),
            quote_ident(T::UNIT_COLUMN)
        )
    }

    fn insert_sql(&self) -> String {
        let columns = header::<T>();
        let placeholders = (1..=columns.len())
            .map(|i| format!("?{}", i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quoted_table(),
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            placeholders
        )
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn unit_to_db(unit: WorkUnit) -> i64 {
    unit.index() as i64
}

fn unit_from_db(value: i64) -> WorkUnit {
    WorkUnit(value.max(0) as u64)
}

impl<T: TabularRow> OutputSink<T> for SqliteSink<T> {
    fn location(&self) -> String {
        format!("{}#{}", self.path.display(), self.table)
    }

    fn inspect(&self) -> OutputResult<SinkStatus> {
        let Some(conn) = self.existing_connection()? else {
            return Ok(SinkStatus::Missing);
        };
        if !self.table_exists(&conn)? {
            return Ok(SinkStatus::Missing);
        }
        self.check_columns(&conn)?;

        let (rows, last): (i64, Option<i64>) = conn.query_row(
            &format!(
                "SELECT COUNT(*), MAX({}) FROM {}",
                quote_ident(T::UNIT_COLUMN),
                self.quoted_table()
            ),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(SinkStatus::Present {
            rows: rows.max(0) as u64,
            last_unit: last.map(unit_from_db),
        })
    }

    fn open(&mut self, mode: SinkMode) -> OutputResult<()> {
        let conn = Self::connect(&self.path)?;

        match mode {
            SinkMode::Fresh => {
                conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", self.quoted_table()))?;
                self.create_table(&conn)?;
            }
            SinkMode::Append => {
                if self.table_exists(&conn)? {
                    self.check_columns(&conn)?;
                } else {
                    self.create_table(&conn)?;
                }
            }
        }

        debug!("Opened {} ({:?})", self.location(), mode);
        self.conn = Some(conn);
        Ok(())
    }

    fn append(&mut self, records: &[Record<T>]) -> OutputResult<()> {
        let sql = self.insert_sql();
        let location = self.location();
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| OutputError::NotOpen(location))?;

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for record in records {
                let values = std::iter::once(Value::Integer(unit_to_db(record.unit))).chain(
                    record
                        .data
                        .to_fields()
                        .into_iter()
                        .map(|field| field.map_or(Value::Null, Value::Text)),
                );
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn truncate_after(&mut self, last_kept: Option<WorkUnit>) -> OutputResult<u64> {
        self.conn = None;

        let Some(conn) = self.existing_connection()? else {
            return Ok(0);
        };
        if !self.table_exists(&conn)? {
            return Ok(0);
        }

        let removed = match last_kept {
            Some(unit) => conn.execute(
                &format!(
                    "DELETE FROM {} WHERE {} > ?1",
                    self.quoted_table(),
                    quote_ident(T::UNIT_COLUMN)
                ),
                params![unit_to_db(unit)],
            )?,
            None => conn.execute(&format!("DELETE FROM {}", self.quoted_table()), [])?,
        };

        if removed > 0 {
            warn!(
                "Truncated {} row(s) of unfinished work from {}",
                removed,
                self.location()
            );
        }
        Ok(removed as u64)
    }

    fn read_records(&self) -> OutputResult<Vec<Record<T>>> {
        let Some(conn) = self.existing_connection()? else {
            return Ok(Vec::new());
        };
        if !self.table_exists(&conn)? {
            return Ok(Vec::new());
        }
        self.check_columns(&conn)?;

        let mut stmt = conn.prepare(&self.select_sql())?;
        let rows = stmt
            .query_map([], |row| {
                let unit: i64 = row.get(0)?;
                let fields = (1..=T::COLUMNS.len())
                    .map(|i| row.get::<_, Option<String>>(i))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((unit, fields))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (unit, fields) in rows {
            match T::from_fields(&fields) {
                Some(data) => records.push(Record::new(unit_from_db(unit), data)),
                None => warn!("Skipping malformed row in {}", self.location()),
            }
        }
        Ok(records)
    }

    fn remove(&mut self) -> OutputResult<()> {
        self.conn = None;

        if let Some(conn) = self.existing_connection()? {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", self.quoted_table()))?;
        }
        Ok(())
    }
}
