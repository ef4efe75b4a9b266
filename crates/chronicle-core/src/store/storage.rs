//! `SQLite`-backed record store implementation.
//!
//! The [`Ledger`] struct owns a single write connection behind a mutex;
//! that mutex is the single-writer lock. Readers either share the handle
//! (WAL keeps them consistent) or open a dedicated read-only connection
//! via [`Ledger::open_reader`].

// SQLite returns i64 for row ids and counts, but they're always
// non-negative here. Mutex poisoning indicates a panic in another thread,
// which is unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::missing_panics_doc
)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::hash;

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Bounded connect timeout applied to every connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(3);

/// Columns of the `ledger_records` table, in declaration order.
const COLUMNS: [&str; 7] = ["id", "ts", "type", "source", "payload", "hash", "prev_hash"];

/// Default cap for [`Ledger::list`] when the caller passes zero or a
/// negative limit.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record input failed the append-time checks.
    #[error("invalid record input: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// No record exists with the requested id.
    #[error("record not found: id={id}")]
    NotFound {
        /// The id that was not found.
        id: u64,
    },

    /// The store file exists but its schema does not match.
    #[error("corrupt schema: {details}")]
    CorruptSchema {
        /// Details about the mismatch.
        details: String,
    },
}

/// A single sealed record in the ledger.
///
/// Records are exposed by value; the store itself treats them as read-only
/// after commit. Tampering with any stored field breaks the chain at that
/// point or later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Dense, strictly increasing sequence number, assigned at commit.
    pub id: u64,
    /// Seconds since epoch, supplied by the ingestor.
    pub timestamp: i64,
    /// Record kind (`code`, `config`, `environment`, `mutation`, or a
    /// free-form tag for raw appends).
    #[serde(rename = "type")]
    pub kind: String,
    /// Free-form origin tag.
    pub source: String,
    /// Canonical payload bytes, stored verbatim.
    pub payload: String,
    /// Link hash sealing this record.
    pub hash: String,
    /// Hash of the record with the immediately preceding id, empty for the
    /// first record.
    pub prev_hash: String,
}

/// Input to an append: everything but the store-assigned fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordInput {
    /// Seconds since epoch; zero means wall clock at commit.
    pub timestamp: i64,
    /// Record kind; must be non-blank and pipe-free.
    pub kind: String,
    /// Origin tag; must be pipe-free.
    pub source: String,
    /// Payload bytes; must be non-blank.
    pub payload: String,
}

/// Statistics about the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerStats {
    /// Total number of records.
    pub record_count: u64,
    /// Highest id (0 if empty).
    pub max_id: u64,
    /// Database file size in bytes.
    pub db_size_bytes: u64,
}

/// The append-only record store backed by `SQLite`.
#[derive(Debug)]
pub struct Ledger {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Opens or creates a store at the specified path.
    ///
    /// The schema is initialized on first open. An existing file whose
    /// `ledger_records` table does not match the expected columns is
    /// rejected.
    ///
    /// # Errors
    ///
    /// Returns `Io`/`Database` if the file cannot be opened, or
    /// `CorruptSchema` if the table shape is wrong.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_connection(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    fn initialize_connection(conn: &Connection) -> Result<(), LedgerError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // Check any pre-existing table shape before the schema batch runs,
        // so a foreign database surfaces as CorruptSchema rather than a
        // failed index build.
        Self::check_schema(conn)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    /// Verifies the table shape of an existing database. A missing table
    /// is fine; the schema batch creates it.
    fn check_schema(conn: &Connection) -> Result<(), LedgerError> {
        let columns: Vec<String> = conn
            .prepare("PRAGMA table_info(ledger_records)")?
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;

        if !columns.is_empty() && columns != COLUMNS {
            return Err(LedgerError::CorruptSchema {
                details: format!("ledger_records columns are {columns:?}, expected {COLUMNS:?}"),
            });
        }
        Ok(())
    }

    /// Appends a single record, sealing it into the chain.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the input is rejected, or a storage error;
    /// on error nothing becomes visible.
    pub fn append_one(&self, input: &RecordInput) -> Result<Record, LedgerError> {
        let mut sealed = self.append_batch(std::slice::from_ref(input))?;
        Ok(sealed.pop().expect("batch of one yields one record"))
    }

    /// Appends multiple records in a single transaction.
    ///
    /// The chain of prev-links is built as though each record were appended
    /// in sequence. All-or-nothing: on any error, no record becomes
    /// visible and the chain tip is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a rejected input (checked for the whole
    /// batch before anything is written) or a storage error.
    pub fn append_batch(&self, inputs: &[RecordInput]) -> Result<Vec<Record>, LedgerError> {
        for input in inputs {
            validate_input(input)?;
        }
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.lock().unwrap();
        // Immediate: take the write lock before reading the tip, so the
        // tip cannot move between the read and the inserts even if a
        // second handle is writing.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut prev_hash = tip_hash(&tx)?;
        let mut sealed = Vec::with_capacity(inputs.len());

        {
            let mut stmt = tx.prepare(
                "INSERT INTO ledger_records (ts, type, source, payload, hash, prev_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for input in inputs {
                let timestamp = if input.timestamp == 0 {
                    now_unix()
                } else {
                    input.timestamp
                };
                let link = hash::link_hash(
                    &prev_hash,
                    timestamp,
                    &input.kind,
                    &input.source,
                    &input.payload,
                );
                stmt.execute(params![
                    timestamp,
                    input.kind,
                    input.source,
                    input.payload,
                    link,
                    prev_hash,
                ])?;
                sealed.push(Record {
                    id: tx.last_insert_rowid() as u64,
                    timestamp,
                    kind: input.kind.clone(),
                    source: input.source.clone(),
                    payload: input.payload.clone(),
                    hash: link.clone(),
                    prev_hash,
                });
                prev_hash = link;
            }
        }

        tx.commit()?;
        debug!(count = sealed.len(), tip = %prev_hash, "sealed records");
        Ok(sealed)
    }

    /// Reads a single record by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists with that id.
    pub fn get_by_id(&self, id: u64) -> Result<Record, LedgerError> {
        let conn = self.conn.lock().unwrap();
        get_by_id_on(&conn, id)
    }

    /// Lists records with `timestamp` in the closed interval
    /// `[since, until]`, in ascending id order.
    ///
    /// A zero bound means unbounded on that side. `limit` caps the result;
    /// zero or negative means the default of 100.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, since: i64, until: i64, limit: i64) -> Result<Vec<Record>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        list_on(&conn, since, until, limit)
    }

    /// Reads records with `id >= cursor` in ascending id order, up to
    /// `limit`. Used by the chain verifier to stream the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn read_from(&self, cursor: u64, limit: u64) -> Result<Vec<Record>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, ts, type, source, payload, hash, prev_hash
             FROM ledger_records
             WHERE id >= ?1
             ORDER BY id ASC
             LIMIT ?2",
        )?;
        let records = stmt
            .query_map(params![cursor, limit], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Like [`Ledger::read_from`] but restricted to records with
    /// `timestamp <= until`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn read_from_up_to(
        &self,
        cursor: u64,
        until: i64,
        limit: u64,
    ) -> Result<Vec<Record>, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn.prepare(
            "SELECT id, ts, type, source, payload, hash, prev_hash
             FROM ledger_records
             WHERE id >= ?1 AND ts <= ?2
             ORDER BY id ASC
             LIMIT ?3",
        )?;
        let records = stmt
            .query_map(params![cursor, until, limit], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Returns the current chain tip hash, or the empty string for an
    /// empty store.
    ///
    /// The tip is always read from the store, never cached on the handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn last_hash(&self) -> Result<String, LedgerError> {
        let conn = self.conn.lock().unwrap();
        tip_hash(&conn)
    }

    /// Gets statistics about the store.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let conn = self.conn.lock().unwrap();

        let record_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM ledger_records", [], |row| row.get(0))?;
        let max_id: Option<i64> =
            conn.query_row("SELECT MAX(id) FROM ledger_records", [], |row| row.get(0))?;

        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |row| row.get(0))?;

        Ok(LedgerStats {
            record_count: record_count as u64,
            max_id: max_id.unwrap_or(0) as u64,
            db_size_bytes: (page_count * page_size) as u64,
        })
    }

    /// Opens a read-only connection for concurrent reads.
    ///
    /// # Errors
    ///
    /// Returns an error for in-memory stores or if the connection cannot
    /// be opened.
    pub fn open_reader(&self) -> Result<LedgerReader, LedgerError> {
        let path = self.path.as_ref().ok_or_else(|| {
            LedgerError::Io(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "cannot create reader for in-memory store",
            ))
        })?;

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        Ok(LedgerReader {
            conn: Mutex::new(conn),
        })
    }

    /// Closes the store, flushing the underlying connection.
    ///
    /// Dropping the handle has the same effect; this exists for callers
    /// that want the close error surfaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be closed cleanly.
    pub fn close(self) -> Result<(), LedgerError> {
        if let Ok(mutex) = Arc::try_unwrap(self.conn) {
            let conn = mutex.into_inner().unwrap();
            conn.close().map_err(|(_, e)| LedgerError::Database(e))?;
        }
        Ok(())
    }
}

/// A read-only view of the store for concurrent reads.
pub struct LedgerReader {
    conn: Mutex<Connection>,
}

impl LedgerReader {
    /// Reads a single record by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no record exists with that id.
    pub fn get_by_id(&self, id: u64) -> Result<Record, LedgerError> {
        let conn = self.conn.lock().unwrap();
        get_by_id_on(&conn, id)
    }

    /// Lists records by closed time interval, ascending id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, since: i64, until: i64, limit: i64) -> Result<Vec<Record>, LedgerError> {
        let conn = self.conn.lock().unwrap();
        list_on(&conn, since, until, limit)
    }
}

fn validate_input(input: &RecordInput) -> Result<(), LedgerError> {
    if input.kind.trim().is_empty() {
        return Err(LedgerError::Validation {
            reason: "kind required".to_string(),
        });
    }
    if input.payload.trim().is_empty() {
        return Err(LedgerError::Validation {
            reason: "payload required".to_string(),
        });
    }
    // The link hash joins fields with '|'; kind and source must stay
    // pipe-free or the encoding becomes ambiguous.
    if input.kind.contains('|') {
        return Err(LedgerError::Validation {
            reason: "kind must not contain '|'".to_string(),
        });
    }
    if input.source.contains('|') {
        return Err(LedgerError::Validation {
            reason: "source must not contain '|'".to_string(),
        });
    }
    Ok(())
}

fn tip_hash(conn: &Connection) -> Result<String, LedgerError> {
    let tip: Option<String> = conn
        .query_row(
            "SELECT hash FROM ledger_records ORDER BY id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(tip.unwrap_or_default())
}

fn get_by_id_on(conn: &Connection, id: u64) -> Result<Record, LedgerError> {
    let mut stmt = conn.prepare(
        "SELECT id, ts, type, source, payload, hash, prev_hash
         FROM ledger_records
         WHERE id = ?1",
    )?;
    stmt.query_row(params![id], row_to_record).map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => LedgerError::NotFound { id },
        other => LedgerError::Database(other),
    })
}

fn list_on(conn: &Connection, since: i64, until: i64, limit: i64) -> Result<Vec<Record>, LedgerError> {
    let limit = if limit <= 0 { DEFAULT_LIST_LIMIT } else { limit };

    let mut query = String::from(
        "SELECT id, ts, type, source, payload, hash, prev_hash FROM ledger_records",
    );
    let mut args: Vec<i64> = Vec::new();
    let mut clauses: Vec<&str> = Vec::new();

    if since > 0 {
        clauses.push("ts >= ?");
        args.push(since);
    }
    if until > 0 {
        clauses.push("ts <= ?");
        args.push(until);
    }
    if !clauses.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&clauses.join(" AND "));
    }
    query.push_str(" ORDER BY id ASC LIMIT ?");
    args.push(limit);

    let mut stmt = conn.prepare(&query)?;
    let records = stmt
        .query_map(rusqlite::params_from_iter(args), row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get::<_, i64>(0)? as u64,
        timestamp: row.get(1)?,
        kind: row.get(2)?,
        source: row.get(3)?,
        payload: row.get(4)?,
        hash: row.get(5)?,
        prev_hash: row.get(6)?,
    })
}

/// Wall clock in whole seconds since the Unix epoch.
pub(crate) fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
