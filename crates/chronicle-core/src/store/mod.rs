//! Record store: the durable, ordered, append-only log.
//!
//! Backed by `SQLite` with WAL mode so readers proceed while a write is in
//! progress. Every append seals the record into a hash chain keyed by the
//! previous record's hash; batches commit atomically in one transaction.
//! Records are immutable once a commit succeeds.
//!
//! # Example
//!
//! ```rust,no_run
//! use chronicle_core::store::{Ledger, RecordInput};
//!
//! # fn example() -> Result<(), chronicle_core::store::LedgerError> {
//! let ledger = Ledger::open("/path/to/ledger.db")?;
//!
//! let record = ledger.append_one(&RecordInput {
//!     timestamp: 1000,
//!     kind: "code".to_string(),
//!     source: "ci-pipeline".to_string(),
//!     payload: r#"{"commit":"abc1234","repo":"app"}"#.to_string(),
//! })?;
//! assert_eq!(record.prev_hash, "");
//! # Ok(())
//! # }
//! ```

mod storage;


pub use storage::{Ledger, LedgerError, LedgerReader, LedgerStats, Record, RecordInput};

pub(crate) use storage::now_unix;
