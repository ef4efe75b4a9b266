//! # chronicle-core
//!
//! Core library for chronicle - an append-only, hash-chained state ledger.
//!
//! The ledger captures four dimensions of system state - source code
//! identity, configuration, runtime environment, and external data
//! mutations - so that the declared state at any past moment can be
//! reconstructed and the ledger's integrity proven cryptographically.
//!
//! ## Features
//!
//! - **Record Store**: durable SQLite-backed append-only log with
//!   hash-chain sealing and indexed time lookup
//! - **Chain Verifier**: walks the log recomputing each link and produces
//!   a pass/fail proof
//! - **Reconstructor**: assembles a typed snapshot at a target time,
//!   orders mutations, and scores determinism
//! - **Audit Bundle**: self-contained report plus proof for offline
//!   third-party verification
//! - **Blob Store**: content-addressed artifact storage keyed by SHA-256
//!
//! ## Example
//!
//! ```rust,no_run
//! use chronicle_core::ingest::Ingestor;
//! use chronicle_core::payload::RecordKind;
//! use chronicle_core::store::Ledger;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Ledger::open("/path/to/ledger.db")?;
//! let ingestor = Ingestor::new(&ledger);
//!
//! let record = ingestor.ingest(
//!     RecordKind::Code,
//!     r#"{"repo":"app","commit":"abc1234"}"#,
//!     "ci-pipeline",
//!     0,
//! )?;
//! assert_eq!(record.id, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod blob;
pub mod bundle;
pub mod canonical;
pub mod determinism;
pub mod hash;
pub mod ingest;
pub mod payload;
pub mod reconstruct;
pub mod snapshot;
pub mod store;
pub mod verify;

pub use bundle::AuditBundle;
pub use ingest::Ingestor;
pub use payload::RecordKind;
pub use reconstruct::{ReconstructionReport, Reconstructor};
pub use store::{Ledger, LedgerError, Record, RecordInput};
pub use verify::VerifyReport;
