//! Command implementations.
//!
//! Every command opens the store under the shared `--root`, runs one core
//! operation, and prints its result. Errors bubble to `main` and exit 1;
//! clap handles usage errors with exit 2.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chronicle_core::store::Ledger;

use crate::PayloadArgs;

pub mod advisory;
pub mod append;
pub mod artifact;
pub mod audit;
pub mod collect;
pub mod init;
pub mod query;
pub mod snapshot;
pub mod verify;

pub(crate) fn db_path(root: &Path) -> PathBuf {
    root.join("ledger.db")
}

pub(crate) fn artifacts_path(root: &Path) -> PathBuf {
    root.join("artifacts")
}

pub(crate) fn open_ledger(root: &Path) -> Result<Ledger> {
    let path = db_path(root);
    Ledger::open(&path).with_context(|| format!("failed to open ledger at {}", path.display()))
}

pub(crate) fn read_payload(payload: &PayloadArgs) -> Result<String> {
    if let Some(path) = &payload.payload_file {
        return fs::read_to_string(path)
            .with_context(|| format!("failed to read payload file {}", path.display()));
    }
    // The arg group guarantees exactly one of the two is present.
    Ok(payload.payload_json.clone().unwrap_or_default())
}

/// Resolves a `--time` value: zero means now.
pub(crate) fn resolve_time(time: i64) -> i64 {
    if time == 0 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    } else {
        time
    }
}
