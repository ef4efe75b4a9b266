//! `chronicle collect <kind>`: validate a typed payload and ingest it.

use std::path::Path;

use anyhow::Result;
use chronicle_core::ingest::Ingestor;
use chronicle_core::payload::RecordKind;

use super::{open_ledger, read_payload};
use crate::PayloadArgs;

pub fn run(root: &Path, kind: &str, source: &str, time: i64, payload: &PayloadArgs) -> Result<()> {
    let kind: RecordKind = kind.parse()?;
    let raw = read_payload(payload)?;

    let ledger = open_ledger(root)?;
    let record = Ingestor::new(&ledger).ingest(kind, &raw, source, time)?;

    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}
