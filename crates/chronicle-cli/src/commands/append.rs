//! `chronicle append`: seal a raw record into the chain.

use std::path::Path;

use anyhow::Result;
use chronicle_core::store::RecordInput;

use super::{open_ledger, read_payload};
use crate::PayloadArgs;

pub fn run(root: &Path, kind: &str, source: &str, time: i64, payload: &PayloadArgs) -> Result<()> {
    let payload = read_payload(payload)?;
    let ledger = open_ledger(root)?;

    let record = ledger.append_one(&RecordInput {
        timestamp: time,
        kind: kind.to_string(),
        source: source.to_string(),
        payload,
    })?;

    println!("{}", serde_json::to_string(&record)?);
    Ok(())
}
