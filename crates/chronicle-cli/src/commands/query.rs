//! `chronicle query`: emit records as one JSON object per line.

use std::path::Path;

use anyhow::Result;

use super::open_ledger;

pub fn run(root: &Path, id: Option<u64>, since: i64, until: i64, limit: i64) -> Result<()> {
    let ledger = open_ledger(root)?;

    if let Some(id) = id {
        let record = ledger.get_by_id(id)?;
        println!("{}", serde_json::to_string(&record)?);
        return Ok(());
    }

    for record in ledger.list(since, until, limit)? {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
