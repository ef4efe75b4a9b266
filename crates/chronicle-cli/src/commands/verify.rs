//! `chronicle verify`: print the chain verification result as JSON.

use std::path::Path;

use anyhow::Result;
use chronicle_core::verify::verify_all;

use super::open_ledger;

pub fn run(root: &Path) -> Result<()> {
    let ledger = open_ledger(root)?;
    let report = verify_all(&ledger)?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
