//! `chronicle snapshot`: print the reconstruction report at a target time.

use std::path::Path;

use anyhow::Result;
use chronicle_core::reconstruct::Reconstructor;

use super::{open_ledger, resolve_time};

pub fn run(root: &Path, time: i64) -> Result<()> {
    let target_time = resolve_time(time);
    let ledger = open_ledger(root)?;

    let report = Reconstructor::new(&ledger).reconstruct_at(target_time);
    println!("{}", report.to_json()?);
    Ok(())
}
