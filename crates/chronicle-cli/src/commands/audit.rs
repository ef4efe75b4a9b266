//! `chronicle audit`: export an audit bundle.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chronicle_core::reconstruct::Reconstructor;

use super::{open_ledger, resolve_time};

pub fn run(root: &Path, time: i64, out: Option<&Path>) -> Result<()> {
    let target_time = resolve_time(time);
    let ledger = open_ledger(root)?;

    let bundle = Reconstructor::new(&ledger).export_audit_bundle(target_time)?;
    let json = bundle.to_json()?;

    if let Some(out) = out {
        fs::write(out, &json)
            .with_context(|| format!("failed to write bundle to {}", out.display()))?;
        println!("written: {}", out.display());
        return Ok(());
    }

    println!("{json}");
    Ok(())
}
