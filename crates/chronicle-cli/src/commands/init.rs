//! `chronicle init`: create the store and the blob root.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::{artifacts_path, open_ledger};

pub fn run(root: &Path) -> Result<()> {
    fs::create_dir_all(root)
        .with_context(|| format!("failed to create root {}", root.display()))?;
    fs::create_dir_all(artifacts_path(root))
        .with_context(|| format!("failed to create artifacts dir under {}", root.display()))?;

    let ledger = open_ledger(root)?;
    ledger.close()?;

    println!("initialized");
    Ok(())
}
