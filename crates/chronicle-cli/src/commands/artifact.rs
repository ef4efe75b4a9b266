//! `chronicle artifact put`: content-addressed blob storage.

use std::path::Path;

use anyhow::Result;
use chronicle_core::blob;

use super::artifacts_path;

pub fn put(root: &Path, file: &Path) -> Result<()> {
    let stored = blob::put(&artifacts_path(root), file)?;
    println!("{}", serde_json::to_string(&stored)?);
    Ok(())
}
