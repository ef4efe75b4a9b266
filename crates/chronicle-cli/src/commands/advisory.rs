//! `chronicle advisory`: determinism analyses plus a failure explanation.

use std::path::Path;

use anyhow::Result;
use chronicle_core::determinism;
use chronicle_core::reconstruct::Reconstructor;

use super::{open_ledger, resolve_time};

pub fn run(root: &Path, time: i64) -> Result<()> {
    let target_time = resolve_time(time);
    let ledger = open_ledger(root)?;

    let report = Reconstructor::new(&ledger).reconstruct_at(target_time);
    let state = report.state.clone().unwrap_or_default();

    let env_analysis = determinism::analyze_environment(state.environment.as_ref());
    let code_analysis = determinism::analyze_code(state.code.as_ref());
    let config_analysis = determinism::analyze_config(state.config.as_ref());
    let summary = determinism::summarize(&env_analysis, &code_analysis, &config_analysis);

    println!("=== Determinism Advisory ===");
    println!("{}", summary.to_json());
    println!();
    println!("=== Explanation ===");
    println!("{}", report.explain());
    Ok(())
}
