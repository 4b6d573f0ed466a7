//! Command handler modules for mqk-acct.
//!
//! Shared loading utilities live here. Command-specific logic lives in the
//! submodules.

pub mod report;

use anyhow::{Context, Result};
use mqk_accounting::Trade;
use mqk_config::{LoadedConfig, UnusedKeyPolicy};
use std::fs;
use tracing::warn;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered config and run the unused-key guard.
///
/// Unused keys are a warning unless `strict` is set.
pub fn load_config(paths: &[String], strict: bool) -> Result<LoadedConfig> {
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = mqk_config::load_layered_yaml(&path_refs)?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = mqk_config::report_unused_keys(&loaded.config_json, policy)?;
    for p in &report.unused_leaf_pointers {
        warn!(pointer = %p, "unused config key");
    }

    Ok(loaded)
}

/// Read a JSON array of trades. A UTF-8 BOM is tolerated.
pub fn load_trades(path: &str) -> Result<Vec<Trade>> {
    let bytes = fs::read(path).with_context(|| format!("read trades file failed: {}", path))?;
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(&bytes);
    let trades: Vec<Trade> = serde_json::from_slice(bytes)
        .with_context(|| format!("trades file must be a JSON array of trades: {}", path))?;
    Ok(trades)
}
