//! Layered YAML configuration for the accounting tools.
//!
//! Documents are deep-merged in order (later overrides earlier), converted to
//! JSON and hashed over their canonical form, so two runs over the same trade
//! file can be tied to the exact configuration that produced them.
//!
//! Recognised layout:
//!
//! ```yaml
//! markets:
//!   BNBUSDT: { base_currency: BNB, quote_currency: USDT }
//! accounting:
//!   method: fifo              # average_cost | fifo
//!   trading_fee_currency: BNB
//! report:
//!   level: 2
//! ```

use anyhow::{bail, Context, Result};
use mqk_accounting::Market;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;

// ---------------------------------------------------------------------------
// Loading + hashing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::with_capacity(paths.len());
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }

    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for (i, raw) in yaml_docs.iter().enumerate() {
        let v_yaml: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml (layer {i})"))?;
        // An empty document parses as null; treat it as an empty layer.
        if v_yaml.is_null() {
            continue;
        }
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        merged = deep_merge(merged, v_json);
    }

    let canonical_json = canonicalize_json(&merged)?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

// serde_json's default `Map` is ordered by key, so compact serialization is
// already canonical with respect to source key order.
fn canonicalize_json(v: &Value) -> Result<String> {
    serde_json::to_string(v).context("canonical json serialize failed")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

/// Which cost-basis strategy replays the trade stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountingMethod {
    #[default]
    AverageCost,
    Fifo,
}

impl AccountingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountingMethod::AverageCost => "average_cost",
            AccountingMethod::Fifo => "fifo",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub base_currency: String,
    pub quote_currency: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawAccounting {
    #[serde(default)]
    method: AccountingMethod,
    #[serde(default)]
    trading_fee_currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReport {
    #[serde(default = "default_report_level")]
    level: u32,
}

impl Default for RawReport {
    fn default() -> Self {
        Self {
            level: default_report_level(),
        }
    }
}

fn default_report_level() -> u32 {
    1
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    markets: BTreeMap<String, MarketConfig>,
    #[serde(default)]
    accounting: RawAccounting,
    #[serde(default)]
    report: RawReport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountingConfig {
    pub markets: BTreeMap<String, MarketConfig>,
    pub method: AccountingMethod,
    pub trading_fee_currency: Option<String>,
    pub report_level: u32,
}

impl AccountingConfig {
    /// Typed view over a merged config.
    ///
    /// An unknown `accounting.method` is rejected here, before any trade is
    /// read.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_json(&loaded.config_json)
    }

    pub fn from_json(config_json: &Value) -> Result<Self> {
        let raw: RawConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: accounting config does not match expected layout")?;

        for (symbol, m) in &raw.markets {
            if m.base_currency.trim().is_empty() || m.quote_currency.trim().is_empty() {
                bail!("CONFIG_INVALID: market {symbol} needs base_currency and quote_currency");
            }
        }

        Ok(Self {
            markets: raw.markets,
            method: raw.accounting.method,
            trading_fee_currency: raw
                .accounting
                .trading_fee_currency
                .filter(|c| !c.trim().is_empty()),
            report_level: raw.report.level,
        })
    }

    /// Instrument metadata for `symbol`.
    pub fn market(&self, symbol: &str) -> Result<Market> {
        let m = self.markets.get(symbol).with_context(|| {
            format!(
                "CONFIG_MARKET_UNKNOWN: no markets.{symbol} entry (known: {})",
                preview_list(&self.markets.keys().cloned().collect::<Vec<_>>(), 12)
            )
        })?;
        Ok(Market::new(symbol, &m.base_currency, &m.quote_currency))
    }

    pub fn trading_fee_currency(&self) -> &str {
        self.trading_fee_currency.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

/// JSON-pointer prefixes read by [`AccountingConfig::from_json`]. A leaf
/// under any of these is consumed; anything else is unused.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/markets",
    "/accounting/method",
    "/accounting/trading_fee_currency",
    "/report/level",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Sorted, unique.
    pub consumed_prefixes: Vec<String>,
    /// Sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Report config leaves nothing reads.
///
/// `Warn` always returns the report; `Fail` errors when it is not clean.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<String> = CONSUMED_POINTERS
        .iter()
        .map(|p| normalize_pointer(p))
        .collect();
    let consumed_prefixes: Vec<String> = consumed.into_iter().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed_prefixes.iter().any(|cp| is_prefix_pointer(cp, leaf)))
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s) detected. \
            Remove them or fix the spelling. First few: {}",
            report.unused_leaf_pointers.len(),
            preview_list(&report.unused_leaf_pointers, 12)
        );
    }

    Ok(report)
}

/// Leading `/`, no trailing `/` (except the root pointer itself).
fn normalize_pointer(p: &str) -> String {
    let mut s = p.trim().to_string();
    if !s.starts_with('/') {
        s.insert(0, '/');
    }
    while s.ends_with('/') && s.len() > 1 {
        s.pop();
    }
    s
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    if prefix == "/" || leaf == prefix {
        return true;
    }
    leaf.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with('/'))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, escape_pointer_token(k));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        // The empty root document has no leaves.
        _ if prefix.is_empty() => {}
        _ => out.push(prefix.to_string()),
    }
}

fn escape_pointer_token(s: &str) -> String {
    s.replace('~', "~0").replace('/', "~1")
}

fn preview_list(items: &[String], n: usize) -> String {
    format!("{:?}", items.iter().take(n).collect::<Vec<_>>())
}
