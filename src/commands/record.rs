//! `memoria record` - log one exchange and index it

use anyhow::{Context, Result};
use std::collections::BTreeMap;

use super::StoreArgs;

pub fn execute(
    store_args: &StoreArgs,
    user: &str,
    agent: &str,
    tools: Vec<String>,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let store = store_args.open()?;

    let metadata = if meta.is_empty() {
        None
    } else {
        Some(meta.into_iter().collect::<BTreeMap<_, _>>())
    };

    let recorded = store
        .record(user, agent, tools, metadata)
        .context("Failed to record turn")?;

    for warning in &recorded.warnings {
        eprintln!("⚠️  {}", warning);
    }

    store.persist().context("Failed to persist vector index")?;

    match recorded.ordinal {
        Some(ordinal) => println!("Recorded turn {} (vector {})", recorded.turn_id, ordinal),
        None => println!("Recorded turn {} (log only)", recorded.turn_id),
    }
    Ok(())
}

/// Parse `key=value` for `--meta`
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))
}
