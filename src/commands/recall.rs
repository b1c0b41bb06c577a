//! `memoria context`, `search`, `recent` - read paths

use anyhow::{Context, Result};
use serde::Serialize;

use super::StoreArgs;

#[derive(Debug, Serialize)]
struct SearchHit {
    turn_id: i64,
    similarity: f32,
    distance: f32,
    timestamp: String,
    user_text: Option<String>,
    agent_text: Option<String>,
}

/// Print the assembled prompt context for `query`
pub fn context(store_args: &StoreArgs, query: &str) -> Result<()> {
    let store = store_args.open()?;
    println!("{}", store.assemble_context(query));
    Ok(())
}

pub fn search(store_args: &StoreArgs, query: &str, k: usize, json: bool) -> Result<()> {
    let store = store_args.open()?;
    let hits = store.retrieve(query, k).context("Semantic search failed")?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let turn = store.turn(hit.entry.correlated_id)?;
        results.push(SearchHit {
            turn_id: hit.entry.correlated_id,
            similarity: hit.similarity,
            distance: hit.distance,
            timestamp: hit.entry.timestamp.to_rfc3339(),
            user_text: turn.as_ref().map(|t| t.user_text.clone()),
            agent_text: turn.map(|t| t.agent_text),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No matches.");
        return Ok(());
    }

    for hit in &results {
        println!("#{} [{:.2}] {}", hit.turn_id, hit.similarity, hit.timestamp);
        if let Some(user) = &hit.user_text {
            println!("  User: {}", memoria::memory::context::snippet(user, 100));
        }
    }
    Ok(())
}

pub fn recent(store_args: &StoreArgs, limit: usize, json: bool) -> Result<()> {
    let store = store_args.open()?;
    let turns = store.recent_turns(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    for turn in &turns {
        println!("#{} {}", turn.id, turn.timestamp.to_rfc3339());
        println!("  User: {}", turn.user_text);
        println!("  Agent: {}", turn.agent_text);
        if !turn.tools_used.is_empty() {
            println!("  Tools: {}", turn.tools_used.join(", "));
        }
    }
    Ok(())
}
