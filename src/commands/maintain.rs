//! `memoria stats`, `persist`, `reindex`

use anyhow::{Context, Result};

use super::StoreArgs;

pub fn stats(store_args: &StoreArgs, json: bool) -> Result<()> {
    let store = store_args.open()?;
    let stats = store.stats()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("📂 {}", store.layout().root().display());
    println!("Turns:      {}", stats.turns);
    println!("Documents:  {}", stats.documents);
    println!("Vectors:    {} (dim {})", stats.vectors, stats.dimension);
    if stats.vectors < stats.turns {
        println!(
            "\n⚠️  {} turn(s) have no vector. Run `memoria reindex`.",
            stats.turns - stats.vectors
        );
    }
    Ok(())
}

pub fn persist(store_args: &StoreArgs) -> Result<()> {
    let store = store_args.open()?;
    store.persist().context("Failed to persist vector index")?;
    println!("✓ Vector index saved");
    Ok(())
}

pub fn reindex(store_args: &StoreArgs) -> Result<()> {
    let store = store_args.open()?;
    let indexed = store
        .reindex_unindexed()
        .context("Failed to reindex turns")?;
    store.persist().context("Failed to persist vector index")?;

    println!("✓ Indexed {} turn(s)", indexed);
    Ok(())
}
