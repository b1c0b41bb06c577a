//! `memoria doc` and `memoria task` - document and task side tables

use anyhow::{Context, Result};
use std::path::Path;

use super::StoreArgs;

pub fn register_document(
    store_args: &StoreArgs,
    path: &Path,
    summary: Option<String>,
) -> Result<()> {
    let store = store_args.open()?;
    let record = store
        .upsert_document(path, summary)
        .context("Failed to register document")?;

    println!("Registered {} ({})", record.file_path, record.file_name);
    Ok(())
}

pub fn list_documents(store_args: &StoreArgs, json: bool) -> Result<()> {
    let store = store_args.open()?;
    let documents = store.documents()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    for doc in &documents {
        println!(
            "{}  {}  {}",
            doc.processed_date.format("%Y-%m-%d %H:%M"),
            doc.file_path,
            doc.summary.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn record_task(
    store_args: &StoreArgs,
    description: &str,
    status: Option<&str>,
    result: Option<&str>,
) -> Result<()> {
    let store = store_args.open()?;
    let id = store
        .record_task(description, status, result)
        .context("Failed to record task")?;

    println!("Recorded task {}", id);
    Ok(())
}

pub fn list_tasks(store_args: &StoreArgs, limit: usize, json: bool) -> Result<()> {
    let store = store_args.open()?;
    let tasks = store.recent_tasks(limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    for task in &tasks {
        println!(
            "#{} [{}] {}",
            task.id,
            task.status.as_deref().unwrap_or("?"),
            task.description
        );
    }
    Ok(())
}
