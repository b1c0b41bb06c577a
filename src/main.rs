use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::StoreArgs;

#[derive(Parser)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Local conversational memory: turn log plus semantic recall", long_about = None)]
struct Cli {
    #[command(flatten)]
    store: StoreArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one user/agent exchange
    Record {
        /// What the user said
        user: String,

        /// What the agent answered
        agent: String,

        /// Tool used while answering (repeatable)
        #[arg(long = "tool")]
        tools: Vec<String>,

        /// Extra metadata as key=value (repeatable)
        #[arg(long = "meta", value_parser = commands::record::parse_key_value)]
        meta: Vec<(String, String)>,
    },

    /// Print the prompt context assembled for a query
    Context {
        /// Query text
        query: String,
    },

    /// Semantic search over recorded turns
    Search {
        /// Query text
        query: String,

        /// Number of results
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the most recent turns, oldest first
    Recent {
        /// Number of turns
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register a processed document, or list registered ones
    Doc {
        /// Document path (omit to list)
        path: Option<PathBuf>,

        /// Short summary of the document
        #[arg(long)]
        summary: Option<String>,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a task, or list recent ones
    Task {
        /// Task description (omit to list)
        description: Option<String>,

        /// Task status (e.g. done, failed)
        #[arg(long)]
        status: Option<String>,

        /// Task result text
        #[arg(long)]
        result: Option<String>,

        /// Number of tasks to list
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show store statistics
    Stats {
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Flush the vector index to disk
    Persist,

    /// Index turns that were logged but never made it into the vector index
    Reindex,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,memoria=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let store = &cli.store;

    match cli.command {
        Commands::Record {
            user,
            agent,
            tools,
            meta,
        } => {
            commands::record::execute(store, &user, &agent, tools, meta)?;
        }
        Commands::Context { query } => {
            commands::recall::context(store, &query)?;
        }
        Commands::Search { query, k, json } => {
            commands::recall::search(store, &query, k, json)?;
        }
        Commands::Recent { limit, json } => {
            commands::recall::recent(store, limit, json)?;
        }
        Commands::Doc {
            path,
            summary,
            json,
        } => match path {
            Some(path) => commands::registry::register_document(store, &path, summary)?,
            None => commands::registry::list_documents(store, json)?,
        },
        Commands::Task {
            description,
            status,
            result,
            limit,
            json,
        } => match description {
            Some(description) => commands::registry::record_task(
                store,
                &description,
                status.as_deref(),
                result.as_deref(),
            )?,
            None => commands::registry::list_tasks(store, limit, json)?,
        },
        Commands::Stats { json } => {
            commands::maintain::stats(store, json)?;
        }
        Commands::Persist => {
            commands::maintain::persist(store)?;
        }
        Commands::Reindex => {
            commands::maintain::reindex(store)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_record_collects_repeated_flags() {
        let cli = Cli::parse_from([
            "memoria", "record", "What is X?", "X is a thing", "--tool", "search", "--tool",
            "read", "--meta", "channel=cli",
        ]);
        match cli.command {
            Commands::Record { tools, meta, .. } => {
                assert_eq!(tools, vec!["search", "read"]);
                assert_eq!(meta, vec![("channel".to_string(), "cli".to_string())]);
            }
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn test_global_data_dir_after_subcommand() {
        let cli = Cli::parse_from(["memoria", "stats", "--data-dir", "/tmp/mem"]);
        assert_eq!(cli.store.data_dir, Some(PathBuf::from("/tmp/mem")));
    }
}
