use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::{domain::GroupId, protocol::StudentDraft};
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/students.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a JSON array of student rows.
    Import {
        file: PathBuf,
        #[arg(long)]
        group_name: Option<String>,
    },
    ListGroups,
    DeleteGroup {
        group_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let storage = Storage::open(&cli.database_url).await?;

    let outcome = run(&storage, cli.command).await;
    storage.close().await;
    outcome
}

async fn run(storage: &Storage, command: Command) -> Result<()> {
    match command {
        Command::Import { file, group_name } => {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let drafts: Vec<StudentDraft> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON array of students", file.display()))?;
            let created = storage
                .bulk_create_students(&drafts, group_name.as_deref())
                .await?;
            println!("imported {} of {} rows", created.len(), drafts.len());
        }
        Command::ListGroups => {
            for group in storage.list_groups().await? {
                println!("{}\t{}\t{}", group.id.0, group.name, group.created_at);
            }
        }
        Command::DeleteGroup { group_id } => {
            let deleted = storage.delete_group(GroupId(group_id)).await?;
            println!("deleted group_id={group_id}: {deleted}");
        }
    }
    Ok(())
}
