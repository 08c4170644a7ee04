use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{Dispatcher, Method};
use serde_json::Value;
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Issues one records call, against a local store file or a remote server.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    /// Serve matching calls from this SQLite store instead of the network.
    #[arg(long)]
    database_url: Option<String>,
    /// GET, POST, PATCH or DELETE.
    method: Method,
    /// Request path, e.g. `/api/students/search?q=123`.
    path: String,
    /// JSON request body.
    #[arg(long)]
    data: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let payload = args
        .data
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--data is not valid JSON")?;

    let mut dispatcher = Dispatcher::new(&args.server_url)?;
    let storage = match &args.database_url {
        Some(url) => {
            let storage = Storage::open(url).await?;
            dispatcher = dispatcher.with_local_backend(Arc::new(storage.clone()));
            info!(%url, "using local student store");
            Some(storage)
        }
        None => None,
    };

    let result = dispatcher.request(args.method, &args.path, payload).await;
    if let Some(storage) = storage {
        storage.close().await;
    }

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
