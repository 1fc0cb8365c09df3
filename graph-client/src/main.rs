use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use graph_client::{Attachment, Config, GraphClient};

/// Command-line probe for the graph API client
#[derive(Parser, Debug)]
#[command(name = "graph-client", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one object
    Get { id: String },
    /// Fetch several objects in one request
    GetMany {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Fetch a connection such as "likes" or "feed"
    Connections { id: String, relation: String },
    /// Post a message to your feed
    Post {
        message: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        caption: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Comment on an object
    Comment { id: String, text: String },
    /// Like an object
    Like { id: String },
    /// Delete an object
    Delete { id: String },
    /// Search the graph
    Search {
        query: String,
        #[arg(long = "type")]
        kind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "graph_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    info!("Graph API: {}", config.base_url);

    let client = match config.resolve_access_token() {
        Ok(token) => GraphClient::new(&config, token)?,
        Err(e) => {
            warn!("Running without an access token: {}", e);
            GraphClient::anonymous(&config)?
        }
    };

    match cli.command {
        Command::Get { id } => print_json(&client.fetch_object(&id).await?),
        Command::GetMany { ids } => {
            let batch = client.fetch_objects(&ids).await?;
            for (id, err) in &batch.failures {
                warn!("{}: {}", id, err);
            }
            print_json(&batch.objects)
        }
        Command::Connections { id, relation } => {
            print_json(&client.fetch_connection(&id, &relation).await?)
        }
        Command::Post {
            message,
            name,
            link,
            caption,
            description,
        } => {
            let attachment: Attachment = [
                ("name", name),
                ("link", link),
                ("caption", caption),
                ("description", description),
            ]
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect();
            let attachment = (!attachment.is_empty()).then_some(&attachment);
            print_json(&client.publish_post(&message, attachment).await?)
        }
        Command::Comment { id, text } => print_json(&client.publish_comment(&id, &text).await?),
        Command::Like { id } => print_json(&client.publish_like(&id).await?),
        Command::Delete { id } => print_json(&client.delete_object(&id).await?),
        Command::Search { query, kind } => {
            print_json(&client.search(&query, kind.as_deref()).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render response")?;
    println!("{}", rendered);
    Ok(())
}
