use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use rnr_agent::ChatSession;
use rnr_core::{AppConfig, EmbeddingModel};
use rnr_mistral::MistralClient;
use rnr_rag::{Backend, IngestPipeline, TopicStore};
use rnr_snowflake::SnowflakeConnection;

#[derive(Parser)]
#[command(name = "rnr")]
#[command(about = "Chat with your documents: retrieval-augmented answers about one topic", long_about = None)]
struct Cli {
    /// Topic the documents are about; also names the vector table
    #[arg(short, long, env = "TOPIC")]
    topic: String,

    /// A .docx file to ingest before chatting. Without it the topic's existing data is used.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Keep chunks in memory and embed locally instead of using Snowflake
    #[arg(long)]
    offline: bool,

    /// Print every model and tool turn
    #[arg(short, long)]
    verbose: bool,

    /// Chat model, overrides CHAT_MODEL
    #[arg(long)]
    model: Option<String>,

    /// Embedding model, overrides EMBEDDING_MODEL
    #[arg(long)]
    embedding_model: Option<EmbeddingModel>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(model) = cli.model {
        config.chat_model = model;
    }
    if let Some(embedding_model) = cli.embedding_model {
        config.embedding_model = embedding_model;
    }
    config.verbose |= cli.verbose;
    config.validate()?;

    let llm = MistralClient::from_env()?
        .with_model(config.chat_model.clone())
        .with_temperature(config.temperature);

    let connection = if cli.offline {
        None
    } else {
        Some(Arc::new(SnowflakeConnection::from_env()?))
    };
    let backend = match &connection {
        Some(connection) => Backend::Snowflake(connection.clone()),
        None => Backend::local(),
    };
    let pipeline = IngestPipeline::from_config(&cli.topic, &config, backend)?;

    let store = match open_store(&pipeline, cli.file.as_deref()).await {
        Ok(store) => store,
        Err(e) => {
            if let Some(connection) = &connection {
                if let Err(e) = connection.close().await {
                    tracing::warn!(error = %e, "failed to close the backend connection");
                }
            }
            eprintln!("{} {}", "✗".red(), e);
            eprintln!(
                "{}",
                "Please provide a valid .docx file with --file, or a topic that already has ingested data."
                    .yellow()
            );
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut session = ChatSession::new(store, Arc::new(llm), &config);
    display_banner(session.topic(), &config);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    let mut io_error = None;

    loop {
        print!("{} ", "you ›".cyan().bold());
        if let Err(e) = io::stdout().flush() {
            io_error = Some(e);
            break;
        }

        let input = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                io_error = Some(e);
                break;
            }
            None => {
                println!();
                break;
            }
        };
        let input = input.trim();

        match input.to_lowercase().as_str() {
            "" => continue,
            "exit" | "quit" => break,
            "reset" => {
                session.reset();
                println!("{}", "History cleared.".dimmed());
                continue;
            }
            "help" => {
                print_help();
                continue;
            }
            _ => {}
        }

        match session.ask(input).await {
            Ok(reply) => {
                if reply.tool_limit_reached {
                    println!(
                        "{}",
                        "Note: the assistant hit its tool-call limit; this answer may be incomplete.".yellow()
                    );
                }
                println!("{} {}", "ai ›".green().bold(), reply.answer.content);
            }
            Err(e) => {
                tracing::error!(error = %e, "exchange failed");
                println!(
                    "{}",
                    "Sorry, something went wrong while answering. Please try again.".red()
                );
            }
        }
    }

    if let Err(e) = session.end_session().await {
        tracing::warn!(error = %e, "failed to close the backend connection");
    }
    if let Some(e) = io_error {
        return Err(e).context("failed to read from the terminal");
    }
    println!("{}", "Goodbye!".green());
    Ok(ExitCode::SUCCESS)
}

async fn open_store(pipeline: &IngestPipeline, file: Option<&std::path::Path>) -> rnr_core::Result<TopicStore> {
    match file {
        Some(path) => {
            println!("{} Ingesting {}...", "•".blue(), path.display());
            let (store, report) = pipeline.ingest(path).await?;
            println!(
                "{} {} chunks from {} ({} new)",
                "✓".green(),
                report.chunks,
                report.source,
                report.inserted
            );
            Ok(store)
        }
        None => pipeline.open_existing().await,
    }
}

fn display_banner(topic: &str, config: &AppConfig) {
    println!();
    println!("{}", format!("RAG 'n' Roll · your assistant about {}", topic).blue().bold());
    println!(
        "{}",
        format!(
            "model {} · embeddings {} · top {} chunks",
            config.chat_model, config.embedding_model, config.top_k
        )
        .dimmed()
    );
    println!("{}", "Type a question, 'help' for commands, 'exit' to quit.".dimmed());
    println!();
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  {}   clear the conversation history", "reset".cyan());
    println!("  {}    show this help", "help".cyan());
    println!("  {}    end the session", "exit".cyan());
}
