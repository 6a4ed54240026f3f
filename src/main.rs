//! Slidesmith CLI - topic to presentation
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use slidesmith::agent::{self, ChatSession, GeminiAgent};
use slidesmith::deck;
use slidesmith::images::{create_client, ImageSearch};
use slidesmith::server::Server;
use slidesmith::{Config, Outline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "slidesmith")]
#[command(author, version, about = "Generate slide decks from a topic", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve {
        /// Address to bind, overrides the config file
        #[arg(long)]
        addr: Option<String>,
    },
    /// Generate an outline and print it as JSON
    Outline {
        /// Presentation topic
        topic: String,
        /// Number of slides
        #[arg(short = 'n', long, default_value_t = 5)]
        slides: u32,
        /// Additional instructions for the model
        #[arg(short, long, default_value = "")]
        instructions: String,
        /// Skip the photo search
        #[arg(long)]
        no_images: bool,
    },
    /// Write a .pptx from an outline JSON file
    Render {
        /// Outline file: a slide array or {"slides": [...]}
        input: PathBuf,
        /// Output path
        #[arg(short, long, default_value = deck::DOWNLOAD_NAME)]
        output: PathBuf,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OutlineFile {
    Bare(Outline),
    Wrapped { slides: Outline },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command.unwrap_or(Commands::Serve { addr: None }) {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| config.server.addr.clone());
            Server::from_config(&config)?.run(&addr).await?;
        }
        Commands::Outline {
            topic,
            slides,
            instructions,
            no_images,
        } => {
            anyhow::ensure!(slides > 0, "slide count must be positive");

            let model = GeminiAgent::from_config(&config)?;
            let mut session = ChatSession::new(config.agent.persona.as_str());
            let mut outline =
                agent::generate_outline(&model, &mut session, &topic, &slides.to_string(), &instructions)
                    .await?;

            if !no_images {
                ImageSearch::from_config(&config)?.enrich(&mut outline).await;
            }

            println!("{}", serde_json::to_string_pretty(&outline)?);
        }
        Commands::Render { input, output } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let outline = match serde_json::from_str(&content)
                .with_context(|| format!("{} is not a valid outline", input.display()))?
            {
                OutlineFile::Bare(slides) | OutlineFile::Wrapped { slides } => slides,
            };
            if let Some(id) = slidesmith::slide::duplicate_id(&outline) {
                anyhow::bail!("duplicate slide id {id} in {}", input.display());
            }

            let client = create_client(config.images.timeout())?;
            let bytes = deck::assemble(&client, &outline).await?;
            std::fs::write(&output, bytes)
                .with_context(|| format!("failed to write {}", output.display()))?;

            println!("Wrote {} slides to {}", outline.len(), output.display());
        }
    }

    Ok(())
}
