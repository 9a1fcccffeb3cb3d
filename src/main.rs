use omop_mapper::batch::run_batch;
use omop_mapper::config::{Backend, MapperConfig, DEFAULT_INPUT_CSV, DEFAULT_OUTPUT_CSV};
use omop_mapper::console::{ConsoleMenu, MenuOptions};
use omop_mapper::mapping::{build_mapper, ConceptMapper};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "omop-mapper")]
#[command(about = "Map free-text clinical terms to OMOP concepts")]
#[command(version)]
struct Args {
    /// Mapping backend: mock or llm (or set OMOP_MAPPER_BACKEND)
    #[arg(long, global = true)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (the default when no subcommand is given)
    Menu,
    /// Map a single term and print the result as JSON
    Map {
        /// The clinical term, e.g. "Blood Pressure"
        term: String,
    },
    /// Map every term in a CSV file with a `term` column
    Batch {
        #[arg(short, long, default_value = DEFAULT_INPUT_CSV)]
        input: PathBuf,

        #[arg(short, long, default_value = DEFAULT_OUTPUT_CSV)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = MapperConfig::from_env().context("Failed to load configuration")?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    let mapper: Arc<dyn ConceptMapper> = build_mapper(&config)?;

    match args.command.unwrap_or(Commands::Menu) {
        Commands::Menu => {
            let choice = ConsoleMenu::new(mapper.as_ref(), io::stdin().lock(), io::stdout())
                .with_options(MenuOptions::default())
                .run()
                .await?;
            info!("Menu finished: {:?}", choice);
        }
        Commands::Map { term } => {
            let result = mapper.map_term(&term).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Batch { input, output } => {
            let summary = run_batch(mapper.as_ref(), &input, &output)
                .await
                .with_context(|| format!("Batch mapping of {:?} failed", input))?;
            println!("Done! See {}.", summary.output.display());
        }
    }

    Ok(())
}
