//! HTTP server for the OMOP Mapper web form

use anyhow::{Context, Result};
use clap::Parser;
use omop_mapper::config::{Backend, MapperConfig};
use omop_mapper::mapping::build_mapper;
use omop_mapper::web::serve;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "server")]
#[command(about = "Web form for mapping clinical terms to OMOP concepts")]
struct Args {
    /// Address to listen on (or set OMOP_BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Mapping backend: mock or llm (or set OMOP_MAPPER_BACKEND)
    #[arg(long)]
    backend: Option<Backend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = MapperConfig::from_env().context("Failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    if config.backend == Backend::Mock {
        warn!("Mock mapper active - every term maps to the same concept");
    }
    let mapper = build_mapper(&config)?;

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("🚀 OMOP Mapper listening on http://{}", config.bind_addr);

    serve(listener, mapper).await?;
    Ok(())
}
