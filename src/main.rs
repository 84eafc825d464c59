use clap::Parser;
use drive_publisher::cli::{self, Cli};
use drive_publisher::config::AppConfig;
use drive_publisher::context::RunContext;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    debug!("Using data directory {}", config.data_dir().display());

    let context = RunContext::new(config, cli.offline)?;
    let service = Arc::new(context.build_service()?);

    let output = cli::execute(service, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output.json)?);

    if !output.ok {
        std::process::exit(1);
    }
    Ok(())
}
