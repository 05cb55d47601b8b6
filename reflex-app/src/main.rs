mod app;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "reflex", version, about = "Visual reaction time tester")]
struct Cli {
    /// JSON config file; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("reflex=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(cli.config.as_deref())?;
    tracing::info!(
        platform = std::env::consts::OS,
        arch = std::env::consts::ARCH,
        min_delay_ms = config.session.delay_range_ms.0,
        max_delay_ms = config.session.delay_range_ms.1,
        "starting reaction time test"
    );

    app::run(config)
}
