//! Timebucket CLI entry point

use clap::Parser;
use timebucket::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::load_config(&cli)?;

    timebucket::logging::init(&config.logging)?;
    tracing::debug!("Timebucket v{}", env!("CARGO_PKG_VERSION"));

    let stdout = std::io::stdout();
    cli::run(&cli, &config, &mut stdout.lock())
}
