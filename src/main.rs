use clap::Parser;
use tracing_subscriber::EnvFilter;

use fire_calc::api::{Cli, run_cli};

#[tokio::main]
async fn main() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fire_calc=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run_cli(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
