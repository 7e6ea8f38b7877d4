use clap::Parser;

mod cli;
pub mod exit_codes;

use cli::args::Cli;
use cli::commands::dispatch;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = dispatch(cli).await;
    std::process::exit(code);
}

/// Logs go to stderr so stdout stays reserved for artifacts and command output.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
