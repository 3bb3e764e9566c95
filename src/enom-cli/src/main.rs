use anyhow::Result;
use clap::Parser;
use enom_cli::styled_output::print_error;
use enom_cli::{Cli, LogLevel, dispatch_command};

/// Environment override for the log level when `-v` is not given.
const LOG_LEVEL_ENV: &str = "ENOM_LOG_LEVEL";

fn init_tracing(cli: &Cli) {
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else if let Ok(env_level) = std::env::var(LOG_LEVEL_ENV) {
        LogLevel::from_str_loose(&env_level).unwrap_or(cli.log_level)
    } else {
        cli.log_level
    };

    // RUST_LOG narrows our crates to the chosen level and silences the rest.
    let filter_str = log_level.filter_directives(std::env::var("RUST_LOG").is_ok());

    tracing_subscriber::fmt()
        .with_env_filter(&filter_str)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = dispatch_command(cli).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
    Ok(())
}
