use std::io::{stdin, stdout};
use std::path::PathBuf;

use clap::Parser;
use loom_base::Config;
use tracing_subscriber::EnvFilter;

/// Interactive factored-cognition workbench.
#[derive(Parser)]
struct Cli {
    /// Root question to ask. Prompted on stdin if omitted.
    question: Option<String>,

    /// Optional TOML config file overriding the built-in defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn load_config(path: Option<&PathBuf>) -> loom_base::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::from_env());
    };
    let text = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&text)?;
    if let Ok(filter) = std::env::var("LOOM_LOG") {
        config.log_filter = filter;
    }
    Ok(config)
}

fn main() -> loom_base::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_filter.clone()))
        .with_target(false)
        .init();

    let stdin = stdin();
    loom::run(cli.question, config, stdin.lock(), stdout())
}
