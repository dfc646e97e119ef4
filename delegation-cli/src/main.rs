mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use error::Result;
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let json_output = cli.json;
    if let Err(e) = run(cli) {
        if json_output {
            let output = json!({
                "success": false,
                "error": e.to_string(),
            });
            println!("{output:#}");
        } else {
            eprintln!("{} {}", "Error:".red(), e);
        }
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Keygen { dir, bits, force } => {
            commands::keygen(&dir, bits, force, cli.json)
        }
        Commands::Issue {
            user,
            proxy_user,
            x500,
            numeric,
            scope,
            domains,
            ttl,
            key_dir,
            token_only,
        } => commands::issue(
            commands::IssueArgs {
                user,
                proxy_user,
                x500,
                numeric,
                scope,
                domains,
                ttl,
                key_dir,
                token_only,
            },
            config,
            cli.json,
        ),
        Commands::Inspect { token, key_dir } => {
            commands::inspect(&token, key_dir, config, cli.json, cli.verbose)
        }
        Commands::Validate {
            token,
            target,
            key_dir,
            require_signature,
        } => commands::validate(
            &token,
            target.as_deref(),
            key_dir,
            require_signature,
            config,
            cli.json,
        ),
    }
}
