mod commands;
mod ui;

use clap::{Parser, Subcommand, ValueEnum};
use commands::serve::ServeArgs;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "command-exporter")]
#[command(about = "Runs commands on every scrape and exposes their output as Prometheus metrics", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Options for `serve`, which runs when no subcommand is given
    #[command(flatten)]
    serve: ServeArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve gathered metrics over HTTP
    Serve(ServeArgs),

    /// Validate a config file
    Validate {
        /// Path to config file (YAML, TOML, or JSON)
        config_file: PathBuf,
    },

    /// Run one gather cycle and print the result
    Gather {
        /// Path to config file (YAML, TOML, or JSON)
        config_file: PathBuf,

        /// Print the snapshot as JSON instead of exposition text
        #[arg(long)]
        json: bool,

        /// Run the startup script first
        #[arg(long)]
        with_startup: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.verbose, cli.quiet, cli.log_format);

    match cli.command.unwrap_or(Commands::Serve(cli.serve)) {
        Commands::Serve(args) => {
            commands::serve::execute(args).await?;
        }

        Commands::Validate { config_file } => {
            commands::validate::execute(config_file).await?;
        }

        Commands::Gather {
            config_file,
            json,
            with_startup,
        } => {
            commands::gather::execute(config_file, json, with_startup).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr through a non-blocking writer; the guard flushes it on
/// exit and must outlive `main`'s work.
fn init_tracing(verbose: bool, quiet: bool, format: LogFormat) -> WorkerGuard {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }

    guard
}
