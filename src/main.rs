use clap::Parser;
use desktidy::cli::{Command, run_cli_with_config};
use desktidy::output::OutputFormatter;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "desktidy",
    version,
    about = "Sort your desktop into category folders, undo it, back it up"
)]
struct Cli {
    /// Directory to work on (defaults to the desktop)
    #[arg(long, global = true, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Configuration file (JSON or TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log every move to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "desktidy=info" } else { "desktidy=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let Some(dir) = cli.dir.or_else(dirs::desktop_dir) else {
        OutputFormatter::error("Could not find a desktop directory; pass --dir");
        return ExitCode::FAILURE;
    };

    match run_cli_with_config(cli.command, &dir, cli.config.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}
