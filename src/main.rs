use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "devstart")]
#[command(version, about = "Start the development server for a front-end app")]
pub struct Cli {
    /// Log launcher diagnostics at debug level (see DEVSTART_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// App root; defaults to the current directory
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the development server (default)
    Start,
    /// View, validate or create devstart.toml
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the project configuration and effective settings
    Show,
    /// Validate devstart.toml and show any warnings
    Validate,
    /// Write a default devstart.toml
    Init,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    devstart::logging::init(cli.verbose);

    let code = match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };
    // Exit without waiting on the runtime: a pending stdin read would block
    // its shutdown.
    std::process::exit(code);
}

async fn run(cli: &Cli) -> Result<i32> {
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        None | Some(Commands::Start) => Ok(cmd::cmd_start(&project_dir).await),
        Some(Commands::Config { command }) => {
            cmd::cmd_config(&project_dir, command.clone())?;
            Ok(0)
        }
    }
}
