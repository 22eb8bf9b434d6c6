pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use nickbook_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "nickbook",
    about = "Nickbook operator CLI",
    long_about = "Check startup readiness, create the nickname schema, and inspect configuration.",
    after_help = "Examples:\n  nickbook start\n  nickbook init-db\n  nickbook --config config/nickbook.toml config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Read configuration from this TOML file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run startup preflight checks and return structured status output")]
    Start,
    #[command(about = "Create the nickname table if it does not exist")]
    InitDb,
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    let result = match cli.command {
        Command::Start => commands::start::run(options),
        Command::InitDb => commands::init_db::run(options),
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
