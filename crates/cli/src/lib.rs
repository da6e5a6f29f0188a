pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use docbot_core::config::RegisterMode;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "docbot",
    about = "docbot operator CLI",
    long_about = "Publish slash commands, inspect effective configuration, \
                  and check runtime readiness.",
    after_help = "Examples:\n  docbot register --mode guild --dry-run\n  \
                  docbot config\n  docbot doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Publish (or clear) slash-command definitions on Discord")]
    Register {
        #[arg(long, value_enum, help = "Override discord.register_mode for this run")]
        mode: Option<ModeArg>,
        #[arg(long, help = "Print the request instead of sending it")]
        dry_run: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, command definitions and Discord API reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Global,
    Guild,
    ResetGuild,
    ResetGlobal,
}

impl From<ModeArg> for RegisterMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Global => Self::Global,
            ModeArg::Guild => Self::Guild,
            ModeArg::ResetGuild => Self::ResetGuild,
            ModeArg::ResetGlobal => Self::ResetGlobal,
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Register { mode, dry_run } => {
            commands::register::run(mode.map(RegisterMode::from), dry_run)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
