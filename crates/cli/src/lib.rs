pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use paydesk_core::config::{ConfigOverrides, LoadOptions};
use paydesk_core::domain::{Decision, PayoutRequestId, StatusFilter};

#[derive(Debug, Parser)]
#[command(
    name = "paydesk",
    about = "Payout request approvals CLI",
    long_about = "Review, approve, reject and delete payout requests against the payout backend.",
    after_help = "Examples:\n  paydesk list --status pending\n  paydesk approve 42\n  paydesk delete 42 --confirm\n  paydesk config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a paydesk.toml config file")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override backend.base_url")]
    backend_url: Option<String>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "List payout requests, optionally narrowed to one status")]
    List {
        #[arg(long, default_value = "all", help = "all, pending, accepted or rejected")]
        status: StatusFilter,
    },
    #[command(about = "Approve a pending payout request (managers only)")]
    Approve { id: String },
    #[command(about = "Reject a pending payout request (managers only)")]
    Reject { id: String },
    #[command(about = "Delete a payout request; requires --confirm to commit")]
    Delete {
        id: String,
        #[arg(long, help = "Commit the delete instead of only asking for confirmation")]
        confirm: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                backend_url: self.backend_url.clone(),
                log_level: self.log_level.clone(),
                ..ConfigOverrides::default()
            },
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let result = match cli.command {
        Command::List { status } => commands::payouts::list(options, status),
        Command::Approve { id } => {
            commands::payouts::transition(options, PayoutRequestId::new(id), Decision::Accept)
        }
        Command::Reject { id } => {
            commands::payouts::transition(options, PayoutRequestId::new(id), Decision::Reject)
        }
        Command::Delete { id, confirm } => {
            commands::payouts::delete(options, PayoutRequestId::new(id), confirm)
        }
        Command::Config => commands::config::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
