pub mod range;
pub mod report;
pub mod shell;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::store::session_log::SessionLog;
use crate::utils::clock::DefaultClock;
use crate::utils::dir::{create_application_default_path, default_database_path};
use crate::utils::logging::{enable_logging, CLI_PREFIX, SHELL_PREFIX};

use range::FilterArgs;
use shell::run_shell;

#[derive(Parser, Debug)]
#[command(name = "Stint", version, long_about = None)]
#[command(about = "Terminal time tracker for work sessions", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Create a new session database")]
    Create {
        #[arg(help = "Path of the database file to create")]
        file: PathBuf,
    },
    #[command(about = "Open the interactive shell")]
    Shell {
        #[arg(
            long,
            help = "Database file. By default sessions.db in the application directory is loaded when it exists"
        )]
        file: Option<PathBuf>,
        #[arg(
            long,
            default_value_t = 60,
            help = "Seconds between autosaves of the running session's end time"
        )]
        autosave_interval: u64,
    },
    #[command(about = "Print sessions matching a filter")]
    View {
        #[arg(long, help = "Database file. Defaults to sessions.db in the application directory")]
        file: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    #[command(about = "Print tracked time per day")]
    Summary {
        #[arg(long, help = "Database file. Defaults to sessions.db in the application directory")]
        file: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
    },
    #[command(about = "Dump sessions matching a filter as JSON lines")]
    Export {
        #[arg(long, help = "Database file. Defaults to sessions.db in the application directory")]
        file: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, help = "Write to this file instead of stdout")]
        output: Option<PathBuf>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let data_path = create_application_default_path()?;
    let prefix = match &args.commands {
        Commands::Shell { .. } => SHELL_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &data_path, logging_level, args.log)?;

    match args.commands {
        Commands::Create { file } => {
            SessionLog::create(&file)?;
            println!("{} successfully created.", file.display());
            Ok(())
        }
        Commands::Shell {
            file,
            autosave_interval,
        } => {
            let file = match file {
                Some(file) => Some(file),
                None => {
                    let default = default_database_path()?;
                    default.is_file().then_some(default)
                }
            };
            run_shell(
                file,
                Duration::from_secs(autosave_interval),
                Arc::new(DefaultClock),
            )
            .await
        }
        Commands::View { file, filter } => {
            report::process_view_command(resolve_file(file)?, filter)
        }
        Commands::Summary { file, filter } => {
            report::process_summary_command(resolve_file(file)?, filter)
        }
        Commands::Export {
            file,
            filter,
            output,
        } => report::process_export_command(resolve_file(file)?, filter, output),
    }
}

fn resolve_file(file: Option<PathBuf>) -> Result<PathBuf> {
    match file {
        Some(file) => Ok(file),
        None => default_database_path(),
    }
}
