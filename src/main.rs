use std::path::PathBuf;
use std::process::ExitCode;

use autoplan_lib::commands::{self, settings::SettingsUpdatePayload, AppState, CommandError};
use autoplan_lib::db::DbPool;
use autoplan_lib::models::auto_schedule::GenerateScheduleInput;
use autoplan_lib::utils::logger;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "autoplan", version, about = "Places auto-schedulable tasks into free time")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "AUTOPLAN_DB", default_value = "autoplan.sqlite")]
    db: PathBuf,

    /// Directory for rolling log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Place tasks into [start, end); dates are local "YYYY-MM-DD"
    Generate {
        #[arg(long)]
        start: String,

        /// Exclusive
        #[arg(long)]
        end: String,

        /// Compute placements without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Load goals, schedules, tasks, events and manual blocks from a JSON file
    Import { file: PathBuf },

    /// List active tasks
    Tasks,

    /// List schedule definitions
    Schedules,

    /// List time blocks dated in [start, end)
    Blocks {
        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },

    /// Scheduler settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,

    Set {
        /// "HH:MM"
        #[arg(long)]
        workday_start: Option<String>,

        /// "HH:MM"
        #[arg(long)]
        workday_end: Option<String>,

        /// IANA zone name, e.g. Europe/Berlin
        #[arg(long)]
        timezone: Option<String>,
    },

    Reset,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logger::init_logging(&cli.log_dir) {
        eprintln!("logging disabled: {err}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: "app::command", code = %err.code, message = %err.message, "command failed");
            match serde_json::to_string_pretty(&err) {
                Ok(body) => eprintln!("{body}"),
                Err(_) => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    let pool = DbPool::new(&cli.db).map_err(CommandError::from)?;
    let state = AppState::new(pool);

    match cli.command {
        Command::Generate {
            start,
            end,
            dry_run,
        } => {
            let payload = GenerateScheduleInput {
                start_date: start,
                end_date: end,
                dry_run,
            };
            print_json(&commands::auto_schedule::auto_schedule_generate(&state, payload).await?)
        }
        Command::Import { file } => {
            let raw = tokio::fs::read_to_string(&file).await.map_err(|err| {
                CommandError::new(
                    "IO_ERROR",
                    format!("cannot read {}: {err}", file.display()),
                    None,
                )
            })?;
            print_json(&commands::import::import_fixture(&state, raw).await?)
        }
        Command::Tasks => print_json(&commands::task::tasks_list(&state).await?),
        Command::Schedules => print_json(&commands::time_blocks::schedules_list(&state).await?),
        Command::Blocks { start, end } => {
            print_json(&commands::time_blocks::time_blocks_list(&state, start, end).await?)
        }
        Command::Settings { command } => {
            let settings = match command {
                SettingsCommand::Show => commands::settings::settings_get(&state).await?,
                SettingsCommand::Set {
                    workday_start,
                    workday_end,
                    timezone,
                } => {
                    let payload = SettingsUpdatePayload {
                        workday_start,
                        workday_end,
                        timezone,
                        ..Default::default()
                    };
                    commands::settings::settings_update(&state, payload).await?
                }
                SettingsCommand::Reset => commands::settings::settings_reset(&state).await?,
            };
            print_json(&settings)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CommandError> {
    let body = serde_json::to_string_pretty(value)
        .map_err(|err| CommandError::new("INVALID_PAYLOAD", err.to_string(), None))?;
    println!("{body}");
    Ok(())
}
