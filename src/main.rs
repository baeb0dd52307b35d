use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;

use cyclecast::commands::{parse_date_arg, parse_timestamp_arg, App, CommandError};
use cyclecast::config::{Config, ConfigError};
use cyclecast::models::{CyclePrediction, CycleSummary, FlowLevel, PeriodDetails, PeriodLog};
use cyclecast::pregnancy::format_duration;
use cyclecast::storage::{default_data_dir, EncryptedFileStore};
use cyclecast::{logging, SystemClock};

#[derive(Parser)]
#[command(name = "cyclecast", version, about = "Private cycle and pregnancy tracker")]
struct Cli {
    /// Vault passphrase
    #[arg(long, global = true, env = "CYCLECAST_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    /// Config file path
    #[arg(long, global = true, env = "CYCLECAST_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    #[command(flatten)]
    Vault(VaultCommand),
}

/// Commands that open the vault.
#[derive(Subcommand)]
enum VaultCommand {
    /// Create an empty vault
    Init,
    /// Period logs
    Log {
        #[command(subcommand)]
        action: LogAction,
    },
    /// Contraction timing
    Contraction {
        #[command(subcommand)]
        action: ContractionAction,
    },
    /// Fetal kick counting
    Kick {
        #[command(subcommand)]
        action: KickAction,
    },
    /// Predict the next period and fertile window
    Predict,
    /// Cycle length and regularity insights
    Insights,
    /// Cycle statistics
    Summary,
    /// Dump the vault as JSON
    Export,
    /// Delete the vault permanently
    Wipe {
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum LogAction {
    /// Log the first day of a period (yyyy-MM-dd)
    Start {
        date: String,
        /// light, medium or heavy
        #[arg(long)]
        flow: Option<FlowLevel>,
        /// Repeat for each symptom
        #[arg(long = "symptom")]
        symptoms: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Expected length in days (1-10)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=10))]
        duration_days: Option<u32>,
    },
    /// Log a finished period
    End { start: String, end: String },
    /// Remove a log by id
    Remove { id: uuid::Uuid },
    /// List logs, newest first
    List,
}

#[derive(Subcommand)]
enum ContractionAction {
    /// Record a contraction (RFC 3339 timestamps)
    Add { start: String, end: String },
    /// Average duration and spacing
    Summary,
}

#[derive(Subcommand)]
enum KickAction {
    /// Record a counting session; defaults to now
    Add {
        count: u32,
        /// RFC 3339 timestamp
        #[arg(long)]
        at: Option<String>,
    },
    /// Session count and average kicks
    Summary,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print one value, e.g. `prediction.strict_dates`
    Get { key: String },
    /// Set a value and save the file
    Set { key: String, value: String },
    List,
    /// Overwrite the file with defaults
    Reset,
}

fn main() {
    let cli = Cli::parse();
    let config_path = match cli.config.clone().map_or_else(Config::default_path, Ok) {
        Ok(path) => path,
        Err(e) => fail(&CommandError::from(e)),
    };
    let mut config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => fail(&CommandError::from(e)),
    };
    logging::init(&config.log_level);

    let result = match cli.command {
        Commands::Config { action } => run_config(action, &mut config, &config_path),
        Commands::Vault(command) => run(command, cli.passphrase, cli.json, &config),
    };
    if let Err(e) = result {
        fail(&e);
    }
}

fn fail(e: &CommandError) -> ! {
    eprintln!("error: {e}");
    std::process::exit(1);
}

fn run(
    command: VaultCommand,
    passphrase: Option<String>,
    json: bool,
    config: &Config,
) -> Result<(), CommandError> {
    let passphrase = passphrase.ok_or(CommandError::Locked)?;
    let dir = match &config.data_dir {
        Some(dir) => dir.clone(),
        None => default_data_dir()?,
    };
    let app = App::new(EncryptedFileStore::new(dir, passphrase), config, SystemClock);

    match command {
        VaultCommand::Init => {
            app.init()?;
            println!("vault created");
        }
        VaultCommand::Log { action } => match action {
            LogAction::Start {
                date,
                flow,
                symptoms,
                notes,
                duration_days,
            } => {
                let details = PeriodDetails {
                    flow,
                    symptoms,
                    notes,
                    duration_days,
                };
                let log = app.log_start(parse_date_arg(&date)?, details)?;
                emit(json, &log, || format!("period start logged: {}", log.id))?;
            }
            LogAction::End { start, end } => {
                let log = app.log_end(parse_date_arg(&start)?, parse_date_arg(&end)?)?;
                emit(json, &log, || format!("period end logged: {}", log.id))?;
            }
            LogAction::Remove { id } => {
                let log = app.remove_log(id)?;
                emit(json, &log, || format!("removed {}", log.id))?;
            }
            LogAction::List => {
                let logs = app.list_logs()?;
                emit(json, &logs, || render_logs(&logs))?;
            }
        },
        VaultCommand::Contraction { action } => match action {
            ContractionAction::Add { start, end } => {
                let log =
                    app.add_contraction(parse_timestamp_arg(&start)?, parse_timestamp_arg(&end)?)?;
                emit(json, &log, || {
                    format!("contraction logged: {}", format_duration(log.duration_secs))
                })?;
            }
            ContractionAction::Summary => {
                let summary = app.contraction_summary()?;
                emit(json, &summary, || match &summary {
                    None => "no contractions logged".to_string(),
                    Some(s) => format!(
                        "{} contractions, {} long, {}",
                        s.total,
                        format_duration(s.average_duration_secs),
                        s.average_interval_secs
                            .map_or("N/A".to_string(), |i| format!("{} apart", format_duration(i)))
                    ),
                })?;
            }
        },
        VaultCommand::Kick { action } => match action {
            KickAction::Add { count, at } => {
                let timestamp = match at {
                    Some(at) => parse_timestamp_arg(&at)?,
                    None => chrono::Utc::now(),
                };
                let session = app.add_kick_session(timestamp, count)?;
                emit(json, &session, || format!("{} kicks logged", session.kick_count))?;
            }
            KickAction::Summary => {
                let summary = app.kick_summary()?;
                emit(json, &summary, || match &summary {
                    None => "no kick sessions logged".to_string(),
                    Some(s) => format!(
                        "{} sessions, {} kicks total, {} on average",
                        s.sessions, s.total_kicks, s.average_kicks
                    ),
                })?;
            }
        },
        VaultCommand::Predict => {
            let prediction = app.predict()?;
            let show_fertility = config.prediction.show_fertility;
            if json {
                let mut value = serde_json::to_value(&prediction)?;
                if !show_fertility {
                    if let Some(map) = value.as_object_mut() {
                        for key in ["ovulationDate", "fertileStart", "fertileEnd"] {
                            map.remove(key);
                        }
                    }
                }
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!("{}", render_prediction(&prediction, show_fertility));
            }
        }
        VaultCommand::Insights => {
            let messages: Vec<String> = app.insights()?.iter().map(ToString::to_string).collect();
            emit(json, &messages, || {
                if messages.is_empty() {
                    "no insights yet".to_string()
                } else {
                    messages.join("\n")
                }
            })?;
        }
        VaultCommand::Summary => {
            let summary = app.summary()?;
            emit(json, &summary, || render_summary(&summary))?;
        }
        VaultCommand::Export => println!("{}", app.export()?),
        VaultCommand::Wipe { yes } => {
            if yes {
                app.wipe()?;
                println!("all data wiped");
            } else {
                eprintln!("refusing to wipe without --yes");
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

fn run_config(
    action: ConfigAction,
    config: &mut Config,
    path: &Path,
) -> Result<(), CommandError> {
    match action {
        ConfigAction::Get { key } => match config.get(&key) {
            Some(value) => println!("{value}"),
            None => return Err(ConfigError::UnknownKey(key).into()),
        },
        ConfigAction::Set { key, value } => {
            config.set(&key, &value)?;
            config.save_to(path)?;
            println!("ok");
        }
        ConfigAction::List => println!("{}", serde_json::to_string_pretty(config)?),
        ConfigAction::Reset => {
            Config::default().save_to(path)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}

fn emit<T: Serialize>(
    json: bool,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), CommandError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn render_prediction(p: &CyclePrediction, show_fertility: bool) -> String {
    let mut out = format!(
        "Next period:    {} to {} (cycle {} days)",
        p.period_start, p.period_end, p.cycle_length
    );
    if show_fertility {
        out.push_str(&format!(
            "\nOvulation:      {}\nFertile window: {} to {}",
            p.ovulation_date, p.fertile_start, p.fertile_end
        ));
    }
    out
}

fn render_summary(s: &CycleSummary) -> String {
    let days = |v: Option<u32>| v.map_or("N/A".to_string(), |d| format!("{d} days"));
    let span = |v: Option<i64>| v.map_or("N/A".to_string(), |d| format!("{d} days"));
    format!(
        "Period starts logged:  {}\nAverage cycle length:  {}\nAverage period length: {}\nShortest cycle:        {}\nLongest cycle:         {}\nRegularity:            {}",
        s.total_period_starts,
        days(s.average_cycle_length),
        days(s.average_period_length),
        span(s.shortest_cycle),
        span(s.longest_cycle),
        s.regularity,
    )
}

fn render_logs(logs: &[PeriodLog]) -> String {
    if logs.is_empty() {
        return "no period logs".to_string();
    }
    logs.iter()
        .map(|log| {
            format!(
                "{}  {:<12} {} {}",
                log.id,
                format!("{:?}", log.kind),
                log.start_date.as_deref().unwrap_or("-"),
                log.end_date.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
