use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;

use coachrs::config::AppConfig;
use coachrs::database::Database;
use coachrs::engine::CoachEngine;
use coachrs::export::{write_daily_loads, ExportFormat};
use coachrs::fatigue::FatigueScorer;
use coachrs::ingest;
use coachrs::load::{LoadAggregator, SNAPSHOT_DEFAULT_DAYS};
use coachrs::logging::{init_logging, LogLevel};
use coachrs::models::Checkin;
use coachrs::notify::ConsoleNotifier;
use coachrs::report::{session_report, SummaryView};

/// coachrs - Training Load Coaching CLI
///
/// A Rust-based tool for recording training sessions and daily check-ins,
/// estimating session load, and running inactivity/overload coaching rules
/// over recent load and fatigue signals.
#[derive(Parser)]
#[command(name = "coachrs")]
#[command(author = "coachrs contributors")]
#[command(version = "0.1.0")]
#[command(about = "Training load coaching CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file path (overrides the config)
    #[arg(short, long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import sessions from a JSON file
    Import {
        /// Input file path (JSON array of session records)
        #[arg(short, long)]
        file: PathBuf,

        /// User the sessions belong to when records do not say
        #[arg(short, long)]
        user: Option<i64>,
    },

    /// Record a daily check-in
    Checkin {
        /// User the check-in belongs to
        #[arg(short, long)]
        user: Option<i64>,

        /// Hours slept last night
        #[arg(short, long)]
        sleep: Option<Decimal>,

        /// Muscle soreness from 1 (none) to 5 (severe)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        soreness: Option<u8>,

        /// Mood from 1 (poor) to 5 (great)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=5))]
        mood: Option<u8>,

        /// Free-form note
        #[arg(long)]
        note: Option<String>,

        /// Day to record for (YYYY-MM-DD, today when omitted)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show the recent training summary and fatigue index
    Summary {
        /// User to summarize
        #[arg(short, long)]
        user: Option<i64>,

        /// Window length in days
        #[arg(short = 'n', long, default_value = "7")]
        days: u32,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Report on a single session with its load estimate
    Report {
        /// User whose latest session to report on
        #[arg(short, long)]
        user: Option<i64>,

        /// Session external id (most recent session when omitted)
        #[arg(short, long)]
        session: Option<i64>,
    },

    /// Run the coaching pass over all eligible users
    Coach {
        /// Print decisions without sending or recording anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Rebuild cached per-day load rows
    Snapshot {
        /// User to aggregate
        #[arg(short, long)]
        user: Option<i64>,

        /// Days back to aggregate, 1 to 30
        #[arg(short = 'n', long)]
        days: Option<u32>,
    },

    /// Export cached daily load rows
    Export {
        /// User to export
        #[arg(short, long)]
        user: Option<i64>,

        /// Days back to include
        #[arg(short = 'n', long, default_value = "30")]
        days: u32,

        /// Export format (csv, json)
        #[arg(short = 'f', long, default_value = "csv")]
        format: String,

        /// Output file path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or initialize application settings
    Config {
        /// Write the default config to the standard location
        #[arg(long)]
        init: bool,

        /// Print the active configuration
        #[arg(long)]
        show: bool,
    },

    /// Register a user or update their delivery settings
    User {
        /// User id
        #[arg(short, long)]
        id: i64,

        /// Chat id coaching messages are delivered to
        #[arg(long)]
        chat: Option<i64>,

        /// Turn automatic coaching on or off
        #[arg(long)]
        coach: Option<bool>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };
    if cli.verbose > 0 {
        config.logging.level = LogLevel::from_verbosity(cli.verbose);
    }
    init_logging(&config.logging)?;

    if let Some(path) = &cli.database {
        config.settings.database_path = path.clone();
    }

    match cli.command {
        Commands::Import { file, user } => {
            let user_id = resolve_user(user, &config)?;
            println!("{}", "Importing sessions...".green().bold());
            println!("  File: {}", file.display());

            let db = open_database(&config)?;
            let (count, newest) = ingest::import_sessions(&db, &file, user_id)?;
            println!("{}", format!("✓ Imported {} sessions", count).green());

            if let Some(session) = newest {
                println!();
                println!("{}", session_report(&session));
            }
        }

        Commands::Checkin {
            user,
            sleep,
            soreness,
            mood,
            note,
            date,
        } => {
            let user_id = resolve_user(user, &config)?;
            let day = date.unwrap_or_else(|| Utc::now().date_naive());

            let db = open_database(&config)?;
            db.ensure_user(user_id)?;
            db.upsert_checkin(&Checkin {
                user_id,
                day,
                sleep_hours: sleep,
                soreness,
                mood,
                note,
            })?;
            println!("{}", format!("✓ Check-in recorded for {}", day).cyan());

            let scorer = FatigueScorer::with_config(config.fatigue.clone());
            let (fatigue, _) =
                scorer.score(&db, user_id, config.engine.window_days, Utc::now())?;
            println!("  Fatigue index: {}", fatigue);
        }

        Commands::Summary { user, days, json } => {
            let user_id = resolve_user(user, &config)?;
            let db = open_database(&config)?;
            let scorer = FatigueScorer::with_config(config.fatigue.clone());
            let view = SummaryView::collect(&db, &scorer, user_id, days, Utc::now())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", view.render_text());
            }
        }

        Commands::Report { user, session } => {
            let db = open_database(&config)?;
            let found = match session {
                Some(external_id) => db.get_session(external_id)?,
                None => {
                    let user_id = resolve_user(user, &config)?;
                    db.latest_session(user_id)?
                }
            };

            match found {
                Some(session) => println!("{}", session_report(&session)),
                None => println!("{}", "No sessions on record".yellow()),
            }
        }

        Commands::Coach { dry_run } => {
            let db = open_database(&config)?;
            let engine = CoachEngine::with_config(config.engine.clone(), config.fatigue.clone());
            let now = Utc::now();

            if dry_run {
                println!("{}", "Coaching pass (dry run)...".magenta().bold());
                let users = db.list_eligible_users(config.engine.user_limit)?;
                for user in &users {
                    let decision = engine.evaluate_user(&db, user, now)?;
                    match decision.message() {
                        Some(text) => println!("  user {}: {}", user.user_id, text),
                        None => println!("  user {}: no action", user.user_id),
                    }
                }
                println!("{}", format!("✓ Evaluated {} users", users.len()).magenta());
            } else {
                println!("{}", "Coaching pass...".magenta().bold());
                let notifier = ConsoleNotifier::new();
                let outcome = engine.run_batch(&db, &notifier, now)?;
                println!("  Processed: {}", outcome.users_processed);
                println!("  Nudges:    {}", outcome.nudged);
                println!("  Warnings:  {}", outcome.warned);
                if outcome.delivery_failures > 0 {
                    println!(
                        "  {}",
                        format!("Failures:  {}", outcome.delivery_failures).red()
                    );
                }
                println!("{}", "✓ Coaching pass completed".magenta());
            }
        }

        Commands::Snapshot { user, days } => {
            let user_id = resolve_user(user, &config)?;
            let days = days.unwrap_or(SNAPSHOT_DEFAULT_DAYS);
            println!("{}", "Building daily load snapshot...".yellow().bold());

            let db = open_database(&config)?;
            let written = LoadAggregator::snapshot(&db, user_id, days, Utc::now())?;
            println!("{}", format!("✓ Snapshot covers {} days", written).yellow());
        }

        Commands::Export {
            user,
            days,
            format,
            output,
        } => {
            let user_id = resolve_user(user, &config)?;
            let format: ExportFormat = format
                .parse()
                .map_err(|reason: String| anyhow::anyhow!(reason))?;

            let db = open_database(&config)?;
            let today = Utc::now().date_naive();
            let from = today - Duration::days(i64::from(days));
            let rows = db.daily_loads(user_id, from, today + Duration::days(1))?;

            match output {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    write_daily_loads(&rows, format, file)?;
                    println!(
                        "{}",
                        format!("✓ Exported {} rows to {}", rows.len(), path.display()).yellow()
                    );
                }
                None => write_daily_loads(&rows, format, io::stdout().lock())?,
            }
        }

        Commands::Config { init, show } => {
            println!("{}", "Managing configuration...".white().bold());
            if init {
                let mut fresh = AppConfig::default();
                fresh.save()?;
                println!("  Wrote {}", AppConfig::default_config_path().display());
            }
            if show {
                print!("{}", toml::to_string_pretty(&config)?);
            }
            if !init && !show {
                println!("  Config file: {}", AppConfig::default_config_path().display());
                println!("  Database:    {}", config.settings.database_path.display());
            }
            println!("{}", "✓ Configuration done".white());
        }

        Commands::User { id, chat, coach } => {
            let db = open_database(&config)?;
            match (chat, coach) {
                (Some(chat_id), enabled) => {
                    db.upsert_user(id, Some(chat_id), enabled.unwrap_or(true))?;
                }
                (None, Some(enabled)) => {
                    db.set_coach_enabled(id, enabled)?;
                }
                (None, None) => {
                    db.ensure_user(id)?;
                }
            }
            println!("{}", format!("✓ User {} saved", id).cyan());
        }
    }

    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::new(&config.settings.database_path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.settings.database_path.display()
        )
    })
}

fn resolve_user(explicit: Option<i64>, config: &AppConfig) -> Result<i64> {
    explicit
        .or(config.settings.default_user_id)
        .context("No user id given; pass --user or set default_user_id in the config")
}
