use std::path::PathBuf;

use anyhow::Result;
use chrono::{Datelike, Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use log::debug;

use commands::{
    add_medication, check_all, edit_medication, list_medications, remove_medication,
    set_dose_checked, show_calendar, show_day, show_diary, show_next, write_diary, EntryChanges,
};
use daemon::run_daemon;
use database::JsonStore;
use diary::HealthStatus;
use time::TimeSlot;

pub mod calendar;
pub mod commands;
pub mod config;
pub mod daemon;
pub mod database;
pub mod diary;
pub mod frequency;
pub mod medication;
pub mod resolver;
pub mod schedule;
pub mod time;

#[derive(Parser)]
#[command(name = "sonju")]
#[command(
    about = "Medication schedule and dose reminders",
    long_about = "Expands medication courses into a per-day dose schedule, tracks which doses were taken and tells you what to take next. Everything is saved as JSON for easy import/export."
)]
#[command(version)]
struct Cli {
    /// Data directory (default: $SONJU_HOME or ~/.sonju)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn parse_date_arg(s: &str) -> Result<NaiveDate, String> {
    time::parse_date(s).ok_or_else(|| format!("invalid date '{}' (use YYYY-MM-DD)", s))
}

fn parse_time_arg(s: &str) -> Result<NaiveTime, String> {
    time::parse_time(s).ok_or_else(|| format!("invalid time '{}' (use HH:MM)", s))
}

fn parse_times_arg(s: &str) -> Result<u8, String> {
    frequency::parse_times_per_day(s).ok_or_else(|| {
        format!(
            "invalid frequency '{}' (use 1-4, 'twice daily', 'tid', '하루 3번', ...)",
            s
        )
    })
}

fn parse_month_arg(s: &str) -> Result<(i32, u32), String> {
    calendar::parse_month(s).ok_or_else(|| format!("invalid month '{}' (use YYYY-MM)", s))
}

#[derive(Subcommand)]
enum Commands {
    #[command(visible_aliases = ["a", "ad"])]
    /// Add a medication course and schedule its doses
    Add {
        /// Name of the medication
        name: String,
        /// Doses per day: 1-4 or e.g. "twice daily", "tid", "하루 3번"
        #[arg(short, long, value_parser = parse_times_arg)]
        times: u8,
        /// Number of days to take it
        #[arg(short, long)]
        days: u32,
        /// First day (default: today)
        #[arg(short, long, value_parser = parse_date_arg)]
        start: Option<NaiveDate>,
    },
    /// Change a medication course (reschedules all of its doses)
    #[command(visible_alias = "e")]
    Edit {
        /// Name of the medication to edit
        name: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        /// New doses per day
        #[arg(long, value_parser = parse_times_arg)]
        times: Option<u8>,
        /// New number of days
        #[arg(long)]
        days: Option<u32>,
        /// New first day
        #[arg(long, value_parser = parse_date_arg)]
        start: Option<NaiveDate>,
    },
    /// Remove a medication and all of its doses
    #[command(visible_alias = "r")]
    Remove {
        /// Name of the medication
        name: String,
    },
    /// List registered medications
    #[command(visible_aliases = ["l", "ls"])]
    List,
    /// Show the doses of one day
    #[command(visible_alias = "s")]
    Today {
        /// Day to show (default: today)
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Mark a dose as taken
    #[command(visible_alias = "t")]
    Check {
        name: String,
        /// Slot: 08:00, 12:00, 18:00, 22:00 or morning/midday/evening/bedtime
        #[arg(long)]
        slot: TimeSlot,
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Mark a dose as NOT taken (undo)
    #[command(visible_alias = "u")]
    Uncheck {
        name: String,
        #[arg(long)]
        slot: TimeSlot,
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Mark ALL doses of a day (or one slot of it) as taken
    #[command(visible_alias = "ta")]
    CheckAll {
        #[arg(long)]
        slot: Option<TimeSlot>,
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Show the next dose still to take today
    #[command(visible_alias = "n")]
    Next {
        /// Pretend the current time is HH:MM
        #[arg(long, value_parser = parse_time_arg)]
        at: Option<NaiveTime>,
    },
    /// Show a month calendar with dose markers
    #[command(visible_alias = "c")]
    Calendar {
        /// Month to show as YYYY-MM (default: this month)
        #[arg(short, long, value_parser = parse_month_arg)]
        month: Option<(i32, u32)>,
    },
    /// Health diary
    #[command(subcommand)]
    Diary(DiaryCommands),
    /// Start the background daemon for reminders
    #[command(visible_alias = "d")]
    Daemon,
}

#[derive(Subcommand)]
enum DiaryCommands {
    /// Write the entry for a day
    Write {
        content: String,
        /// healthy, warning or danger
        #[arg(long)]
        status: Option<HealthStatus>,
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
    /// Show one day, or the last week of entries
    Show {
        #[arg(short, long, value_parser = parse_date_arg)]
        date: Option<NaiveDate>,
    },
}

fn run(command: Commands, store: &JsonStore) -> Result<()> {
    let now = Local::now().naive_local();
    let today = now.date();

    match command {
        Commands::Add {
            name,
            times,
            days,
            start,
        } => add_medication(store, name, times, days, start.unwrap_or(today)),
        Commands::Edit {
            name,
            rename,
            times,
            days,
            start,
        } => edit_medication(
            store,
            name,
            EntryChanges {
                name: rename,
                times_per_day: times,
                duration_days: days,
                start_date: start,
            },
        ),
        Commands::Remove { name } => remove_medication(store, name),
        Commands::List => list_medications(store, today),
        Commands::Today { date } => show_day(store, date.unwrap_or(today)),
        Commands::Check { name, slot, date } => {
            set_dose_checked(store, name, slot, date.unwrap_or(today), true)
        }
        Commands::Uncheck { name, slot, date } => {
            set_dose_checked(store, name, slot, date.unwrap_or(today), false)
        }
        Commands::CheckAll { slot, date } => check_all(store, date.unwrap_or(today), slot),
        Commands::Next { at } => {
            show_next(store, today.and_time(at.unwrap_or(now.time())));
            Ok(())
        }
        Commands::Calendar { month } => {
            let (year, month) = month.unwrap_or((today.year(), today.month()));
            show_calendar(store, year, month, today)
        }
        Commands::Diary(DiaryCommands::Write {
            content,
            status,
            date,
        }) => write_diary(store, date.unwrap_or(today), content, status),
        Commands::Diary(DiaryCommands::Show { date }) => show_diary(store, date),
        Commands::Daemon => {
            run_daemon(store);
            Ok(())
        }
    }
}

fn main() {
    config::init_logging();
    let cli = Cli::parse();
    let store = JsonStore::new(config::data_dir(cli.data_dir));
    debug!("data directory: {}", store.dir().display());

    if let Err(e) = run(cli.command, &store) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
