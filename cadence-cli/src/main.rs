use anyhow::{Context, Result};
use cadence_core::{
    normalize, parse_local_datetime, FailureReason, Planner, Schedule, TaskKind,
};
use chrono::{Local, NaiveDateTime, Timelike};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod config;
mod state;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CADENCE_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(
    name = "cadence",
    version = VERSION,
    about = "Priority-driven scheduler for tasks and habits"
)]
struct Cli {
    /// Config file (default: ~/.cadence/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log engine decisions to stderr (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a schedule from a task list
    Plan {
        /// JSON task list: { "tasks": [...] }
        #[arg(long)]
        tasks: PathBuf,

        /// Reference time, YYYY-MM-DDTHH:MM (default: now, local)
        #[arg(long, value_parser = parse_now)]
        now: Option<NaiveDateTime>,

        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a schedule and write it as an ICS calendar
    ExportIcs {
        #[arg(long)]
        tasks: PathBuf,

        #[arg(long, value_parser = parse_now)]
        now: Option<NaiveDateTime>,

        /// Output file (default: stdout)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validate a task list without scheduling it
    Check {
        #[arg(long)]
        tasks: PathBuf,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,

    /// Print the effective config
    Show,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = config::config_path(cli.config.as_deref())?;

    match cli.command {
        Command::Plan { tasks, now, json } => {
            let cfg = config::load_config(&config_path)?;
            let schedule = run_plan(&cfg, &tasks, now)?;
            if json || cfg.output.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&schedule).context("serialize schedule")?
                );
            } else {
                print_schedule(&schedule);
            }
        }

        Command::ExportIcs { tasks, now, out } => {
            let cfg = config::load_config(&config_path)?;
            let schedule = run_plan(&cfg, &tasks, now)?;
            state::write_output(out.as_deref(), &schedule.to_ics())?;
            if let Some(p) = out {
                eprintln!("Wrote {} events to {}", schedule.placed.len(), p.display());
            }
        }

        Command::Check { tasks } => {
            let list = state::read_task_list(&tasks)?;
            let typed = normalize(&list.tasks)
                .with_context(|| format!("validating {}", tasks.display()))?;
            let habits = typed
                .values()
                .filter(|t| matches!(t.kind, TaskKind::Habit(_)))
                .count();
            println!(
                "OK: {} tasks ({} once, {} habits)",
                typed.len(),
                typed.len() - habits,
                habits
            );
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(&config_path)?,
            ConfigCommand::Show => {
                let cfg = config::load_config(&config_path)?;
                println!("# {}", config_path.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "cadence_core=debug,cadence=debug,info",
        _ => "trace",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(default)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_now(s: &str) -> Result<NaiveDateTime, String> {
    parse_local_datetime(s)
}

fn run_plan(cfg: &config::Config, tasks: &Path, now: Option<NaiveDateTime>) -> Result<Schedule> {
    let list = state::read_task_list(tasks)?;
    let now = now.unwrap_or_else(local_now);
    debug!(tasks = list.tasks.len(), %now, "planning");
    Planner::new(cfg.engine.clone())
        .plan(&list.tasks, now)
        .with_context(|| format!("planning {}", tasks.display()))
}

fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}

fn print_schedule(schedule: &Schedule) {
    let mut day = None;
    for p in &schedule.placed {
        if day != Some(p.start.date()) {
            let date = p.start.date();
            println!("\n{} ({})", date, date.format("%a"));
            day = Some(date);
        }
        println!(
            "  {}-{}  {}",
            p.start.format("%H:%M"),
            p.end.format("%H:%M"),
            p.label()
        );
    }

    if !schedule.unplaceable.is_empty() {
        println!("\nUnplaceable:");
        for u in &schedule.unplaceable {
            println!("  {}: {} ({})", u.label(), u.reason, u.detail);
        }
    }

    let s = schedule.summary();
    println!(
        "\n{} placed, {} unplaceable, {} busy min, {} idle min",
        s.placed, s.unplaceable, s.busy_minutes, s.idle_minutes
    );
    let only_shortfalls = schedule
        .unplaceable
        .iter()
        .all(|u| u.reason == FailureReason::Underspecified);
    if s.unplaceable > 0 && only_shortfalls {
        println!("Hint: add selected_days or exact_times to habits that need more anchors.");
    }
}
