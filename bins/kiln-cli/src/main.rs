//! kiln — command-line driver for the Kiln protocol simulation.
//!
//! `kiln simulate` runs the deterministic multi-week scenario and prints the
//! weekly supply report; `kiln config` prints the effective configuration.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use kiln_core::constants::ONE;
use kiln_core::time::{week_start, Timestamp};
use kiln_sim::{init_logging, run_scenario, ProtocolConfig, Simulation};
use tracing::info;

/// Kiln weekly emissions simulator.
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version, about = "Weekly checkpointed emissions, duration-weighted locks and pool rewards")]
struct Cli {
    /// Config file (default: <config dir>/kiln/kiln.toml if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json"); overrides the config file.
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deterministic scenario and print the weekly report.
    Simulate(SimulateArgs),
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Args)]
struct SimulateArgs {
    /// Number of weeks to simulate after the vault opens.
    #[arg(short, long, default_value_t = 26)]
    weeks: u64,

    /// Deployment date (YYYY-MM-DD, UTC midnight).
    #[arg(long, default_value = "2023-01-01")]
    start: String,

    /// Report format ("text" or "json").
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Override the weekly emission rate, in basis points.
    #[arg(long)]
    weekly_rate_bps: Option<u64>,

    /// Override the post-ramp weekly decay, in basis points.
    #[arg(long)]
    decay_bps: Option<u64>,

    /// Override the number of undecayed ramp weeks.
    #[arg(long)]
    ramp_weeks: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ProtocolConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Commands::Simulate(args) = &cli.command {
        apply_overrides(&mut config, args);
    }
    config.validate().context("invalid configuration")?;

    init_logging(&config.log_level, &config.log_format).context("failed to initialize logging")?;
    info!("kiln v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Simulate(args) => simulate(&config, args),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn apply_overrides(config: &mut ProtocolConfig, args: &SimulateArgs) {
    if let Some(bps) = args.weekly_rate_bps {
        config.weekly_rate_bps = bps;
    }
    if let Some(bps) = args.decay_bps {
        config.decay_bps = bps;
    }
    if let Some(weeks) = args.ramp_weeks {
        config.ramp_weeks = weeks;
    }
}

fn simulate(config: &ProtocolConfig, args: SimulateArgs) -> Result<()> {
    let deployed_at = parse_date(&args.start)?;
    info!(start = %args.start, weeks = args.weeks, "simulate: running scenario");

    let sim = run_scenario(config, deployed_at, args.weeks).context("scenario failed")?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&sim)?),
        "text" => print_report(&sim),
        other => bail!("unknown report format: {other} (expected \"text\" or \"json\")"),
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<Timestamp> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date: {s}"))?;
    let ts = date
        .and_hms_opt(0, 0, 0)
        .context("invalid time of day")?
        .and_utc()
        .timestamp();
    u64::try_from(ts).with_context(|| format!("date before 1970: {s}"))
}

fn format_date(ts: Timestamp) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "?".to_string())
}

/// Whole tokens with two decimals.
fn tokens(amount: u128) -> String {
    let whole = amount / ONE;
    let cents = (amount % ONE) / (ONE / 100);
    format!("{whole}.{cents:02}")
}

fn print_report(sim: &Simulation) {
    println!("\n=== KILN SIMULATION ===");
    println!("Deployed: {}", format_date(sim.deployed_at));
    println!("Ended:    {}", format_date(sim.ended_at));
    println!("Events:   {}", sim.events.len());
    println!("Claimed:  {} KILN", tokens(sim.total_claimed));
    println!();
    println!(
        "{:>6}  {:<10}  {:>18}  {:>18}  {:>18}  {:>14}",
        "week", "starts", "supply", "max supply", "locked", "budget"
    );
    for row in &sim.reports {
        let budget = if row.finalized {
            tokens(row.budget)
        } else {
            "pending".to_string()
        };
        println!(
            "{:>6}  {:<10}  {:>18}  {:>18}  {:>18}  {:>14}",
            row.week,
            format_date(week_start(row.week)),
            tokens(row.realized_supply),
            tokens(row.maximum_supply),
            tokens(row.locked),
            budget
        );
    }
}
