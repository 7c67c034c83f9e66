//! Biathlon Race CLI Application
//!
//! Command-line front end for the biathlon-engine library. It adds:
//! - Config file loading (JSON/TOML)
//! - Output file generation (narration log, final report as TXT/JSON)
//! - Console summary and logging setup

use anyhow::{Context, Result};
use biathlon_engine::RaceOutcome;
use clap::Parser;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

mod config;
mod report;

use report::OutputFormat;

/// Biathlon Race - Replay race events and produce results
#[derive(Parser, Debug)]
#[command(name = "biathlon-cli")]
#[command(about = "Replay biathlon race events and produce a ranked report", long_about = None)]
#[command(version)]
struct Args {
    /// Path to race configuration file (JSON or TOML)
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Path to the incoming events file
    #[arg(short, long, value_name = "FILE")]
    events: PathBuf,

    /// Output file for the annotated event log
    #[arg(long, value_name = "FILE", default_value = "results/output.log")]
    log_output: PathBuf,

    /// Output file for the final report
    #[arg(short, long, value_name = "FILE", default_value = "results/final_report.txt")]
    report: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Txt)]
    format: OutputFormat,

    /// Also print the narration and the report to stdout
    #[arg(short, long)]
    print: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Biathlon Race CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using engine library v{}", biathlon_engine::VERSION);

    let outcome = run(&args.config, &args.events)?;

    report::write_lines(&args.log_output, outcome.narration())?;
    log::info!("Event log written to {:?}", args.log_output);

    let report_text = report::render_report(&outcome, args.format)?;
    report::write_text(&args.report, &report_text)?;
    log::info!("Final report written to {:?}", args.report);

    if args.print {
        for line in outcome.narration() {
            println!("{}", line);
        }
        println!();
        print!("{}", report_text);
    }

    if !args.quiet {
        print_summary(&outcome);
    }

    Ok(())
}

/// Load the configuration and replay the event file
fn run(config_path: &Path, events_path: &Path) -> Result<RaceOutcome> {
    let config = config::load_config(config_path)?;

    let file = File::open(events_path)
        .with_context(|| format!("Failed to open events file: {:?}", events_path))?;

    let outcome = biathlon_engine::run_race(config, BufReader::new(file))
        .with_context(|| format!("Failed to process events from {:?}", events_path))?;

    log::info!(
        "Recorded {} events for {} competitors",
        outcome.history().len(),
        outcome.competitors().count()
    );

    Ok(outcome)
}

fn print_summary(outcome: &RaceOutcome) {
    let ranked = outcome.ranked();
    let finished = ranked
        .iter()
        .filter(|c| c.status == biathlon_engine::CompetitorStatus::Finished)
        .count();

    println!("═══════════════════════════════════════════════");
    println!("  Race Summary");
    println!("═══════════════════════════════════════════════");
    println!("  Competitors: {}", ranked.len());
    println!("  Finished:    {}", finished);
    println!("  Warnings:    {}", outcome.diagnostics().len());
    if let Some(winner) = ranked.first().filter(|c| c.total_time().is_some()) {
        println!("  Winner:      competitor {}", winner.id);
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
