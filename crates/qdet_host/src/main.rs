mod bench;
mod check;
mod generator;
mod stats;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use qdet_core::{DetectorConfig, annotate_detectors};
use qdet_io::{load_circuit_file, save_circuit_file, write_circuit};
use std::time::Duration;
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "qdet", about = "Detector annotation for stabilizer circuits")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct SearchArgs {
    /// Propagate fragments on a single thread.
    #[arg(long)]
    sequential: bool,
    /// Require an explicit reset before a qubit's first gate.
    #[arg(long)]
    no_implicit_init: bool,
    /// Do not append the fragment index to detector coordinates.
    #[arg(long)]
    no_time_coordinate: bool,
    #[arg(long, default_value_t = 2)]
    certify_above: usize,
    #[arg(long, default_value_t = 256)]
    sat_queries: usize,
    /// Wall-clock limit per boundary; results may then vary between runs.
    #[arg(long)]
    sat_time_ms: Option<u64>,
}

impl SearchArgs {
    fn config(&self) -> DetectorConfig {
        DetectorConfig {
            parallel: !self.sequential,
            implicit_zero_init: !self.no_implicit_init,
            append_time_coordinate: !self.no_time_coordinate,
            certify_above_weight: self.certify_above,
            sat_query_budget: self.sat_queries,
            sat_time_budget: self.sat_time_ms.map(Duration::from_millis),
            ..DetectorConfig::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add DETECTOR annotations to a circuit file.
    Annotate {
        #[arg(short, long)]
        input: String,
        /// Output path; the annotated circuit goes to stdout when omitted.
        #[arg(short, long)]
        output: Option<String>,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Write an unannotated repetition-code memory circuit.
    Gen {
        #[arg(long, default_value = "bench.stim")]
        output: String,
        #[arg(long, default_value_t = 5)]
        distance: u32,
        #[arg(long, default_value_t = 10)]
        rounds: u32,
        #[arg(long, default_value_t = 0.0)]
        p: f64,
    },
    /// Annotate circuit files in parallel and report latency.
    Bench {
        #[arg(required = true)]
        files: Vec<String>,
        #[arg(long, default_value_t = 1)]
        repeat: usize,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Evaluate the detectors of an annotated circuit on sampled shots.
    Check {
        #[arg(short, long)]
        circuit: String,
        #[arg(short, long)]
        b8: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Annotate { input, output, search } => {
            let circuit = load_circuit_file(&input)?;
            let report = annotate_detectors(&circuit, &search.config())?;
            for w in &report.warnings {
                warn!(
                    boundary = w.boundary,
                    unresolved = w.unresolved.len(),
                    "detectors kept without a minimality certificate"
                );
            }
            let odd = report.detectors.iter().filter(|d| d.parity).count();
            if odd > 0 {
                info!(odd, "detectors with odd noiseless parity, written relative to the reference sample");
            }
            match output {
                Some(path) => {
                    save_circuit_file(&path, &report.circuit)?;
                    println!(
                        "{input}: {} fragments, {} new detectors, {} sat queries in {:?} -> {path}",
                        report.fragments,
                        report.detectors.len(),
                        report.sat_queries,
                        report.elapsed
                    );
                }
                None => print!("{}", write_circuit(&report.circuit)),
            }
        }
        Commands::Gen {
            output,
            distance,
            rounds,
            p,
        } => {
            generator::generate_repetition_code(&output, distance, rounds, p)?;
        }
        Commands::Bench { files, repeat, search } => {
            bench::run_benchmark(&files, repeat.max(1), &search.config())?;
        }
        Commands::Check { circuit, b8 } => {
            check::run_check(&circuit, &b8)?;
        }
    }
    Ok(())
}
