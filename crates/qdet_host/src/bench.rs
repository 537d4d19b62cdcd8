use crate::stats::LatencyStats;
use anyhow::{Context, Result};
use qdet_core::circuit::Circuit;
use qdet_core::{DetectorConfig, annotate_detectors};
use qdet_io::load_circuit_file;
use rayon::prelude::*;
use std::time::Instant;

/// Annotates every circuit `repeat` times on the rayon pool and reports
/// throughput and per-run latency.
pub fn run_benchmark(paths: &[String], repeat: usize, config: &DetectorConfig) -> Result<()> {
    println!("Loading {} circuit files...", paths.len());
    let start_load = Instant::now();
    let circuits: Vec<(String, Circuit)> = paths
        .iter()
        .map(|p| Ok((p.clone(), load_circuit_file(p)?)))
        .collect::<Result<_>>()?;
    println!("Loaded in {:?}.", start_load.elapsed());

    let jobs: Vec<&(String, Circuit)> = circuits.iter().flat_map(|c| std::iter::repeat_n(c, repeat)).collect();

    // Fragment propagation stays sequential; the jobs already fill the pool.
    let config = DetectorConfig {
        parallel: false,
        ..config.clone()
    };

    println!("Starting Benchmark (Parallel - Rayon, {} runs)...", jobs.len());
    let start_bench = Instant::now();
    let (stats, detectors, warnings) = jobs
        .par_iter()
        .map(|(path, circuit)| {
            let started = Instant::now();
            let report = annotate_detectors(circuit, &config).with_context(|| format!("Failed to annotate {path}"))?;
            let mut stats = LatencyStats::new();
            stats.update(started.elapsed().as_micros() as u64);
            Ok::<_, anyhow::Error>((stats, report.detectors.len(), report.warnings.len()))
        })
        .try_reduce(
            || (LatencyStats::new(), 0, 0),
            |a, b| Ok((a.0.merge(b.0), a.1 + b.1, a.2 + b.2)),
        )?;

    let seconds = start_bench.elapsed().as_secs_f64();
    println!("Results");
    println!("Time: {:.4} s", seconds);
    println!("Throughput: {:.2} circuits/s", jobs.len() as f64 / seconds);
    println!("Detectors: {detectors}");
    println!("Budget warnings: {warnings}");
    stats.print_report();

    Ok(())
}
