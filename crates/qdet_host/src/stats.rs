//! Latency statistics for annotation benchmarks.
//!
//! Tracks minimum, maximum, average and a coarse histogram of per-circuit
//! annotation times so that slow inputs stand out in a batch run.

const BUCKETS: usize = 20;
const BUCKET_WIDTH_US: u64 = 1_000;

/// Accumulated annotation latencies, in microseconds.
#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub min: u64,
    pub max: u64,
    pub sum: u64,
    pub count: u64,
    pub buckets: [u64; BUCKETS],
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            min: u64::MAX,
            max: 0,
            sum: 0,
            count: 0,
            buckets: [0; BUCKETS],
        }
    }

    /// Records one run of `micros` microseconds into a 1 ms bucket.
    pub fn update(&mut self, micros: u64) {
        self.min = self.min.min(micros);
        self.max = self.max.max(micros);
        self.sum += micros;
        self.count += 1;

        let idx = ((micros / BUCKET_WIDTH_US) as usize).min(BUCKETS - 1);
        self.buckets[idx] += 1;
    }

    /// Folds the samples of `other` into `self`.
    ///
    /// Used to combine the per-worker trackers of a parallel run.
    pub fn merge(mut self, other: LatencyStats) -> LatencyStats {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
        for (a, b) in self.buckets.iter_mut().zip(other.buckets) {
            *a += b;
        }
        self
    }

    /// Average latency in microseconds, or 0.0 before any sample.
    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }

    pub fn print_report(&self) {
        println!("\nAnnotation Latency");
        println!("Count: {}", self.count);
        if self.count == 0 {
            return;
        }

        let avg_us = self.avg();
        if avg_us < 1000.0 {
            println!("Min:   {:.2} us", self.min as f64);
            println!("Avg:   {:.2} us", avg_us);
            println!("Max:   {:.2} us", self.max as f64);
        } else {
            println!("Min:   {:.2} ms", self.min as f64 / 1000.0);
            println!("Avg:   {:.2} ms", avg_us / 1000.0);
            println!("Max:   {:.2} ms", self.max as f64 / 1000.0);
        }

        println!("Distribution (1ms buckets):");
        for (i, &count) in self.buckets.iter().enumerate() {
            if count > 0 {
                let open = if i == BUCKETS - 1 { ">" } else { "" };
                println!("[{:3}-{:3}{} ms]: {}", i, i + 1, open, count);
            }
        }
    }
}
