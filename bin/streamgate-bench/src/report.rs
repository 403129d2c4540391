//! Aggregation of per-request samples into a benchmark report.

use std::fmt;
use std::time::Duration;

/// Raw outcomes collected while a run is in flight.
#[derive(Debug, Default)]
pub struct Samples {
    pub latencies: Vec<Duration>,
    /// `usage.total_tokens` per successful request.
    pub tokens: Vec<u64>,
    pub errors: Vec<String>,
}

impl Samples {
    pub fn record_success(&mut self, latency: Duration, total_tokens: u64) {
        self.latencies.push(latency);
        self.tokens.push(total_tokens);
    }

    pub fn record_failure(&mut self, error: String) {
        self.errors.push(error);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencyStats {
    pub min: Duration,
    pub avg: Duration,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub max: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub url: String,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub wall: Duration,
    /// `None` when no request succeeded.
    pub latency: Option<LatencyStats>,
    pub requests_per_sec: f64,
    pub total_tokens: u64,
    /// Average tokens per request divided by average latency.
    pub tokens_per_sec: f64,
}

impl Report {
    pub fn from_samples(url: impl Into<String>, total: usize, samples: Samples, wall: Duration) -> Self {
        let successful = samples.latencies.len();
        let total_tokens: u64 = samples.tokens.iter().sum();

        let mut sorted = samples.latencies;
        sorted.sort_unstable();

        let latency = (!sorted.is_empty()).then(|| {
            let sum: Duration = sorted.iter().sum();
            LatencyStats {
                min: sorted[0],
                avg: sum / successful as u32,
                p50: percentile(&sorted, 0.50),
                p95: percentile(&sorted, 0.95),
                p99: percentile(&sorted, 0.99),
                max: sorted[sorted.len() - 1],
            }
        });

        let wall_secs = wall.as_secs_f64();
        let requests_per_sec = if wall_secs > 0.0 {
            successful as f64 / wall_secs
        } else {
            0.0
        };

        let tokens_per_sec = match latency {
            Some(stats) if stats.avg > Duration::ZERO => {
                (total_tokens as f64 / successful as f64) / stats.avg.as_secs_f64()
            }
            _ => 0.0,
        };

        Self {
            url: url.into(),
            total,
            successful,
            failed: samples.errors.len(),
            wall,
            latency,
            requests_per_sec,
            total_tokens,
            tokens_per_sec,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total as f64 * 100.0
    }
}

/// Nearest-rank style percentile: element at `floor(len * q)` of the sorted
/// slice, clamped to the last element.
pub fn percentile(sorted: &[Duration], q: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let index = ((sorted.len() as f64 * q) as usize).min(sorted.len() - 1);
    sorted[index]
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "========== Benchmark Results ==========")?;
        writeln!(f, "Service URL:         {}", self.url)?;
        writeln!(f, "Total Requests:      {}", self.total)?;
        writeln!(f, "Successful:          {}", self.successful)?;
        writeln!(f, "Failed:              {}", self.failed)?;
        writeln!(f, "Duration:            {:.2}s", self.wall.as_secs_f64())?;
        writeln!(f, "Success Rate:        {:.1}%", self.success_rate())?;

        let Some(stats) = self.latency else {
            return writeln!(f, "No successful requests to analyze");
        };

        writeln!(f, "\n--- Latency (ms) ---")?;
        writeln!(f, "Min:                 {:.2}", ms(stats.min))?;
        writeln!(f, "Avg:                 {:.2}", ms(stats.avg))?;
        writeln!(f, "P50:                 {:.2}", ms(stats.p50))?;
        writeln!(f, "P95:                 {:.2}", ms(stats.p95))?;
        writeln!(f, "P99:                 {:.2}", ms(stats.p99))?;
        writeln!(f, "Max:                 {:.2}", ms(stats.max))?;

        writeln!(f, "\n--- Throughput ---")?;
        writeln!(f, "Requests/sec:        {:.2}", self.requests_per_sec)?;
        writeln!(f, "Total Tokens:        {}", self.total_tokens)?;
        writeln!(
            f,
            "Avg Tokens/Request:  {:.0}",
            self.total_tokens as f64 / self.successful as f64
        )?;
        writeln!(f, "Avg Tokens/sec:      {:.2}", self.tokens_per_sec)?;
        write!(f, "========================================")
    }
}
