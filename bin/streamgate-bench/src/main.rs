//! streamgate-bench – load generator for `POST /v1/chat/completions`.
//!
//! Fires N buffered chat-completion requests with at most C in flight and
//! prints a latency / throughput report.
//!
//! Usage:
//!   streamgate-bench --url http://127.0.0.1:8080 --preset high-load
//!   # Override individual preset values:
//!   streamgate-bench --preset stress --requests 200 --prompt "Hi"

mod report;

use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::report::{Report, Samples};

const SHORT_PROMPT: &str = "Introduce yourself briefly.";
const ARTICLE_PROMPT: &str = "Write a detailed technical article about machine learning. \
                              Include key concepts, applications, and future trends.";
const SYSTEM_PROMPT: &str = "You are helpful.";

/// Named load profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    Single,
    HighLoad,
    LongText,
    LowLatency,
    Stress,
}

#[derive(Debug, Clone, PartialEq)]
struct Workload {
    concurrency: usize,
    requests: usize,
    max_tokens: u32,
    temperature: f32,
    prompt: String,
}

impl Preset {
    fn workload(self) -> Workload {
        let (concurrency, requests, max_tokens, prompt) = match self {
            Preset::Single => (4, 20, 128, SHORT_PROMPT),
            Preset::HighLoad => (8, 50, 256, SHORT_PROMPT),
            Preset::LongText => (2, 10, 512, ARTICLE_PROMPT),
            Preset::LowLatency => (10, 50, 32, "Hello"),
            Preset::Stress => (16, 100, 128, SHORT_PROMPT),
        };
        Workload {
            concurrency,
            requests,
            max_tokens,
            temperature: 0.2,
            prompt: prompt.to_owned(),
        }
    }
}

/// Benchmark a streamgate deployment.
#[derive(Debug, Parser)]
#[command(name = "streamgate-bench", version)]
struct Cli {
    /// Base URL of the gateway
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Load profile to start from
    #[arg(long, value_enum, default_value_t = Preset::Single)]
    preset: Preset,

    /// Requests in flight at once
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Total requests to send
    #[arg(short = 'n', long)]
    requests: Option<usize>,

    /// `max_tokens` sent with every request
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature
    #[arg(short, long)]
    temperature: Option<f32>,

    /// User prompt
    #[arg(short, long)]
    prompt: Option<String>,

    /// Per-request client timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

impl Cli {
    fn workload(&self) -> Workload {
        let preset = self.preset.workload();
        Workload {
            concurrency: self.concurrency.unwrap_or(preset.concurrency).max(1),
            requests: self.requests.unwrap_or(preset.requests),
            max_tokens: self.max_tokens.unwrap_or(preset.max_tokens),
            temperature: self.temperature.unwrap_or(preset.temperature),
            prompt: self.prompt.clone().unwrap_or(preset.prompt),
        }
    }
}

#[derive(Debug, Error)]
enum RequestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    #[serde(default)]
    total_tokens: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let workload = cli.workload();
    info!(
        url = %cli.url,
        preset = ?cli.preset,
        concurrency = workload.concurrency,
        requests = workload.requests,
        max_tokens = workload.max_tokens,
        "starting benchmark"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs))
        .build()?;
    let endpoint = format!("{}/v1/chat/completions", cli.url.trim_end_matches('/'));

    let report = run(&client, &endpoint, &cli.url, &workload).await;
    println!("{report}");
    Ok(())
}

async fn run(client: &reqwest::Client, endpoint: &str, url: &str, workload: &Workload) -> Report {
    let payload = json!({
        "model": "local",
        "stream": false,
        "max_tokens": workload.max_tokens,
        "temperature": workload.temperature,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": workload.prompt },
        ],
    });

    let started = Instant::now();
    let outcomes: Vec<(usize, Duration, Result<u64, RequestError>)> =
        futures::stream::iter(0..workload.requests)
            .map(|index| {
                let payload = &payload;
                async move {
                    let start = Instant::now();
                    let outcome = send_one(client, endpoint, payload).await;
                    (index, start.elapsed(), outcome)
                }
            })
            .buffer_unordered(workload.concurrency)
            .collect()
            .await;
    let wall = started.elapsed();

    let mut samples = Samples::default();
    for (index, latency, outcome) in outcomes {
        match outcome {
            Ok(tokens) => {
                debug!(index, latency_ms = latency.as_millis(), tokens, "request succeeded");
                samples.record_success(latency, tokens);
            }
            Err(e) => {
                warn!(index, error = %e, "request failed");
                samples.record_failure(format!("request {index}: {e}"));
            }
        }
    }

    Report::from_samples(url, workload.requests, samples, wall)
}

/// Send one request; the token count is `usage.total_tokens`, or 0 if absent.
async fn send_one(
    client: &reqwest::Client,
    endpoint: &str,
    payload: &serde_json::Value,
) -> Result<u64, RequestError> {
    let response = client.post(endpoint).json(payload).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RequestError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body: CompletionBody = response.json().await?;
    Ok(body.usage.map(|u| u.total_tokens).unwrap_or(0))
}
