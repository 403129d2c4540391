//! Prometheus metrics for the chat-completion flow.
//!
//! Each [`Metrics`] owns its own registry, so routers built side by side
//! (as in tests) never share counters.

use async_trait::async_trait;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use crate::chat::assemble::{AssembleError, Assembler};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Chat-completion requests received, counted before any validation.
    pub requests_total: IntCounter,
    /// Backend increments forwarded to clients, streamed or buffered.
    pub streamed_chunks_total: IntCounter,
    /// End-to-end latency of requests that completed.
    pub request_latency: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests received.")?;
        let streamed_chunks_total = IntCounter::new(
            "streamed_chunks_total",
            "Total number of streamed response chunks.",
        )?;
        let request_latency = Histogram::with_opts(HistogramOpts::new(
            "request_latency_seconds",
            "End-to-end request latency in seconds.",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(streamed_chunks_total.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            streamed_chunks_total,
            request_latency,
        })
    }

    /// Text exposition format of every registered metric.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    /// Wrap `inner` so every increment it accepts is counted.
    pub fn count_chunks<A: Assembler>(&self, inner: A) -> CountChunks<A> {
        CountChunks {
            inner,
            chunks: self.streamed_chunks_total.clone(),
        }
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("requests_total", &self.requests_total.get())
            .field("streamed_chunks_total", &self.streamed_chunks_total.get())
            .finish_non_exhaustive()
    }
}

/// Assembler adapter feeding `streamed_chunks_total`.
pub struct CountChunks<A> {
    inner: A,
    chunks: IntCounter,
}

#[async_trait]
impl<A: Assembler> Assembler for CountChunks<A> {
    type Output = A::Output;

    async fn increment(&mut self, text: String) -> Result<(), AssembleError> {
        self.inner.increment(text).await?;
        self.chunks.inc();
        Ok(())
    }

    async fn finish(self) -> Result<A::Output, AssembleError> {
        self.inner.finish().await
    }
}
