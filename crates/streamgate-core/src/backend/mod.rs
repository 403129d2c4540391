//! Backend stream client abstraction.
//!
//! A [`Backend`] opens one server-streaming generation call per request and
//! hands back an [`IncrementStream`]. The stream is bound to the request's
//! cancellation scope: once the scope fires, the next read reports
//! [`BackendError::Cancelled`] and the underlying call is dropped, which
//! aborts it on the wire.

pub mod grpc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::BackendError;

/// Parameters forwarded to the backend for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    /// Flattened prompt text.
    pub prompt: String,
    /// Upper bound on generated tokens; always > 0 once translated.
    pub max_tokens: u32,
    /// Sampling temperature; 0.0 means greedy decoding.
    pub temperature: f32,
}

/// Outcome of one [`IncrementStream::next`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    /// The next text fragment, in emission order.
    Increment(String),
    /// The backend finished normally.
    EndOfStream,
    /// The call failed or was cancelled; no further increments follow.
    Failed(BackendError),
}

/// Opens cancellable server-streaming generation calls.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Start a generation call bound to `cancel`.
    ///
    /// Fails with [`BackendError::Unavailable`] when the call cannot be
    /// started, before any increment exists.
    async fn open(
        &self,
        params: GenerateParams,
        cancel: CancellationToken,
    ) -> Result<IncrementStream, BackendError>;
}

/// Lazy, finite, ordered sequence of text increments from one backend call.
pub struct IncrementStream {
    inner: Option<BoxStream<'static, Result<String, BackendError>>>,
    cancel: CancellationToken,
    terminal: Option<StreamItem>,
}

impl std::fmt::Debug for IncrementStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementStream")
            .field("open", &self.inner.is_some())
            .field("terminal", &self.terminal)
            .finish()
    }
}

impl IncrementStream {
    pub fn new<S>(increments: S, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<String, BackendError>> + Send + 'static,
    {
        Self {
            inner: Some(increments.boxed()),
            cancel,
            terminal: None,
        }
    }

    /// Wait for the next increment, the end of the stream, or cancellation.
    ///
    /// Terminal outcomes are sticky: after `EndOfStream` or `Failed`, every
    /// later call returns the same item without touching the backend.
    ///
    /// Takes no scope argument: the request scope was bound in
    /// [`IncrementStream::new`] and governs every read.
    pub async fn next(&mut self) -> StreamItem {
        if let Some(terminal) = &self.terminal {
            return terminal.clone();
        }
        let Some(inner) = self.inner.as_mut() else {
            return StreamItem::EndOfStream;
        };

        let polled = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            item = inner.next() => Some(item),
        };

        match polled {
            Some(Some(Ok(text))) => StreamItem::Increment(text),
            Some(Some(Err(e))) => self.finish(StreamItem::Failed(e)),
            Some(None) => self.finish(StreamItem::EndOfStream),
            None => self.finish(StreamItem::Failed(BackendError::Cancelled)),
        }
    }

    /// Whether the bound cancellation scope has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn finish(&mut self, item: StreamItem) -> StreamItem {
        // Dropping the inner stream aborts the call if it is still running.
        self.inner = None;
        self.terminal = Some(item.clone());
        item
    }
}
