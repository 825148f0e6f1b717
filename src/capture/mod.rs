//! Response body capture.
//!
//! # Data Flow
//! ```text
//! handler response body
//!     → body.rs (InterceptedBody: pull-style, polled by hyper)
//!     | sink.rs (BodyInterceptor: push-style write/end)
//!     → BodyCapture (ordered chunk buffer)
//!     → on end: concatenate, decode, hand text to callback
//!     → original frames / calls forwarded untouched
//! ```
//!
//! # Design Decisions
//! - Capture is best effort: a failing callback is logged, never propagated
//! - Forwarded data is never altered or delayed by capture
//! - No size cap; the whole body is held until the end of the stream

pub mod body;
pub mod sink;

pub use body::InterceptedBody;
pub use sink::{BodyInterceptor, ResponseSink};

use bytes::{Bytes, BytesMut};

use crate::audit::run_isolated;

/// Receives the fully assembled body exactly once.
pub type BodyCallback = Box<dyn FnOnce(String) + Send>;

/// One payload fragment written to a response sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Binary(Bytes),
    Text(String),
}

impl Chunk {
    /// Normalize to binary. Text is copied as UTF-8.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Chunk::Binary(bytes) => bytes.clone(),
            Chunk::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Chunk::Binary(bytes) => bytes.is_empty(),
            Chunk::Text(text) => text.is_empty(),
        }
    }
}

impl From<Bytes> for Chunk {
    fn from(bytes: Bytes) -> Self {
        Chunk::Binary(bytes)
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(bytes: Vec<u8>) -> Self {
        Chunk::Binary(Bytes::from(bytes))
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Chunk::Text(text)
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Chunk::Text(text.to_string())
    }
}

/// Ordered buffer of everything written so far plus the one-shot callback.
pub struct BodyCapture {
    chunks: Vec<Bytes>,
    on_body: Option<BodyCallback>,
}

impl BodyCapture {
    pub fn new(on_body: impl FnOnce(String) + Send + 'static) -> Self {
        Self {
            chunks: Vec::new(),
            on_body: Some(Box::new(on_body)),
        }
    }

    /// Append a chunk. Ignored once the body has been delivered.
    pub fn record(&mut self, chunk: Bytes) {
        if self.on_body.is_some() && !chunk.is_empty() {
            self.chunks.push(chunk);
        }
    }

    /// Concatenate, decode and deliver the body. Later calls are no-ops.
    pub fn complete(&mut self) {
        let Some(on_body) = self.on_body.take() else {
            return;
        };

        let total = self.chunks.iter().map(Bytes::len).sum();
        let mut buffer = BytesMut::with_capacity(total);
        for chunk in self.chunks.drain(..) {
            buffer.extend_from_slice(&chunk);
        }
        let body = String::from_utf8_lossy(&buffer).into_owned();

        tracing::trace!(bytes = total, "response body captured");
        run_isolated("body capture", move || on_body(body));
    }

    /// Drop the callback without delivering anything.
    pub fn abandon(&mut self) {
        self.on_body = None;
        self.chunks.clear();
    }

    pub fn is_complete(&self) -> bool {
        self.on_body.is_none()
    }
}

impl std::fmt::Debug for BodyCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyCapture")
            .field("chunks", &self.chunks.len())
            .field("complete", &self.is_complete())
            .finish()
    }
}
