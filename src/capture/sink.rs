//! Push-style capture for hosts that write responses through `write`/`end`.

use super::{BodyCapture, Chunk};

/// A streaming response sink.
///
/// `write` carries an intermediate chunk; `end` finishes the response and may
/// carry a final chunk.
pub trait ResponseSink {
    type Error;

    fn write(&mut self, chunk: Chunk) -> Result<(), Self::Error>;

    fn end(&mut self, chunk: Option<Chunk>) -> Result<(), Self::Error>;
}

/// Decorator that records every chunk before forwarding the original call to
/// the wrapped sink.
#[derive(Debug)]
pub struct BodyInterceptor<S> {
    inner: S,
    capture: BodyCapture,
}

impl<S: ResponseSink> BodyInterceptor<S> {
    pub fn new(inner: S, on_body: impl FnOnce(String) + Send + 'static) -> Self {
        Self {
            inner,
            capture: BodyCapture::new(on_body),
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ResponseSink> ResponseSink for BodyInterceptor<S> {
    type Error = S::Error;

    fn write(&mut self, chunk: Chunk) -> Result<(), Self::Error> {
        self.capture.record(chunk.to_bytes());
        self.inner.write(chunk)
    }

    fn end(&mut self, chunk: Option<Chunk>) -> Result<(), Self::Error> {
        if let Some(chunk) = &chunk {
            self.capture.record(chunk.to_bytes());
        }
        self.capture.complete();
        self.inner.end(chunk)
    }
}
