//! Pull-style capture for `http_body::Body` response bodies.

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use super::BodyCapture;
use crate::audit::run_isolated;

/// Fired once when the response lifecycle ends, however it ends.
pub type FinishedCallback = Box<dyn FnOnce() + Send>;

/// Body decorator that records data frames as they are polled.
///
/// The wrapped body's frames, size hint and end-of-stream flag are passed
/// through unchanged. The lifecycle ends on the first of: end of stream, an
/// error frame, or the body being dropped.
pub struct InterceptedBody<B: Body> {
    inner: B,
    capture: BodyCapture,
    on_finished: Option<FinishedCallback>,
}

impl<B: Body> InterceptedBody<B> {
    pub fn new(
        inner: B,
        on_body: impl FnOnce(String) + Send + 'static,
        on_finished: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            inner,
            capture: BodyCapture::new(on_body),
            on_finished: Some(Box::new(on_finished)),
        }
    }

    fn finish(&mut self) {
        if let Some(on_finished) = self.on_finished.take() {
            run_isolated("response finished", on_finished);
        }
    }
}

impl<B> Body for InterceptedBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.capture.record(data.clone());
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(err)) => {
                tracing::warn!("response body errored; audit finishes without a body");
                this.capture.abandon();
                this.finish();
                Poll::Ready(Some(Err(err)))
            }
            None => {
                this.capture.complete();
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: Body> Drop for InterceptedBody<B> {
    fn drop(&mut self) {
        if self.on_finished.is_none() {
            return;
        }

        // hyper skips the final poll when the body already reports its end
        if self.inner.is_end_stream() {
            self.capture.complete();
        } else {
            // includes HEAD responses, which hyper never polls
            tracing::debug!("response body dropped before completion");
            self.capture.abandon();
        }
        self.finish();
    }
}
