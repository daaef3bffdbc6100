//! Lazy, scan-gated content proxy.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream};

use super::stream::Content;
use crate::attachment::{AttachmentError, ScanStatus};

/// Fail unless content with this status may be released.
///
/// # Errors
///
/// Returns `AttachmentNotAccessible` for every status other than `CLEAN`.
pub fn verify_status(status: Option<ScanStatus>) -> Result<(), AttachmentError> {
    match status {
        Some(ScanStatus::Clean) => Ok(()),
        other => Err(AttachmentError::not_accessible(other)),
    }
}

type Supplier = Box<dyn FnOnce() -> BoxFuture<'static, Result<Content, AttachmentError>> + Send>;

enum State {
    Idle(Supplier),
    Opening(BoxFuture<'static, Result<Content, AttachmentError>>),
    Streaming(Content),
    Done,
}

/// Content whose fetch is deferred until the first poll.
///
/// The supplier runs at most once, and only after the scan status has been
/// verified. A proxy that is dropped or closed before being polled never
/// touches the store. Single reader only.
pub struct LazyContent {
    status: Option<ScanStatus>,
    state: State,
}

impl LazyContent {
    /// Proxy fetching content through `supplier` for a row with `status`.
    pub fn new<F, Fut>(status: Option<ScanStatus>, supplier: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Content, AttachmentError>> + Send + 'static,
    {
        Self {
            status,
            state: State::Idle(Box::new(move || supplier().boxed())),
        }
    }

    /// Whether the supplier has been invoked.
    #[must_use]
    pub fn is_opened(&self) -> bool {
        !matches!(self.state, State::Idle(_))
    }

    /// Release the delegate, if any; later polls yield nothing.
    pub fn close(&mut self) {
        self.state = State::Done;
    }

    /// Type-erase into plain content.
    #[must_use]
    pub fn into_content(self) -> Content {
        Content::new(self)
    }

    fn fail(&mut self, err: AttachmentError) -> Poll<Option<io::Result<Bytes>>> {
        self.state = State::Done;
        Poll::Ready(Some(Err(err.into_io())))
    }
}

impl Stream for LazyContent {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                State::Idle(_) => {
                    let State::Idle(supplier) = std::mem::replace(&mut this.state, State::Done)
                    else {
                        return Poll::Ready(None);
                    };
                    if let Err(err) = verify_status(this.status) {
                        return this.fail(err);
                    }
                    this.state = State::Opening(supplier());
                }
                State::Opening(future) => match future.as_mut().poll(cx) {
                    Poll::Ready(Ok(content)) => this.state = State::Streaming(content),
                    Poll::Ready(Err(err)) => return this.fail(err),
                    Poll::Pending => return Poll::Pending,
                },
                State::Streaming(content) => {
                    return match Pin::new(content).poll_next(cx) {
                        Poll::Ready(None) => {
                            this.state = State::Done;
                            Poll::Ready(None)
                        }
                        other => other,
                    };
                }
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

impl std::fmt::Debug for LazyContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Idle(_) => "idle",
            State::Opening(_) => "opening",
            State::Streaming(_) => "streaming",
            State::Done => "done",
        };
        f.debug_struct("LazyContent")
            .field("status", &self.status)
            .field("state", &state)
            .finish()
    }
}
