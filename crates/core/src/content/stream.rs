//! Owned content byte streams.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Boxed byte stream as produced and consumed by content stores.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Attachment content: a single-pass stream of byte chunks.
pub struct Content {
    stream: ByteStream,
}

impl Content {
    /// Wrap a byte stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    /// Content held in memory.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }
        Self::new(stream::once(async move { Ok(bytes) }))
    }

    /// Content read from an async reader.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self::new(ReaderStream::new(reader))
    }

    /// Content without bytes.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(stream::empty())
    }

    /// The underlying stream.
    #[must_use]
    pub fn into_stream(self) -> ByteStream {
        self.stream
    }

    /// Read the whole content into memory.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the stream.
    pub async fn into_bytes(mut self) -> io::Result<Bytes> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.stream.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl Stream for Content {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.stream.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Content").finish_non_exhaustive()
    }
}
