//! Upload size limits: declared length precheck and streaming byte counter.

use std::io;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use pin_project::pin_project;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::stream::Content;
use crate::attachment::AttachmentError;

/// Parse a human-readable size such as `"400MB"`, `"1.5 KiB"` or `"512"`.
///
/// Decimal units (`KB`, `MB`, `GB`, `TB`) scale by 1000, binary units
/// (`KiB`, `MiB`, `GiB`, `TiB`) by 1024. Units are case-insensitive. A
/// fractional number is accepted only when it yields a whole byte count.
///
/// # Errors
///
/// Returns `BadRequest` for malformed values, unknown units, negative or
/// fractional byte counts.
pub fn parse_size(value: &str) -> Result<u64, AttachmentError> {
    let trimmed = value.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1_000,
        "mb" => 1_000_000,
        "gb" => 1_000_000_000,
        "tb" => 1_000_000_000_000,
        "kib" => 1 << 10,
        "mib" => 1 << 20,
        "gib" => 1 << 30,
        "tib" => 1 << 40,
        other => {
            return Err(AttachmentError::bad_request(format!(
                "unknown size unit '{other}' in '{value}'"
            )));
        }
    };

    let number = Decimal::from_str(number)
        .map_err(|_| AttachmentError::bad_request(format!("invalid size '{value}'")))?;
    let bytes = number
        .checked_mul(Decimal::from(multiplier))
        .ok_or_else(|| AttachmentError::bad_request(format!("size '{value}' is too large")))?;
    if !bytes.fract().is_zero() {
        return Err(AttachmentError::bad_request(format!(
            "size '{value}' is not a whole number of bytes"
        )));
    }
    bytes
        .to_u64()
        .ok_or_else(|| AttachmentError::bad_request(format!("size '{value}' is out of range")))
}

/// Enforces the size limit of one upload.
///
/// Clones share the byte count, so the interceptor can inspect the outcome
/// after the store consumed the wrapped stream.
#[derive(Debug, Clone)]
pub struct SizeGuard {
    limit: u64,
    counted: Arc<AtomicU64>,
    exceeded: Arc<AtomicBool>,
}

impl SizeGuard {
    /// Guard enforcing `limit` bytes.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            counted: Arc::new(AtomicU64::new(0)),
            exceeded: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Guard for an element: its `max_size` annotation, else the system default.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` when the chosen size string is malformed.
    pub fn resolve(annotation: Option<&str>, default: &str) -> Result<Self, AttachmentError> {
        parse_size(annotation.unwrap_or(default)).map(Self::new)
    }

    /// Effective limit in bytes.
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Reject a declared request length above the limit.
    ///
    /// # Errors
    ///
    /// Returns `BadRequest` for a malformed header and `ContentTooLarge`
    /// when the declared length exceeds the limit.
    pub fn check_declared_length(&self, header: Option<&str>) -> Result<(), AttachmentError> {
        let Some(header) = header else {
            return Ok(());
        };
        let declared: u64 = header.trim().parse().map_err(|_| {
            AttachmentError::bad_request(format!("invalid content length header '{header}'"))
        })?;
        if declared > self.limit {
            return Err(AttachmentError::ContentTooLarge { limit: self.limit });
        }
        Ok(())
    }

    /// Wrap `content` so reading fails once the limit is passed.
    #[must_use]
    pub fn wrap(&self, content: Content) -> Content {
        Content::new(CountingStream {
            inner: content,
            limit: self.limit,
            counted: Arc::clone(&self.counted),
            exceeded: Arc::clone(&self.exceeded),
            done: false,
        })
    }

    /// Bytes seen so far.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.counted.load(Ordering::Acquire)
    }

    /// Whether the wrapped stream passed the limit.
    #[must_use]
    pub fn exceeded(&self) -> bool {
        self.exceeded.load(Ordering::Acquire)
    }

    /// Map a store failure caused by the limit back to `ContentTooLarge`.
    #[must_use]
    pub fn classify(&self, err: AttachmentError) -> AttachmentError {
        if self.exceeded() {
            AttachmentError::ContentTooLarge { limit: self.limit }
        } else {
            err
        }
    }
}

/// Stream decorator counting bytes and failing past the limit.
#[pin_project]
pub struct CountingStream<S> {
    #[pin]
    inner: S,
    limit: u64,
    counted: Arc<AtomicU64>,
    exceeded: Arc<AtomicBool>,
    done: bool,
}

impl<S> Stream for CountingStream<S>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let len = chunk.len() as u64;
                let total = this.counted.fetch_add(len, Ordering::AcqRel) + len;
                if total > *this.limit {
                    *this.done = true;
                    this.exceeded.store(true, Ordering::Release);
                    let err = AttachmentError::ContentTooLarge { limit: *this.limit };
                    return Poll::Ready(Some(Err(err.into_io())));
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(None) => {
                *this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}
