//! Stream decorators used by transfer paths
//!
//! - [`BoundedReader`] presents a contiguous subrange of a borrowed stream,
//!   forwarding only reads within that window.
//! - [`IdleTimeoutReader`] aborts a stalled transfer: its timer resets on
//!   every read that makes forward progress, so slow-but-moving bodies are
//!   never killed while a silent peer is.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};

/// Read-only window over a borrowed stream.
///
/// Forwards at most `remaining` bytes, then reports EOF. The underlying
/// stream must already be positioned at the window start; the reader never
/// owns or repositions it.
pub struct BoundedReader<'a, R: ?Sized> {
    inner: &'a mut R,
    remaining: u64,
}

impl<'a, R: AsyncRead + Unpin + ?Sized> BoundedReader<'a, R> {
    pub fn new(inner: &'a mut R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }

    /// Bytes the window will still forward
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl<R: AsyncRead + Unpin + ?Sized> AsyncRead for BoundedReader<'_, R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if this.remaining == 0 || buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let limit = this.remaining.min(buf.remaining() as u64) as usize;
        let mut window = buf.take(limit);

        ready!(Pin::new(&mut *this.inner).poll_read(cx, &mut window))?;

        let filled = window.filled().len();
        let initialized = window.initialized().len();

        // The window borrows buf's storage; mirror what was written into it.
        unsafe {
            buf.assume_init(initialized);
        }
        buf.advance(filled);
        this.remaining -= filled as u64;

        Poll::Ready(Ok(()))
    }
}

/// Idle-read timeout decorator.
///
/// Distinct from a wall-clock deadline: the timer restarts on every read
/// that yields at least one byte, and expiry surfaces as
/// [`io::ErrorKind::TimedOut`].
pub struct IdleTimeoutReader<R> {
    inner: R,
    timeout: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl<R: AsyncRead + Unpin> IdleTimeoutReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            sleep: Box::pin(tokio::time::sleep(timeout)),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for IdleTimeoutReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() > before {
                    this.sleep.as_mut().reset(Instant::now() + this.timeout);
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            Poll::Pending => match this.sleep.as_mut().poll(cx) {
                Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "body transfer stalled past the idle timeout",
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
