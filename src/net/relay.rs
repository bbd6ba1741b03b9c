//! Raw bidirectional byte relay.
//!
//! # Responsibilities
//! - Copy bytes in both directions without re-framing
//! - Stop both directions as soon as either side reaches end-of-stream
//! - Optionally close the pair after a period with no traffic at all
//!
//! # Design Decisions
//! - Two copy loops raced in `tokio::select!`; the loser is dropped, which
//!   releases its halves
//! - Idle tracking is shared by both directions, so a one-way stream keeps
//!   the pair alive

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const COPY_BUFFER: usize = 16 * 1024;

/// Last-activity clock shared by the directions of one relay.
#[derive(Debug, Clone, Default)]
pub struct IdleWatch {
    inner: Option<Arc<Activity>>,
}

#[derive(Debug)]
struct Activity {
    origin: Instant,
    last_ms: AtomicU64,
    limit: Duration,
}

impl IdleWatch {
    /// `None` or a zero duration never expires.
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            inner: limit.filter(|d| !d.is_zero()).map(|limit| {
                Arc::new(Activity {
                    origin: Instant::now(),
                    last_ms: AtomicU64::new(0),
                    limit,
                })
            }),
        }
    }

    pub fn touch(&self) {
        if let Some(activity) = &self.inner {
            let now = activity.origin.elapsed().as_millis() as u64;
            activity.last_ms.store(now, Ordering::Relaxed);
        }
    }

    /// Resolves once no traffic has been seen for the configured limit.
    pub async fn expired(&self) {
        let Some(activity) = &self.inner else {
            return std::future::pending().await;
        };
        loop {
            let last = Duration::from_millis(activity.last_ms.load(Ordering::Relaxed));
            let quiet = activity.origin.elapsed().saturating_sub(last);
            if quiet >= activity.limit {
                return;
            }
            tokio::time::sleep(activity.limit - quiet).await;
        }
    }
}

/// Copy `reader` into `writer` until end-of-stream, then half-close `writer`.
/// Returns the number of bytes copied.
pub async fn pump<R, W>(mut reader: R, mut writer: W, watch: &IdleWatch) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; COPY_BUFFER];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            // The peer may already be gone.
            let _ = writer.shutdown().await;
            return Ok(total);
        }
        watch.touch();
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

/// Why a splice ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceEnd {
    /// The client stopped sending; bytes copied client→upstream.
    ClientClosed(u64),
    /// The upstream stopped sending; bytes copied upstream→client.
    UpstreamClosed(u64),
    /// No traffic in either direction for the idle limit.
    Idle,
}

/// Relay until either side closes, an I/O error occurs, or the pair goes idle.
pub async fn splice<CR, CW, UR, UW>(
    client_read: CR,
    client_write: CW,
    upstream_read: UR,
    upstream_write: UW,
    watch: &IdleWatch,
) -> io::Result<SpliceEnd>
where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    UR: AsyncRead + Unpin,
    UW: AsyncWrite + Unpin,
{
    tokio::select! {
        res = pump(client_read, upstream_write, watch) => res.map(SpliceEnd::ClientClosed),
        res = pump(upstream_read, client_write, watch) => res.map(SpliceEnd::UpstreamClosed),
        _ = watch.expired() => Ok(SpliceEnd::Idle),
    }
}
