//! Forwarding an authorized client to its upstream.
//!
//! Two modes:
//! - rewrite: each request head is parsed, its headers overwritten by the
//!   endpoint's rules and re-serialized, then its body is streamed through.
//!   One request at a time until the client stops sending requests
//! - splice: the first request and any read-ahead go up verbatim, then bytes
//!   are copied untouched. Used without rules and after a WebSocket upgrade,
//!   where the stream stops being HTTP
//!
//! Neither mode buffers a whole body, so relayed requests have no size cap.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::HostPort;
use crate::http::{HttpMessage, HttpReader};
use crate::net::{pump, splice, IdleWatch, SpliceEnd};
use crate::proxy::ConnectionError;

/// Open the upstream connection within `limit`.
pub async fn connect_upstream(address: &HostPort, limit: Duration) -> Result<TcpStream, ConnectionError> {
    match tokio::time::timeout(limit, TcpStream::connect(address.as_tuple())).await {
        Ok(Ok(stream)) => {
            // Small requests should not wait for Nagle.
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(source)) => Err(ConnectionError::UpstreamConnect {
            address: address.to_string(),
            source,
        }),
        Err(_) => Err(ConnectionError::UpstreamTimeout {
            address: address.to_string(),
        }),
    }
}

/// Overwrite (or add) every configured header.
pub fn apply_rewrites(message: &mut HttpMessage, rules: &BTreeMap<String, String>) {
    for (name, value) in rules {
        message.headers.insert(name.clone(), value.clone());
    }
}

/// Whether `request` must be relayed without parsing what follows it.
pub fn needs_splice(request: &HttpMessage, rules: &BTreeMap<String, String>) -> bool {
    rules.is_empty() || request.is_websocket_upgrade()
}

/// Forward `first`, then splice the rest of the stream.
pub async fn forward_spliced<CR, CW, UR, UW>(
    requests: HttpReader<CR>,
    first: HttpMessage,
    client_write: CW,
    upstream_read: UR,
    mut upstream_write: UW,
    rules: &BTreeMap<String, String>,
    watch: &IdleWatch,
) -> Result<SpliceEnd, ConnectionError>
where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    UR: AsyncRead + Unpin,
    UW: AsyncWrite + Unpin,
{
    if rules.is_empty() {
        upstream_write.write_all(first.raw()).await?;
    } else {
        let mut first = first;
        apply_rewrites(&mut first, rules);
        upstream_write.write_all(&first.to_bytes()).await?;
    }

    let (client_read, read_ahead) = requests.into_parts();
    if !read_ahead.is_empty() {
        upstream_write.write_all(&read_ahead).await?;
    }

    Ok(splice(client_read, client_write, upstream_read, upstream_write, watch).await?)
}

/// Rewrite and forward requests one at a time while copying responses back.
///
/// Ends when the client stops sending complete requests, when the upstream
/// closes, or when the pair goes idle.
pub async fn forward_rewriting<CR, CW, UR, UW>(
    mut requests: HttpReader<CR>,
    first: HttpMessage,
    client_write: CW,
    upstream_read: UR,
    mut upstream_write: UW,
    rules: &BTreeMap<String, String>,
    watch: &IdleWatch,
) -> Result<(), ConnectionError>
where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    UR: AsyncRead + Unpin,
    UW: AsyncWrite + Unpin,
{
    let client_to_upstream = async {
        let mut next = Some(first);
        let mut forwarded = 0u64;
        while let Some(mut request) = next {
            let pending = request.content_length().saturating_sub(request.body().len());
            apply_rewrites(&mut request, rules);
            upstream_write.write_all(&request.to_bytes()).await?;
            watch.touch();
            requests
                .copy_body(pending, &mut upstream_write, || watch.touch())
                .await?;
            forwarded += 1;
            next = requests.read_head().await?;
        }
        let _ = upstream_write.shutdown().await;
        tracing::debug!(requests = forwarded, "Client finished sending requests");
        Ok::<_, ConnectionError>(())
    };

    tokio::select! {
        res = client_to_upstream => res,
        res = pump(upstream_read, client_write, watch) => {
            let bytes = res?;
            tracing::debug!(bytes, "Upstream closed");
            Ok(())
        }
        _ = watch.expired() => {
            tracing::debug!("Relay idle, closing");
            Ok(())
        }
    }
}
