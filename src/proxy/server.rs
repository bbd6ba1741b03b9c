//! One accept loop per endpoint, supervised together.
//!
//! # Responsibilities
//! - Bind every configured endpoint before serving any of them
//! - Spawn one task per accepted connection
//! - Stop accepting on shutdown and drain in-flight connections

use std::net::SocketAddr;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{ConfigProvider, EndpointId};
use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::context::ProxyContext;
use crate::proxy::handler::handle_connection;

/// Delay before accepting again after a failed accept (e.g. fd exhaustion).
const ACCEPT_BACKOFF: std::time::Duration = std::time::Duration::from_millis(100);

struct BoundEndpoint {
    id: EndpointId,
    listener: Listener,
}

/// All endpoint listeners of the process.
pub struct ProxyServer {
    ctx: ProxyContext,
    endpoints: Vec<BoundEndpoint>,
    tracker: ConnectionTracker,
}

impl ProxyServer {
    /// Bind the listen address of every endpoint in the current directory.
    pub async fn bind(ctx: ProxyContext) -> Result<Self, ListenerError> {
        let directory = ctx.config.snapshot();
        let mut endpoints = Vec::new();
        for endpoint in directory.list_endpoints() {
            let listener = Listener::bind(&endpoint.listen, ctx.settings.max_connections).await?;
            tracing::info!(
                endpoint = endpoint.id,
                name = %endpoint.name,
                listen = %endpoint.listen,
                upstream = %endpoint.upstream,
                max_connections = listener.max_connections(),
                "Endpoint ready"
            );
            endpoints.push(BoundEndpoint {
                id: endpoint.id,
                listener,
            });
        }
        Ok(Self {
            ctx,
            endpoints,
            tracker: ConnectionTracker::new(),
        })
    }

    /// Actual bound address per endpoint (useful with port 0).
    pub fn local_addrs(&self) -> Vec<(EndpointId, SocketAddr)> {
        self.endpoints
            .iter()
            .filter_map(|e| e.listener.local_addr().ok().map(|addr| (e.id, addr)))
            .collect()
    }

    /// Serve until `shutdown` fires, then drain connections for the grace period.
    pub async fn run(self, shutdown: Shutdown) {
        let Self {
            ctx,
            endpoints,
            tracker,
        } = self;

        let loops: Vec<JoinHandle<()>> = endpoints
            .into_iter()
            .map(|bound| {
                let span = tracing::info_span!("endpoint", endpoint = bound.id);
                tokio::spawn(
                    accept_loop(bound, ctx.clone(), tracker.clone(), shutdown.subscribe()).instrument(span),
                )
            })
            .collect();

        for handle in loops {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Accept loop panicked");
            }
        }

        let in_flight = tracker.active_count();
        if in_flight > 0 {
            tracing::info!(connections = in_flight, "Draining connections");
            if !tracker.drain(ctx.settings.shutdown_grace).await {
                tracing::warn!(
                    connections = tracker.active_count(),
                    "Grace period elapsed with connections still open"
                );
            }
        }
        tracing::info!("All endpoints stopped");
    }
}

async fn accept_loop(
    bound: BoundEndpoint,
    ctx: ProxyContext,
    tracker: ConnectionTracker,
    mut shutdown: broadcast::Receiver<()>,
) {
    let endpoint = bound.id;
    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::debug!("Stopping accept loop");
                break;
            }
            accepted = bound.listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let _ = stream.set_nodelay(true);
                    metrics::record_connection(endpoint);
                    let guard = tracker.track();
                    let ctx = ctx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, peer, endpoint, guard.id(), ctx).await;
                        drop(guard);
                        drop(permit);
                    });
                }
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }
}
