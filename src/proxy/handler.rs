//! Per-connection state machine.
//!
//! # Data Flow
//! ```text
//! AwaitingRequest ──stream ends──────────────────────────────▶ Closed
//!       │ one framed request
//!       ▼
//! Authenticating ──valid totp_auth cookie for this endpoint──▶ Relaying ──▶ Closed
//!       │ otherwise
//!       ├─ POST: check_data ok  → 302 + Set-Cookie ──────────▶ Closed
//!       ├─ POST: check_data err → login page + error ────────▶ Closed
//!       └─ other methods        → login page ────────────────▶ Closed
//! ```
//!
//! # Design Decisions
//! - The directory snapshot taken at the start is used for the whole
//!   connection
//! - Every error stays inside its connection; the client sees a redirect, a
//!   login page, or a closed socket
//! - Deciding what to do with a request is a pure function
//!   ([`authenticate`]); only the I/O around it is async
//! - Only a login POST has its body buffered, under `max_body_bytes`.
//!   Relayed bodies are streamed and never capped

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::Instrument;

use crate::auth::{check_data, AuthContext, AuthWidget};
use crate::config::{ConfigProvider, Directory, Endpoint, EndpointId, UserId};
use crate::http::{FramingError, HttpMessage, HttpReader, Response, SESSION_COOKIE};
use crate::net::{ConnectionId, IdleWatch};
use crate::observability::metrics::{self, AuthOutcome};
use crate::proxy::context::ProxyContext;
use crate::proxy::forward::{connect_upstream, forward_rewriting, forward_spliced, needs_splice};
use crate::render::{LoginPage, WIDGET_FIELD};
use crate::session::token;

/// Where a connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    AwaitingRequest,
    Authenticating,
    Relaying,
    ServingLoginPage,
    Closed,
}

/// Why a connection ended early. Never leaves the connection task.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("malformed request: {0}")]
    Framing(#[from] FramingError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no complete request within {0:?}")]
    RequestTimeout(std::time::Duration),

    #[error("failed to connect to upstream {address}: {source}")]
    UpstreamConnect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to upstream {address}")]
    UpstreamTimeout { address: String },

    #[error("endpoint {0} is no longer configured")]
    EndpointRemoved(EndpointId),
}

impl ConnectionError {
    fn log(&self) {
        match self {
            Self::UpstreamConnect { .. } | Self::UpstreamTimeout { .. } | Self::EndpointRemoved(_) => {
                tracing::warn!(error = %self, "Connection failed")
            }
            _ => tracing::debug!(error = %self, "Connection aborted"),
        }
    }
}

/// What to do with a framed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The client holds a session for this endpoint.
    Relay { user: UserId },
    /// Answer directly and close.
    Respond(Response),
}

/// The user a request's session cookie names, if that user may use `endpoint`.
pub fn session_user(request: &HttpMessage, endpoint: &Endpoint, directory: &Directory) -> Option<UserId> {
    let cookie = request.cookie(SESSION_COOKIE)?;
    let identity = token::validate(&cookie, directory.secret())?;
    let user: UserId = identity.parse().ok()?;
    directory.is_authorized(endpoint.id, user).then_some(user)
}

/// Decide between relaying, issuing a session, and showing the login page.
pub fn authenticate(
    request: &HttpMessage,
    endpoint: &Endpoint,
    directory: &Directory,
    ctx: &ProxyContext,
) -> Step {
    if let Some(user) = session_user(request, endpoint, directory) {
        return Step::Relay { user };
    }

    if request.method != "POST" {
        let requested = request.query_param(WIDGET_FIELD);
        return Step::Respond(login_page(endpoint, directory, ctx, requested.as_deref(), None));
    }

    let form = request.form_fields();
    let requested = form.get(WIDGET_FIELD).map(String::as_str);
    let Some(widget) = ctx.widgets.select(&endpoint.widgets, requested) else {
        return Step::Respond(no_widget(endpoint));
    };

    let users = directory.authorized_users(endpoint);
    let auth = AuthContext {
        secret: directory.secret(),
        users: &users,
        clock: ctx.clock.as_ref(),
        totp: ctx.settings.totp,
    };

    match check_data(widget.as_ref(), &form, &auth) {
        Ok(user) => {
            metrics::record_auth_attempt(endpoint.id, AuthOutcome::Success);
            tracing::info!(user_id = user, widget = widget.name(), "Login succeeded");
            let session = token::issue(&user.to_string(), directory.secret());
            Step::Respond(Response::login_redirect(&session))
        }
        Err(e) => {
            metrics::record_auth_attempt(endpoint.id, AuthOutcome::Rejected);
            tracing::info!(reason = e.tag(), widget = widget.name(), "Login rejected");
            Step::Respond(login_page(
                endpoint,
                directory,
                ctx,
                Some(widget.name()),
                Some(e.user_message()),
            ))
        }
    }
}

fn login_page(
    endpoint: &Endpoint,
    directory: &Directory,
    ctx: &ProxyContext,
    requested: Option<&str>,
    error: Option<&str>,
) -> Response {
    let Some(widget) = ctx.widgets.select(&endpoint.widgets, requested) else {
        return no_widget(endpoint);
    };
    let alternatives: Vec<&dyn AuthWidget> = endpoint
        .widgets
        .iter()
        .filter(|name| name.as_str() != widget.name())
        .filter_map(|name| ctx.widgets.get(name))
        .map(|w| &**w)
        .collect();

    let html = ctx.renderer.render_login_page(&LoginPage {
        title: &endpoint.name,
        widget: widget.as_ref(),
        alternatives,
        error,
        secret: directory.secret(),
    });
    Response::html(html)
}

fn no_widget(endpoint: &Endpoint) -> Response {
    tracing::error!(endpoint = endpoint.id, "No usable login widget configured");
    Response::new(503, "Service Unavailable")
}

fn enter(state: &mut ConnectionState, next: ConnectionState) {
    tracing::trace!(from = ?*state, to = ?next, "State change");
    *state = next;
}

/// Drive one client connection to completion. Errors are logged here.
pub async fn handle_connection<S>(
    stream: S,
    peer: SocketAddr,
    endpoint: EndpointId,
    id: ConnectionId,
    ctx: ProxyContext,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let span = tracing::debug_span!("connection", connection_id = %id, endpoint, peer_addr = %peer);
    async move {
        if let Err(e) = serve(stream, endpoint, &ctx).await {
            e.log();
        }
    }
    .instrument(span)
    .await
}

/// Frame the first request. Only a login attempt has its body read here,
/// under the body limit; an authorized request's body is streamed upstream
/// by the relay.
async fn read_first_request<R>(
    requests: &mut HttpReader<R>,
    endpoint: &Endpoint,
    directory: &Directory,
) -> Result<Option<HttpMessage>, FramingError>
where
    R: AsyncRead + Unpin,
{
    let Some(mut request) = requests.read_head().await? else {
        return Ok(None);
    };
    if request.method == "POST"
        && session_user(&request, endpoint, directory).is_none()
        && !requests.read_body(&mut request).await?
    {
        return Ok(None);
    }
    Ok(Some(request))
}

async fn serve<S>(stream: S, endpoint_id: EndpointId, ctx: &ProxyContext) -> Result<(), ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let directory = ctx.config.snapshot();
    let endpoint = directory
        .get_endpoint(endpoint_id)
        .ok_or(ConnectionError::EndpointRemoved(endpoint_id))?;

    let (client_read, mut client_write) = tokio::io::split(stream);
    let mut requests = HttpReader::new(client_read, ctx.settings.limits);
    let mut state = ConnectionState::AwaitingRequest;

    let limit = ctx.settings.request_timeout;
    let request = tokio::time::timeout(limit, read_first_request(&mut requests, endpoint, &directory))
        .await
        .map_err(|_| ConnectionError::RequestTimeout(limit))??;
    let Some(request) = request else {
        enter(&mut state, ConnectionState::Closed);
        return Ok(());
    };
    tracing::debug!(method = %request.method, target = %request.target, "Request received");

    enter(&mut state, ConnectionState::Authenticating);
    match authenticate(&request, endpoint, &directory, ctx) {
        Step::Respond(response) => {
            enter(&mut state, ConnectionState::ServingLoginPage);
            client_write.write_all(&response.to_bytes()).await?;
            let _ = client_write.shutdown().await;
        }
        Step::Relay { user } => {
            enter(&mut state, ConnectionState::Relaying);
            tracing::debug!(user_id = user, upstream = %endpoint.upstream, "Relaying");

            let upstream = match connect_upstream(&endpoint.upstream, ctx.settings.connect_timeout).await {
                Ok(upstream) => upstream,
                Err(e) => {
                    metrics::record_upstream_failure(endpoint.id);
                    return Err(e);
                }
            };
            let (upstream_read, upstream_write) = upstream.into_split();
            let watch = IdleWatch::new(ctx.settings.relay_idle);
            let rules = &endpoint.headers_rewrite;

            if needs_splice(&request, rules) {
                let end = forward_spliced(
                    requests,
                    request,
                    client_write,
                    upstream_read,
                    upstream_write,
                    rules,
                    &watch,
                )
                .await?;
                tracing::debug!(?end, "Splice finished");
            } else {
                forward_rewriting(
                    requests,
                    request,
                    client_write,
                    upstream_read,
                    upstream_write,
                    rules,
                    &watch,
                )
                .await?;
            }
        }
    }

    enter(&mut state, ConnectionState::Closed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::auth::FixedClock;
    use crate::config::{parse_config, SharedConfig};
    use crate::http::{parse_fragments, ParseLimits};
    use crate::proxy::context::ProxySettings;
    use crate::session::csrf;

    const INSTANT: u64 = 1_508_613_180;

    const CONFIG: &str = r#"
        secret = "handler-secret"

        [totp]
        skew_steps = 0

        [[endpoints]]
        id = 1
        name = "Dashboard"
        listen = "127.0.0.1:0"
        upstream = "127.0.0.1:9"
        widgets = ["totp", "password"]
        users = [1]

        [[endpoints]]
        id = 2
        listen = "127.0.0.1:0"
        upstream = "127.0.0.1:9"
        users = [2]

        [[users]]
        id = 1
        login = "admin"
        totp_secret = "JBSWY3DPEHPK3PXP"
        password_sha256 = "8c6976e5b5410415bde908bd4dee15dfb167a9c873fc4bb8a81f6f2ab448a918"

        [[users]]
        id = 2
        login = "other"
        totp_secret = "JBSWY3DPEHPK3PXP"
    "#;

    fn context() -> ProxyContext {
        let config = parse_config(CONFIG).unwrap();
        let directory = Directory::from_config(&config).unwrap();
        ProxyContext::new(SharedConfig::new(directory), ProxySettings::from_config(&config))
            .with_clock(Arc::new(FixedClock(INSTANT)))
    }

    fn request(raw: &str) -> HttpMessage {
        parse_fragments([raw.as_bytes()], ParseLimits::default())
            .unwrap()
            .unwrap()
    }

    fn post(body: &str) -> HttpMessage {
        request(&format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ))
    }

    fn decide(ctx: &ProxyContext, endpoint: EndpointId, message: &HttpMessage) -> Step {
        let directory = ctx.config.snapshot();
        let endpoint = directory.get_endpoint(endpoint).unwrap();
        authenticate(message, endpoint, &directory, ctx)
    }

    fn secret(ctx: &ProxyContext) -> crate::session::Secret {
        ctx.config.snapshot().secret().clone()
    }

    fn body_text(step: Step) -> (u16, String) {
        match step {
            Step::Respond(response) => (response.status, String::from_utf8(response.body).unwrap()),
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[test]
    fn get_without_cookie_shows_default_widget() {
        let ctx = context();
        let (status, html) = body_text(decide(&ctx, 1, &request("GET / HTTP/1.1\r\n\r\n")));
        assert_eq!(status, 200);
        assert!(html.contains("<title>Dashboard</title>"));
        assert!(html.contains(r#"name="widget" value="totp""#));
        assert!(html.contains(r#"href="?widget=password""#));
    }

    #[test]
    fn widget_query_selects_enabled_widget() {
        let ctx = context();
        let (_, html) = body_text(decide(&ctx, 1, &request("GET /?widget=password HTTP/1.1\r\n\r\n")));
        assert!(html.contains(r#"name="widget" value="password""#));

        // endpoint 2 only enables totp
        let (_, html) = body_text(decide(&ctx, 2, &request("GET /?widget=password HTTP/1.1\r\n\r\n")));
        assert!(html.contains(r#"name="widget" value="totp""#));
    }

    #[test]
    fn valid_totp_post_issues_session() {
        let ctx = context();
        let csrf = csrf::generate(&secret(&ctx));
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("username", "admin")
            .append_pair("totp", "123456")
            .append_pair("csrf", &csrf)
            .finish();

        let Step::Respond(response) = decide(&ctx, 1, &post(&body)) else {
            panic!("expected a redirect");
        };
        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("Location"), Some("/"));

        let cookie = response.headers.get("Set-Cookie").unwrap();
        let token = cookie
            .strip_prefix("totp_auth=")
            .and_then(|rest| rest.split(';').next())
            .unwrap();
        assert_eq!(token::validate(token, &secret(&ctx)).as_deref(), Some("1"));
    }

    #[test]
    fn password_widget_via_hidden_field() {
        let ctx = context();
        let csrf = csrf::generate(&secret(&ctx));
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("widget", "password")
            .append_pair("login", "Admin")
            .append_pair("password", "admin")
            .append_pair("csrf", &csrf)
            .finish();

        let Step::Respond(response) = decide(&ctx, 1, &post(&body)) else {
            panic!("expected a redirect");
        };
        assert_eq!(response.status, 302);
    }

    #[test]
    fn failed_login_rerenders_with_generic_error() {
        let ctx = context();
        let csrf = csrf::generate(&secret(&ctx));
        for body in [
            format!("username=admin&totp=654321&csrf={}", urlencode(&csrf)),
            format!("username=admin&totp=12a456&csrf={}", urlencode(&csrf)),
            "username=admin&totp=123456".to_string(),
            format!("username=nobody&totp=123456&csrf={}", urlencode(&csrf)),
        ] {
            let (status, html) = body_text(decide(&ctx, 1, &post(&body)));
            assert_eq!(status, 200);
            assert!(html.contains("Incorrect data"), "{body}");
        }
    }

    #[test]
    fn user_of_another_endpoint_cannot_log_in() {
        let ctx = context();
        let csrf = csrf::generate(&secret(&ctx));
        let body = format!("username=other&totp=123456&csrf={}", urlencode(&csrf));
        let (status, html) = body_text(decide(&ctx, 1, &post(&body)));
        assert_eq!(status, 200);
        assert!(html.contains("Incorrect data"));
    }

    #[test]
    fn session_cookie_is_scoped_to_endpoint() {
        let ctx = context();
        let token = token::issue("1", &secret(&ctx));
        let get = request(&format!("GET / HTTP/1.1\r\nCookie: theme=dark; totp_auth={token}\r\n\r\n"));

        assert_eq!(decide(&ctx, 1, &get), Step::Relay { user: 1 });
        assert!(matches!(decide(&ctx, 2, &get), Step::Respond(_)));
    }

    #[test]
    fn forged_or_unknown_sessions_are_ignored() {
        let ctx = context();
        let forged = token::issue("1", &crate::session::Secret::new("other").unwrap());
        let unknown = token::issue("99", &secret(&ctx));
        let garbage = token::issue("admin", &secret(&ctx));
        for value in [forged, unknown, garbage, "junk".to_string()] {
            let get = request(&format!("GET / HTTP/1.1\r\nCookie: totp_auth={value}\r\n\r\n"));
            assert!(matches!(decide(&ctx, 1, &get), Step::Respond(_)));
        }
    }

    #[test]
    fn check_is_repeatable() {
        let ctx = context();
        let csrf = csrf::generate(&secret(&ctx));
        let body = format!("username=admin&totp=123456&csrf={}", urlencode(&csrf));
        for _ in 0..3 {
            let Step::Respond(response) = decide(&ctx, 1, &post(&body)) else {
                panic!("expected a redirect");
            };
            assert_eq!(response.status, 302);
        }
    }

    #[tokio::test]
    async fn closed_stream_gets_no_response() {
        let (client, server) = tokio::io::duplex(1024);
        let ctx = context();
        let task = tokio::spawn(handle_connection(
            server,
            "127.0.0.1:1".parse().unwrap(),
            1,
            ConnectionId::new(),
            ctx,
        ));

        let (mut read, mut write) = tokio::io::split(client);
        write.write_all(b"GET / HTT").await.unwrap();
        write.shutdown().await.unwrap();

        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut read, &mut out).await.unwrap();
        assert!(out.is_empty());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn login_page_is_written_and_connection_closed() {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(handle_connection(
            server,
            "127.0.0.1:1".parse().unwrap(),
            1,
            ConnectionId::new(),
            context(),
        ));

        let (mut read, mut write) = tokio::io::split(client);
        write.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut read, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        task.await.unwrap();
    }

    #[tokio::test]
    async fn oversized_login_post_is_dropped() {
        let mut ctx = context();
        ctx.settings.limits.max_body_bytes = 16;
        let (client, server) = tokio::io::duplex(4096);
        let task = tokio::spawn(handle_connection(
            server,
            "127.0.0.1:1".parse().unwrap(),
            1,
            ConnectionId::new(),
            ctx,
        ));

        let (mut read, mut write) = tokio::io::split(client);
        let body = "username=admin&totp=123456&csrf=x".repeat(3);
        let request = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}", body.len());
        write.write_all(request.as_bytes()).await.unwrap();

        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut read, &mut out).await.unwrap();
        assert!(out.is_empty());
        task.await.unwrap();
    }

    struct PlainRenderer;

    impl crate::render::PageRenderer for PlainRenderer {
        fn render_login_page(&self, page: &LoginPage<'_>) -> String {
            format!("{}|{}|{}", page.title, page.widget.name(), page.error.unwrap_or("-"))
        }
    }

    #[test]
    fn injected_renderer_draws_login_page() {
        let ctx = context().with_renderer(Arc::new(PlainRenderer));
        let (status, page) = body_text(decide(&ctx, 1, &request("GET / HTTP/1.1\r\n\r\n")));
        assert_eq!(status, 200);
        assert_eq!(page, "Dashboard|totp|-");

        let csrf = csrf::generate(&secret(&ctx));
        let body = format!("widget=password&login=admin&password=nope&csrf={}", urlencode(&csrf));
        let (_, page) = body_text(decide(&ctx, 1, &post(&body)));
        assert_eq!(page, "Dashboard|password|Incorrect data");
    }

    #[test]
    fn endpoint_without_registered_widget_is_unavailable() {
        let ctx = context().with_widgets(crate::auth::WidgetRegistry::new());
        let (status, _) = body_text(decide(&ctx, 1, &request("GET / HTTP/1.1\r\n\r\n")));
        assert_eq!(status, 503);

        let (status, _) = body_text(decide(&ctx, 1, &post("login=admin")));
        assert_eq!(status, 503);
    }

    fn urlencode(value: &str) -> String {
        url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
    }
}
