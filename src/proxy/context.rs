//! Everything a connection handler needs, built once at startup.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Clock, SystemClock, TotpSettings, WidgetRegistry};
use crate::config::{FileConfig, SharedConfig};
use crate::http::ParseLimits;
use crate::render::{LoginPageRenderer, PageRenderer};

/// Settings fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Bound on opening the upstream connection.
    pub connect_timeout: Duration,
    /// Bound on receiving the first request head.
    pub request_timeout: Duration,
    /// Close relayed pairs after this long without traffic.
    pub relay_idle: Option<Duration>,
    pub shutdown_grace: Duration,
    pub limits: ParseLimits,
    pub max_connections: usize,
    pub totp: TotpSettings,
}

impl ProxySettings {
    pub fn from_config(config: &FileConfig) -> Self {
        let relay_idle = config.timeouts.relay_idle_secs;
        Self {
            connect_timeout: Duration::from_secs(config.timeouts.connect_secs),
            request_timeout: Duration::from_secs(config.timeouts.idle_secs),
            relay_idle: (relay_idle > 0).then(|| Duration::from_secs(relay_idle)),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
            limits: ParseLimits {
                max_head_bytes: config.limits.max_head_bytes,
                max_body_bytes: config.limits.max_body_bytes,
            },
            max_connections: config.limits.max_connections,
            totp: config.totp,
        }
    }
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self::from_config(&FileConfig::default())
    }
}

/// Shared, cheaply clonable state handed to every connection.
#[derive(Clone)]
pub struct ProxyContext {
    pub config: SharedConfig,
    pub widgets: Arc<WidgetRegistry>,
    pub renderer: Arc<dyn PageRenderer>,
    pub clock: Arc<dyn Clock>,
    pub settings: ProxySettings,
}

impl ProxyContext {
    /// Built-in widgets, the built-in login page and the system clock.
    pub fn new(config: SharedConfig, settings: ProxySettings) -> Self {
        Self {
            config,
            widgets: Arc::new(WidgetRegistry::builtin(&settings.totp)),
            renderer: Arc::new(LoginPageRenderer::default()),
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_widgets(mut self, widgets: WidgetRegistry) -> Self {
        self.widgets = Arc::new(widgets);
        self
    }
}

impl std::fmt::Debug for ProxyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyContext")
            .field("config", &self.config)
            .field("widgets", &self.widgets)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
