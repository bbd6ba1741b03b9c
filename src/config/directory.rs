//! Validated, read-only view of endpoints and users.
//!
//! # Responsibilities
//! - Turn a [`FileConfig`] into typed records with decoded credentials
//! - Answer "which users may pass this endpoint" without back-references
//! - Publish a snapshot that connections hold for their whole lifetime
//!
//! # Design Decisions
//! - Endpoints and users live in two maps keyed by id; membership is a set of
//!   ids on each side, so there are no ownership cycles
//! - Reloads swap the whole [`Directory`]; a connection keeps the snapshot
//!   it started with

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use sha2::{Digest, Sha256};

use crate::auth::otp::{decode_secret, OtpError};
use crate::config::loader::ConfigError;
use crate::config::schema::{EndpointConfig, FileConfig, UserConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::session::Secret;

pub type UserId = u64;
pub type EndpointId = u64;

const DEFAULT_PORT: u16 = 80;

/// A `host[:port]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

impl HostPort {
    /// Parse `host[:port]`; the port defaults to 80. IPv6 hosts use brackets.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value.contains("://") {
            return None;
        }
        let url = url::Url::parse(&format!("tcp://{value}")).ok()?;
        if !url.path().is_empty()
            || url.query().is_some()
            || url.fragment().is_some()
            || !url.username().is_empty()
        {
            return None;
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        Some(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
        })
    }

    /// Form accepted by `TcpListener::bind` and `TcpStream::connect`.
    pub fn as_tuple(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// One protected backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub id: EndpointId,
    pub name: String,
    pub listen: HostPort,
    pub upstream: HostPort,
    /// Enabled widget names; the first is the default.
    pub widgets: Vec<String>,
    pub users: BTreeSet<UserId>,
    pub headers_rewrite: BTreeMap<String, String>,
}

impl Endpoint {
    fn from_config(config: &EndpointConfig) -> Option<Self> {
        Some(Self {
            id: config.id,
            name: if config.name.is_empty() {
                format!("endpoint {}", config.id)
            } else {
                config.name.clone()
            },
            listen: HostPort::parse(&config.listen)?,
            upstream: HostPort::parse(&config.upstream)?,
            widgets: config.widgets.clone(),
            users: config.users.clone(),
            headers_rewrite: config.headers_rewrite.clone(),
        })
    }

    pub fn authorizes(&self, user: UserId) -> bool {
        self.users.contains(&user)
    }
}

/// An account with decoded credential material.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub totp_key: Option<Vec<u8>>,
    pub password_sha256: Option<Vec<u8>>,
    /// Endpoints this user is authorized on.
    pub endpoints: BTreeSet<EndpointId>,
}

impl User {
    pub fn new(id: UserId, login: impl Into<String>) -> Self {
        Self {
            id,
            login: login.into(),
            totp_key: None,
            password_sha256: None,
            endpoints: BTreeSet::new(),
        }
    }

    /// Store the SHA-256 of a clear-text password.
    pub fn with_password(mut self, password: &str) -> Self {
        self.password_sha256 = Some(Sha256::digest(password.as_bytes()).to_vec());
        self
    }

    /// Decode and store a base32 TOTP secret.
    pub fn with_totp_secret(mut self, secret: &str) -> Result<Self, OtpError> {
        self.totp_key = Some(decode_secret(secret)?);
        Ok(self)
    }

    fn from_config(config: &UserConfig) -> Result<Self, ValidationError> {
        let mut user = Self::new(config.id, config.login.clone());
        if let Some(secret) = &config.totp_secret {
            user = user
                .with_totp_secret(secret)
                .map_err(|_| ValidationError::InvalidTotpSecret(config.id))?;
        }
        if let Some(hash) = &config.password_sha256 {
            let bytes = hex::decode(hash).map_err(|_| ValidationError::InvalidPasswordHash(config.id))?;
            user.password_sha256 = Some(bytes);
        }
        Ok(user)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("login", &self.login)
            .field("totp", &self.totp_key.is_some())
            .field("password", &self.password_sha256.is_some())
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

/// Read access to endpoint and user records.
pub trait ConfigProvider: Send + Sync {
    fn list_endpoints(&self) -> Vec<&Endpoint>;
    fn get_endpoint(&self, id: EndpointId) -> Option<&Endpoint>;
    fn user(&self, id: UserId) -> Option<&User>;
    fn secret(&self) -> &Secret;
}

/// Arena of endpoints and users keyed by id.
#[derive(Debug, Clone)]
pub struct Directory {
    secret: Secret,
    endpoints: BTreeMap<EndpointId, Endpoint>,
    users: BTreeMap<UserId, User>,
}

impl Directory {
    /// Build from records that are already known to be consistent.
    pub fn new(secret: Secret, endpoints: Vec<Endpoint>, users: Vec<User>) -> Self {
        let mut users: BTreeMap<_, _> = users.into_iter().map(|u| (u.id, u)).collect();
        let endpoints: BTreeMap<_, _> = endpoints.into_iter().map(|e| (e.id, e)).collect();
        for endpoint in endpoints.values() {
            for user_id in &endpoint.users {
                if let Some(user) = users.get_mut(user_id) {
                    user.endpoints.insert(endpoint.id);
                }
            }
        }
        Self {
            secret,
            endpoints,
            users,
        }
    }

    /// Validate a file configuration and build the arena from it.
    pub fn from_config(config: &FileConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let secret = Secret::new(config.secret.clone())
            .ok_or_else(|| ConfigError::Validation(vec![ValidationError::MissingSecret]))?;

        let mut errors = Vec::new();
        let mut users = Vec::with_capacity(config.users.len());
        for user in &config.users {
            match User::from_config(user) {
                Ok(user) => users.push(user),
                Err(e) => errors.push(e),
            }
        }
        let mut endpoints = Vec::with_capacity(config.endpoints.len());
        for endpoint in &config.endpoints {
            match Endpoint::from_config(endpoint) {
                Some(endpoint) => endpoints.push(endpoint),
                None => errors.push(ValidationError::InvalidAddress {
                    endpoint: endpoint.id,
                    field: "listen",
                    value: endpoint.listen.clone(),
                }),
            }
        }
        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Self::new(secret, endpoints, users))
    }

    /// Users allowed through `endpoint`, in id order.
    pub fn authorized_users(&self, endpoint: &Endpoint) -> Vec<&User> {
        endpoint
            .users
            .iter()
            .filter_map(|id| self.users.get(id))
            .collect()
    }

    pub fn is_authorized(&self, endpoint: EndpointId, user: UserId) -> bool {
        self.endpoints
            .get(&endpoint)
            .map(|e| e.authorizes(user) && self.users.contains_key(&user))
            .unwrap_or(false)
    }
}

impl ConfigProvider for Directory {
    fn list_endpoints(&self) -> Vec<&Endpoint> {
        self.endpoints.values().collect()
    }

    fn get_endpoint(&self, id: EndpointId) -> Option<&Endpoint> {
        self.endpoints.get(&id)
    }

    fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id)
    }

    fn secret(&self) -> &Secret {
        &self.secret
    }
}

/// The current [`Directory`], replaceable at runtime.
#[derive(Clone)]
pub struct SharedConfig {
    inner: Arc<ArcSwap<Directory>>,
}

impl SharedConfig {
    pub fn new(directory: Directory) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(directory)),
        }
    }

    /// The directory as of now. Later reloads do not affect it.
    pub fn snapshot(&self) -> Arc<Directory> {
        self.inner.load_full()
    }

    pub fn replace(&self, directory: Directory) {
        self.inner.store(Arc::new(directory));
    }
}

impl fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConfig")
            .field("endpoints", &self.inner.load().endpoints.len())
            .finish()
    }
}
