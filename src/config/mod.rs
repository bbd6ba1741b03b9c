//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → directory.rs (arena of endpoints and users, decoded credentials)
//!     → SharedConfig (ArcSwap), snapshot taken per connection
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of Arc<Directory>
//!     → new connections observe new config
//! ```
//!
//! # Design Decisions
//! - A snapshot is immutable; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Listen addresses, timeouts and limits are fixed at startup

pub mod directory;
pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use directory::{ConfigProvider, Directory, Endpoint, EndpointId, HostPort, SharedConfig, User, UserId};
pub use loader::{load_config, parse_config, read_config, save_config, ConfigError};
pub use schema::{EndpointConfig, FileConfig, LimitsConfig, ObservabilityConfig, TimeoutConfig, UserConfig};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
