//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply SENTINEL_* overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BreakerConfig, DatabaseConfig, GatewayConfig, IdentityConfig, KillSwitchConfig,
    LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig, StoreConfig, TimeoutConfig,
};
