//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), named by PROXY_BRIDGE_CONFIG or --config
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BridgeConfig (validated, immutable)
//!     → Bridge::new sizes the runtime and tables from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the bridge is built from it once
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, parse_config, ConfigError};
pub use schema::BridgeConfig;
pub use schema::BufferConfig;
pub use schema::HandlerConfig;
pub use schema::ObservabilityConfig;
pub use schema::RuntimeConfig;
pub use schema::SessionConfig;
pub use validation::{validate_config, ValidationError};
