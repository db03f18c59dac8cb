//! Shared types, error model, and configuration for VC Scout.
//!
//! This crate is the foundation depended on by all other VC Scout crates.
//! It provides the unified [`ScoutError`], the wire types
//! ([`EnrichmentRequest`], [`EnrichmentResult`], [`IntelligenceFields`]) and
//! TOML configuration loading ([`AppConfig`]).

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BROWSER_USER_AGENT, Environment, FetchConfig, GeminiConfig, MAX_CONTENT_CHARS,
    ServerConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_api_key,
};
pub use error::{DEFAULT_RETRY_AFTER_SECS, Result, ScoutError};
pub use types::{EnrichmentRequest, EnrichmentResult, IntelligenceFields, SourceRef};
