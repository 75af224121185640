//! Core domain logic for the Astra wallet.
//!
//! This crate provides:
//! - Fixed-point amount conversion (`amount` module)
//! - Staking APR math (`apr` module)
//! - Core domain types (`types` module)
//! - Display types for UI (`display` module)
//!
//! With the `persistence` feature enabled:
//! - Configuration management (`config` module)

pub mod amount;
pub mod apr;
pub mod display;
pub mod types;

#[cfg(feature = "persistence")]
pub mod config;

// Re-export commonly used items from core modules
pub use amount::*;
pub use apr::*;
pub use display::*;
pub use types::*;

#[cfg(feature = "persistence")]
pub use config::{AppConfig, ConfigError, EndpointOverrides};
