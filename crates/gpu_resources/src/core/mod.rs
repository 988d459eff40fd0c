//! # Core Module
//!
//! Shared configuration for the resource manager and its backends.

pub mod config;

pub use config::ResourceManagerConfig;
pub use crate::config::{Config, ConfigError};
