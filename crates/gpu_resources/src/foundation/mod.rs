//! Foundation module - Core utilities shared by every subsystem
//!
//! - Logging utilities

pub mod logging;
