//! # Resource Manager Configuration
//!
//! Tunables for the resource manager: how many frames the GPU may lag behind
//! the CPU, how large the staging buffer starts out, and how much room each
//! resource table reserves up front.
//!
//! ## Configuration Files
//!
//! `ResourceManagerConfig` implements [`Config`], so it can be loaded from and
//! saved to `.toml` or `.ron` files.

use serde::{Deserialize, Serialize};

pub use crate::config::{Config, ConfigError};

/// Default number of frames the GPU may have queued at once
pub const DEFAULT_FRAMES_IN_FLIGHT: u32 = 2;

/// Upper bound accepted for frames in flight
pub const MAX_FRAMES_IN_FLIGHT: u32 = 8;

/// Default staging capacity (4 MiB)
pub const DEFAULT_STAGING_SIZE: u64 = 4 * 1024 * 1024;

/// Default size of one dynamic uniform block (64 KiB)
pub const DEFAULT_DYNAMIC_BUFFER_SIZE: u64 = 64 * 1024;

/// # Resource Manager Configuration
///
/// Every field has a sensible default; use the `with_*` builders to override
/// individual values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceManagerConfig {
    /// Frames kept in flight; seeds the deferred deletion countdown
    pub frames_in_flight: u32,
    /// Staging buffer capacity created up front (0 creates it on first upload)
    pub initial_staging_size: u64,
    /// Size in bytes of each block handed out by the dynamic buffer pool
    pub dynamic_buffer_size: u64,
    /// Buffer slots reserved when the manager is created
    pub buffer_capacity: usize,
    /// Texture slots reserved when the manager is created
    pub texture_capacity: usize,
    /// Shader slots reserved when the manager is created
    pub shader_capacity: usize,
}

impl ResourceManagerConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            initial_staging_size: DEFAULT_STAGING_SIZE,
            dynamic_buffer_size: DEFAULT_DYNAMIC_BUFFER_SIZE,
            buffer_capacity: 256,
            texture_capacity: 128,
            shader_capacity: 32,
        }
    }

    /// Set frames in flight
    pub fn with_frames_in_flight(mut self, frames: u32) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set the initial staging capacity
    pub fn with_initial_staging_size(mut self, bytes: u64) -> Self {
        self.initial_staging_size = bytes;
        self
    }

    /// Set the dynamic block size
    pub fn with_dynamic_buffer_size(mut self, bytes: u64) -> Self {
        self.dynamic_buffer_size = bytes;
        self
    }

    /// Set table reservation hints
    pub fn with_capacities(mut self, buffers: usize, textures: usize, shaders: usize) -> Self {
        self.buffer_capacity = buffers;
        self.texture_capacity = textures;
        self.shader_capacity = shaders;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "Frames in flight must be at least 1".to_string(),
            ));
        }

        if self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "Frames in flight should not exceed {}",
                MAX_FRAMES_IN_FLIGHT
            )));
        }

        if self.dynamic_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "Dynamic buffer size must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for ResourceManagerConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ResourceManagerConfig::default();
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.initial_staging_size, 4 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        assert!(ResourceManagerConfig::new().with_frames_in_flight(0).validate().is_err());
        assert!(ResourceManagerConfig::new().with_frames_in_flight(9).validate().is_err());
        assert!(ResourceManagerConfig::new().with_frames_in_flight(8).validate().is_ok());
    }

    #[test]
    fn test_zero_dynamic_size_rejected() {
        let config = ResourceManagerConfig::new().with_dynamic_buffer_size(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_parse_fills_defaults() {
        let config = ResourceManagerConfig::from_str_with_format(
            "frames_in_flight = 3\ninitial_staging_size = 0\n",
            "resources.toml",
        )
        .unwrap();
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.initial_staging_size, 0);
        assert_eq!(config.dynamic_buffer_size, DEFAULT_DYNAMIC_BUFFER_SIZE);
    }

    #[test]
    fn test_ron_parse() {
        let config = ResourceManagerConfig::from_str_with_format(
            "(frames_in_flight: 3, dynamic_buffer_size: 1024)",
            "resources.ron",
        )
        .unwrap();
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.dynamic_buffer_size, 1024);
        assert_eq!(config.initial_staging_size, DEFAULT_STAGING_SIZE);
    }

    #[test]
    fn test_unknown_extension() {
        let result = ResourceManagerConfig::from_str_with_format("", "resources.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_save_and_load_toml() {
        let path = std::env::temp_dir().join("gpu_resources_config_test.toml");
        let path = path.to_string_lossy().to_string();
        let config = ResourceManagerConfig::new()
            .with_frames_in_flight(3)
            .with_capacities(8, 4, 2);
        config.save_to_file(&path).unwrap();
        let loaded = ResourceManagerConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}
