// Configuration - settings loaded from config.toml
//
// Falls back to defaults if the file is missing or malformed.

use crate::backend::probe;
use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "vk-clear".to_string(),
            width: probe::DEFAULT_EXTENT.width,
            height: probe::DEFAULT_EXTENT.height,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Screen clear color, RGBA in the 0-1 range
    pub clear_color: [f32; 4],
    /// Preferred present mode; falls back to mailbox/fifo when the surface
    /// doesn't support it
    pub present_mode: String,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.3, 0.5, 1.0],
            present_mode: "mailbox".to_string(),
        }
    }
}

impl GraphicsConfig {
    /// Map the configured present mode onto the Vulkan enum. Unknown values
    /// log a warning and leave the selection to the automatic chain.
    pub fn preferred_present_mode(&self) -> Option<vk::PresentModeKHR> {
        match self.present_mode.to_lowercase().as_str() {
            "immediate" => Some(vk::PresentModeKHR::IMMEDIATE),
            "mailbox" => Some(vk::PresentModeKHR::MAILBOX),
            "fifo" => Some(vk::PresentModeKHR::FIFO),
            "fifo_relaxed" => Some(vk::PresentModeKHR::FIFO_RELAXED),
            other => {
                log::warn!(
                    "Unknown present mode '{}', using automatic selection",
                    other
                );
                None
            }
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
        }
    }
}

impl Config {
    /// Load configuration from config.toml, falling back to defaults
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {}. Using defaults.", e);
            Config::default()
        })
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(config.debug.validation_layers);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_the_rest() {
        let config: Config = toml::from_str(
            r#"
            [window]
            title = "test"
            width = 1024

            [graphics]
            clear_color = [1.0, 0.0, 0.0, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.window.title, "test");
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.clear_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn present_mode_strings_map_to_vulkan_enums() {
        let mut graphics = GraphicsConfig::default();
        assert_eq!(
            graphics.preferred_present_mode(),
            Some(vk::PresentModeKHR::MAILBOX)
        );

        graphics.present_mode = "FIFO".to_string();
        assert_eq!(
            graphics.preferred_present_mode(),
            Some(vk::PresentModeKHR::FIFO)
        );

        graphics.present_mode = "vsync-ish".to_string();
        assert_eq!(graphics.preferred_present_mode(), None);
    }
}
