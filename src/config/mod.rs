//! Configuration management for popstack
//!
//! This module handles loading, parsing, and validating configuration
//! from TOML files. It holds the geometry and fill colors of the main
//! window and of both popup levels. The grab mode is not part of the
//! file; it is selected on the command line.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Largest edge accepted for any surface (pixels)
pub const MAX_SURFACE_EDGE: u32 = 16384;

/// Main configuration struct containing all popstack settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PopstackConfig {
    /// Toplevel window settings
    #[serde(default)]
    pub main_window: SurfaceConfig,

    /// Popup stack settings
    #[serde(default)]
    pub popups: PopupConfig,

    /// General client settings
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Geometry and fill of a single surface
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceConfig {
    /// Width (pixels)
    pub width: u32,

    /// Height (pixels)
    pub height: u32,

    /// Fill color (hex: #RRGGBB)
    pub color: String,
}

/// Popup stack configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopupConfig {
    /// Anchor rectangle x offset from the parent origin
    #[serde(default = "PopupConfig::default_offset")]
    pub offset_x: i32,

    /// Anchor rectangle y offset from the parent origin
    #[serde(default = "PopupConfig::default_offset")]
    pub offset_y: i32,

    /// Fill used when the first popup is repainted into its second buffer
    #[serde(default = "PopupConfig::default_repaint_color")]
    pub repaint_color: String,

    /// Popup anchored to the main window
    #[serde(default = "PopupConfig::default_first")]
    pub first: SurfaceConfig,

    /// Popup anchored to the first popup
    #[serde(default = "PopupConfig::default_second")]
    pub second: SurfaceConfig,
}

/// General client settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
}

/// Whether new popups request an exclusive input grab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrabMode {
    WithGrab,
    WithoutGrab,
}

impl GrabMode {
    pub fn grabs(self) -> bool {
        self == GrabMode::WithGrab
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 360,
            color: "#00FFFF".to_string(),
        }
    }
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            offset_x: Self::default_offset(),
            offset_y: Self::default_offset(),
            repaint_color: Self::default_repaint_color(),
            first: Self::default_first(),
            second: Self::default_second(),
        }
    }
}

impl PopupConfig {
    fn default_offset() -> i32 {
        20
    }
    fn default_repaint_color() -> String {
        "#000000".to_string()
    }
    fn default_first() -> SurfaceConfig {
        SurfaceConfig {
            width: 50,
            height: 50,
            color: "#FFFF00".to_string(),
        }
    }
    fn default_second() -> SurfaceConfig {
        SurfaceConfig {
            width: 60,
            height: 60,
            color: "#FF0000".to_string(),
        }
    }
}

impl SurfaceConfig {
    /// Packed 0x00RRGGBB fill color
    pub fn rgb(&self) -> Result<u32> {
        parse_color(&self.color)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            anyhow::bail!("Invalid {} size {}x{}: must be non-zero", name, self.width, self.height);
        }
        if self.width > MAX_SURFACE_EDGE || self.height > MAX_SURFACE_EDGE {
            anyhow::bail!(
                "Invalid {} size {}x{}: edges are limited to {}",
                name,
                self.width,
                self.height,
                MAX_SURFACE_EDGE
            );
        }
        self.rgb().with_context(|| format!("Invalid {} color", name))?;
        Ok(())
    }
}

/// Parse a `#RRGGBB` string into a packed 0x00RRGGBB value
pub fn parse_color(s: &str) -> Result<u32> {
    let hex = s
        .strip_prefix('#')
        .with_context(|| format!("Color `{}` must start with '#'", s))?;
    if hex.len() != 6 {
        anyhow::bail!("Color `{}` must have exactly six hex digits", s);
    }
    u32::from_str_radix(hex, 16).with_context(|| format!("Color `{}` is not hexadecimal", s))
}

impl PopstackConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Expand ~ to home directory
        let expanded_path = if path.to_string_lossy().starts_with('~') {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            let rest = path.strip_prefix("~").unwrap_or(path);
            Path::new(&home).join(rest)
        } else {
            path.to_path_buf()
        };

        let contents = fs::read_to_string(&expanded_path)
            .with_context(|| format!("Failed to read config file: {}", expanded_path.display()))?;

        let config: PopstackConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", expanded_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.main_window.validate("main_window")?;
        self.popups.first.validate("popups.first")?;
        self.popups.second.validate("popups.second")?;
        parse_color(&self.popups.repaint_color).context("Invalid popups.repaint_color")?;
        Ok(())
    }

    /// Save configuration to a TOML file
    #[allow(dead_code)]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests;
