//! Unit tests for configuration module
//!
//! Tests configuration parsing, validation, color handling and
//! fallback behavior for partial files.

use super::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_default_configuration_is_valid() {
    let config = PopstackConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!((config.main_window.width, config.main_window.height), (480, 360));
    assert_eq!((config.popups.first.width, config.popups.first.height), (50, 50));
    assert_eq!((config.popups.second.width, config.popups.second.height), (60, 60));
    assert_eq!((config.popups.offset_x, config.popups.offset_y), (20, 20));
    assert!(!config.general.debug);
}

#[test]
fn test_default_colors() -> Result<()> {
    let config = PopstackConfig::default();

    assert_eq!(config.main_window.rgb()?, 0x00FFFF);
    assert_eq!(config.popups.first.rgb()?, 0xFFFF00);
    assert_eq!(config.popups.second.rgb()?, 0xFF0000);
    assert_eq!(parse_color(&config.popups.repaint_color)?, 0x000000);

    Ok(())
}

#[test]
fn test_configuration_from_file() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("popstack.toml");

    let test_config = r##"
[main_window]
width = 640
height = 480
color = "#112233"

[popups]
offset_x = 5
offset_y = 7
repaint_color = "#FFFFFF"

[popups.first]
width = 30
height = 40
color = "#00FF00"

[popups.second]
width = 70
height = 80
color = "#0000FF"

[general]
debug = true
"##;

    fs::write(&file_path, test_config)?;

    let config = PopstackConfig::load(&file_path)?;

    assert_eq!(config.main_window.width, 640);
    assert_eq!(config.main_window.rgb()?, 0x112233);
    assert_eq!(config.popups.offset_x, 5);
    assert_eq!(config.popups.offset_y, 7);
    assert_eq!(config.popups.first.height, 40);
    assert_eq!(config.popups.second.rgb()?, 0x0000FF);
    assert!(config.general.debug);

    Ok(())
}

#[test]
fn test_partial_configuration_uses_defaults() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("partial.toml");

    fs::write(
        &file_path,
        r##"
[popups]
repaint_color = "#123456"
"##,
    )?;

    let config = PopstackConfig::load(&file_path)?;

    assert_eq!(parse_color(&config.popups.repaint_color)?, 0x123456);
    assert_eq!(config.popups.first, PopupConfig::default().first);
    assert_eq!(config.popups.second, PopupConfig::default().second);
    assert_eq!(config.main_window, SurfaceConfig::default());

    Ok(())
}

#[test]
fn test_malformed_toml_handling() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("malformed.toml");

    fs::write(
        &file_path,
        r#"
[main_window
width = "not a number"
"#,
    )
    .unwrap();

    assert!(PopstackConfig::load(&file_path).is_err());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempdir().unwrap();
    assert!(PopstackConfig::load(dir.path().join("absent.toml")).is_err());
}

#[test]
fn test_configuration_validation() {
    let config = PopstackConfig::default();

    let mut invalid = config.clone();
    invalid.popups.first.width = 0;
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.main_window.height = MAX_SURFACE_EDGE + 1;
    assert!(invalid.validate().is_err());

    let mut invalid = config.clone();
    invalid.popups.second.color = "red".to_string();
    assert!(invalid.validate().is_err());

    let mut invalid = config;
    invalid.popups.repaint_color = "#12345".to_string();
    assert!(invalid.validate().is_err());
}

#[test]
fn test_parse_color_rejects_garbage() {
    assert!(parse_color("FFFFFF").is_err());
    assert!(parse_color("#GGGGGG").is_err());
    assert!(parse_color("#FFFFFFFF").is_err());
    assert_eq!(parse_color("#ffff00").unwrap(), 0xFFFF00);
}

#[test]
fn test_save_then_load() -> Result<()> {
    let dir = tempdir()?;
    let file_path = dir.path().join("saved.toml");

    let mut config = PopstackConfig::default();
    config.popups.offset_x = 33;
    config.save(&file_path)?;

    let loaded = PopstackConfig::load(&file_path)?;
    assert_eq!(loaded, config);

    Ok(())
}

#[test]
fn test_grab_mode() {
    assert!(GrabMode::WithGrab.grabs());
    assert!(!GrabMode::WithoutGrab.grabs());
}
