//! Integration tests for configuration loading
//!
//! Tests that verify config loading from files and environment variables.

use silica::config::AppConfig;
use silica_core::TreeConfig;
use serial_test::serial;
use std::fs;
use std::path::PathBuf;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("silica_config_{}_{}", name, std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
#[serial]
fn test_env_override() {
    std::env::set_var("SILICA_COLLISION__FAT_MARGIN_RATIO", "0.2");
    let config = AppConfig::load().unwrap();
    std::env::remove_var("SILICA_COLLISION__FAT_MARGIN_RATIO");

    assert_eq!(config.collision.fat_margin_ratio, 0.2);
    assert_eq!(TreeConfig::from(&config.collision).fat_margin_ratio, 0.2);
}

#[test]
#[serial]
fn test_default_file_matches_built_in_defaults() {
    let config = AppConfig::load_from("config").unwrap();
    let defaults = AppConfig::default();

    assert_eq!(config.demo.columns, defaults.demo.columns);
    assert_eq!(config.demo.cell_size, defaults.demo.cell_size);
    assert_eq!(config.collision.min_fat_margin, defaults.collision.min_fat_margin);
    assert_eq!(config.debug.stats_interval, defaults.debug.stats_interval);
}

#[test]
#[serial]
fn test_user_file_overrides_default_file() {
    let dir = scratch_dir("layering");
    fs::write(dir.join("default.toml"), "[demo]\ncolumns = 20\nrows = 10\n").unwrap();
    fs::write(dir.join("user.toml"), "[demo]\nrows = 4\n").unwrap();

    let config = AppConfig::load_from(&dir).unwrap();
    fs::remove_dir_all(&dir).unwrap();

    assert_eq!(config.demo.columns, 20);
    assert_eq!(config.demo.rows, 4);
    // Keys missing from both files fall back to the section default
    assert_eq!(config.demo.cell_size, 48.0);
}

#[test]
#[serial]
fn test_bad_value_is_an_error() {
    let dir = scratch_dir("bad_value");
    fs::write(dir.join("default.toml"), "[simulation]\nframes = \"many\"\n").unwrap();

    let result = AppConfig::load_from(&dir);
    fs::remove_dir_all(&dir).unwrap();

    let err = result.unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}

#[test]
#[serial]
fn test_config_round_trips_through_toml() {
    let config = AppConfig::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: AppConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.demo.hero_speed, config.demo.hero_speed);
    assert_eq!(parsed.debug.log_level, config.debug.log_level);
}
