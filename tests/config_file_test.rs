//! Configuration file loading tests

use anyhow::Result;
use chatrelay::config::ConfigManager;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_load_full_config_file() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("chatrelay.toml");
    fs::write(
        &config_path,
        r#"
[server]
bind_addr = "127.0.0.1:9090"
max_clients = 12
write_timeout = "750ms"

[chat]
max_name_length = 16
max_message_length = 512
banned_words = ["spam", "eggs"]

[monitoring]
log_level = "debug"
metrics_addr = "127.0.0.1:9191"
"#,
    )?;

    let config = ConfigManager::load_from_file(&config_path)?;

    assert_eq!(config.server.bind_addr.port(), 9090);
    assert_eq!(config.server.max_clients, 12);
    assert_eq!(config.server.write_timeout, Duration::from_millis(750));
    assert_eq!(config.chat.max_name_length, 16);
    assert_eq!(config.chat.max_message_length, 512);
    assert_eq!(config.chat.banned_words, vec!["spam", "eggs"]);
    assert_eq!(config.monitoring.log_level, "debug");
    assert_eq!(config.monitoring.metrics_addr.map(|a| a.port()), Some(9191));
    Ok(())
}

#[test]
fn test_partial_config_uses_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("chatrelay.toml");
    fs::write(&config_path, "[server]\nmax_clients = 3\n")?;

    let config = ConfigManager::load_from_file(&config_path)?;

    assert_eq!(config.server.max_clients, 3);
    assert_eq!(config.server.bind_addr.port(), 8080);
    assert_eq!(config.chat.max_name_length, 31);
    assert_eq!(config.chat.max_message_length, 256);
    assert_eq!(config.chat.banned_words, vec!["badword1", "badword2", "badword3"]);
    Ok(())
}

#[test]
fn test_missing_file_falls_back_to_defaults() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = ConfigManager::load_from_file(&temp_dir.path().join("absent.toml"))?;
    assert_eq!(config.server.max_clients, 100);
    Ok(())
}

#[test]
fn test_invalid_files_are_rejected() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config_path = temp_dir.path().join("chatrelay.toml");

    fs::write(&config_path, "invalid toml content [[[")?;
    assert!(ConfigManager::load_from_file(&config_path).is_err());

    fs::write(&config_path, "[server]\nmax_clients = 0\n")?;
    assert!(ConfigManager::load_from_file(&config_path).is_err());

    fs::write(&config_path, "[chat]\nbanned_words = [\"\"]\n")?;
    assert!(ConfigManager::load_from_file(&config_path).is_err());

    fs::write(&config_path, "[server]\nwrite_timeout = \"soon\"\n")?;
    assert!(ConfigManager::load_from_file(&config_path).is_err());
    Ok(())
}
