use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use url::Url;

use streamable::DEFAULT_BASE_URL;

pub const KEYRING_SERVICE: &str = "streamable-cli";

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
pub struct ConfigFile {
    pub base_url: Option<Url>,
    pub username: Option<String>,
    pub clipboard: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigEnv {
    base_url: Option<Url>,
    username: Option<String>,
    password: Option<String>,
    clipboard: Option<bool>,
}

#[derive(Debug)]
pub struct Config {
    pub base_url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    pub clipboard: bool,
}

fn merge_config(base: ConfigFile, override_config: ConfigEnv) -> Result<Config> {
    let base_url = match override_config.base_url.or(base.base_url) {
        Some(url) => url,
        None => Url::parse(DEFAULT_BASE_URL)?,
    };

    Ok(Config {
        base_url,
        username: override_config.username.or(base.username),
        password: override_config.password,
        clipboard: override_config.clipboard.or(base.clipboard).unwrap_or(false),
    })
}

fn config_file_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "streamable", "streamable")
        .ok_or(anyhow!("Unable to determine home directory"))?;
    Ok(project_dirs.config_dir().join("config.toml"))
}

pub fn read_config_file() -> Result<ConfigFile> {
    let config_file = config_file_path()?;
    match fs::read_to_string(&config_file) {
        Ok(config) => toml::from_str(&config)
            .with_context(|| format!("Failed to parse {}", config_file.display())),
        Err(_) => Ok(ConfigFile::default()),
    }
}

pub fn read_config() -> Result<Config> {
    let _ = dotenv();
    let env_config = envy::prefixed("STREAMABLE_")
        .from_env::<ConfigEnv>()
        .unwrap_or_default();

    merge_config(read_config_file()?, env_config)
}

pub fn write_config(config: ConfigFile) -> Result<PathBuf> {
    let config_file = config_file_path()?;
    if let Some(parent) = config_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&config_file, toml::to_string_pretty(&config)?)
        .with_context(|| format!("Failed to write {}", config_file.display()))?;
    Ok(config_file)
}

pub fn get_password_keyring(username: &str) -> Option<String> {
    let entry = Entry::new(KEYRING_SERVICE, username).ok()?;
    entry.get_password().ok()
}

pub fn set_password_keyring(username: &str, password: &str) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, username)?;
    entry
        .set_password(password)
        .context("Unable to store password in OS keyring")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            base_url: Some(Url::parse("http://file.example.com").unwrap()),
            username: Some("file-user".to_string()),
            clipboard: Some(true),
        };
        let env = ConfigEnv {
            base_url: Some(Url::parse("http://env.example.com").unwrap()),
            username: None,
            password: Some("hunter2".to_string()),
            clipboard: Some(false),
        };

        let config = merge_config(file, env).unwrap();
        assert_eq!(config.base_url.as_str(), "http://env.example.com/");
        assert_eq!(config.username.as_deref(), Some("file-user"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
        assert!(!config.clipboard);
    }

    #[test]
    fn test_defaults() {
        let config = merge_config(ConfigFile::default(), ConfigEnv::default()).unwrap();
        assert_eq!(config.base_url.as_str(), "https://ajax.streamable.com/");
        assert!(config.username.is_none());
        assert!(!config.clipboard);
    }

    #[test]
    fn test_config_file_roundtrip_through_toml() {
        let file = ConfigFile {
            base_url: None,
            username: Some("bob".to_string()),
            clipboard: Some(true),
        };
        let parsed: ConfigFile = toml::from_str(&toml::to_string_pretty(&file).unwrap()).unwrap();
        assert_eq!(parsed, file);
    }
}
