use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Installation {
    System,
    User,
}

impl Installation {
    pub fn flag(&self) -> &'static str {
        match self {
            Installation::System => "--system",
            Installation::User => "--user",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Installation::System => "system",
            Installation::User => "user",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote_name: String,
    pub installation: Installation,
    pub show_installed_only: bool,
    pub dark_theme: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_name: "flathub".to_string(),
            installation: Installation::System,
            show_installed_only: false,
            dark_theme: true,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            log::debug!("loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        log::debug!("saved config to {}", config_path.display());
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")?;
        Ok(PathBuf::from(home).join(".config").join("flatnest").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: Config = serde_json::from_str(r#"{ "installation": "user" }"#).unwrap();
        assert_eq!(config.installation, Installation::User);
        assert_eq!(config.remote_name, "flathub");
        assert!(config.dark_theme);
        assert!(!config.show_installed_only);
    }

    #[test]
    fn installation_serializes_lowercase() {
        let json = serde_json::to_string(&Config::default()).unwrap();
        assert!(json.contains(r#""installation":"system""#));
        assert_eq!(Installation::User.flag(), "--user");
    }
}
