use super::Config;
use super::types::default_config_dir;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    /// Loads `config_path` (default `~/.grouplock/config.toml`), creating it
    /// with defaults when absent, then applies env overrides and validates.
    pub fn load_or_init(config_path: Option<&Path>) -> Result<Self> {
        let config_path =
            config_path.map_or_else(|| default_config_dir().join("config.toml"), Path::to_path_buf);

        if let Some(parent) = config_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path.clone_from(&config_path);
            config
        } else {
            let config = Self {
                config_path: config_path.clone(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}
