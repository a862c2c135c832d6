use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::browser::LaunchOptions;
use crate::options::RenderOptions;
use crate::server::{DEFAULT_HOST, DEFAULT_PORT};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub static_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub routes: Vec<String>,
    pub server: ServerConfig,
    pub renderer: RenderOptions,
    pub browser: LaunchOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("{0}")]
    Read(#[from] std::io::Error),
    #[error("{0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load config from an explicit path, else the central config file, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::central_config_path() {
                Some(central) if central.is_file() => Self::from_file(&central),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigLoadError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigLoadError> {
        Ok(toml::from_str(raw)?)
    }

    /// `$XDG_CONFIG_HOME/prerender/config.toml`, falling back to `~/.config`.
    pub fn central_config_path() -> Option<PathBuf> {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("prerender").join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(route) = self.routes.iter().find(|r| !r.starts_with('/')) {
            return Err(format!("route '{}' must start with '/'", route));
        }
        if let Some(viewport) = &self.renderer.viewport {
            if viewport.width == 0 || viewport.height == 0 {
                return Err("viewport width and height must be positive".to_string());
            }
            if !(viewport.device_scale_factor > 0.0) {
                return Err("viewport device_scale_factor must be positive".to_string());
            }
        }
        if self.renderer.inject_property.trim().is_empty() {
            return Err("inject_property must not be empty".to_string());
        }
        for (name, value) in [
            ("navigation timeout", self.renderer.navigation.timeout),
            ("selector_timeout", self.renderer.selector_timeout),
            ("wait_timeout", self.renderer.wait_timeout),
            ("browser launch_timeout", self.browser.launch_timeout),
            ("browser request_timeout", self.browser.request_timeout),
        ] {
            if value == Duration::ZERO {
                return Err(format!("{} must be greater than zero", name));
            }
        }
        Ok(())
    }
}
