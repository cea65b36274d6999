//! Browser engine configuration types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Chrome profile directory. Cookies persist across runs when set.
    #[serde(default)]
    pub user_data_dir: Option<PathBuf>,

    /// Explicit Chrome executable. Common install paths are probed otherwise.
    #[serde(default)]
    pub executable_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// User agent sent by every page.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Window and viewport size in pixels.
    #[serde(default = "default_window_size")]
    pub window_size: (u32, u32),
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            user_data_dir: None,
            executable_path: None,
            chrome_args: Vec::new(),
            user_agent: default_user_agent(),
            window_size: default_window_size(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply `CHROME_USER_DATA_DIR`, `CHROME_EXECUTABLE_PATH` and
    /// `BROWSER_HEADLESS` from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("CHROME_USER_DATA_DIR") {
            if !dir.is_empty() {
                self.user_data_dir = Some(PathBuf::from(shellexpand::tilde(&dir).as_ref()));
            }
        }
        if let Ok(path) = std::env::var("CHROME_EXECUTABLE_PATH") {
            if !path.is_empty() {
                self.executable_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(value) = std::env::var("BROWSER_HEADLESS") {
            if let Some(headless) = parse_flag(&value) {
                self.headless = headless;
            }
        }
        self
    }

    /// Copy of this config with the headless flag of a single request.
    pub fn with_headless(&self, headless: bool) -> Self {
        Self {
            headless,
            ..self.clone()
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

pub fn default_window_size() -> (u32, u32) {
    (1280, 800)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BrowserEngineConfig::default();
        assert!(config.headless);
        assert_eq!(config.window_size, (1280, 800));
        assert!(config.user_agent.contains("Chrome/121.0.0.0"));
    }

    #[test]
    fn test_partial_toml() {
        let config: BrowserEngineConfig =
            toml::from_str("headless = false\nchrome_args = [\"--lang=en-GB\"]").unwrap();
        assert!(!config.headless);
        assert_eq!(config.chrome_args, vec!["--lang=en-GB"]);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_with_headless() {
        let config = BrowserEngineConfig::default().with_headless(false);
        assert!(!config.headless);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
