//! Configuration management using the prefer crate.
//!
//! A config file (`amzspider.toml`, `.json` or `.yaml`) is discovered by
//! prefer or given explicitly, parsed with serde, then folded into
//! [`Settings`]. Environment variables win over the file.

mod loader;
mod settings;

pub use loader::{load_settings_with_options, LoadOptions};
pub use settings::{Settings, DEFAULT_OUTPUT_FILE, DEFAULT_TEMPLATE_FILE};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, prefer::FromValue)]
pub struct Config {
    /// Directory holding the template and output workbooks.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "excel_dir")]
    pub output_dir: Option<String>,
    /// Template workbook filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_file: Option<String>,
    /// Output workbook filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Run the browser headless.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    /// Chrome profile directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_user_data_dir: Option<String>,
    /// Chrome executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_executable_path: Option<String>,
    /// Additional Chrome arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[prefer(default)]
    pub chrome_args: Vec<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Page navigation timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_timeout: Option<u64>,
    /// Product title wait in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector_timeout: Option<u64>,
    /// Pause after scrolling in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_delay_ms: Option<u64>,
    /// Default delay between items in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_secs: Option<u64>,
    /// Unclaimed server task lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_ttl_secs: Option<u64>,
    /// Region cell value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Warranty cell value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warranty: Option<String>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    #[prefer(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    pub async fn load() -> Self {
        match prefer::load("amzspider").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the file extension; JSON otherwise.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if it came from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref name) = self.template_file {
            settings.template_file = name.clone();
        }
        if let Some(ref name) = self.output_file {
            settings.output_file = name.clone();
        }
        if let Some(headless) = self.headless {
            settings.browser.headless = headless;
        }
        if let Some(ref dir) = self.chrome_user_data_dir {
            settings.browser.user_data_dir = Some(self.resolve_path(dir, base_dir));
        }
        if let Some(ref path) = self.chrome_executable_path {
            settings.browser.executable_path = Some(self.resolve_path(path, base_dir));
        }
        if !self.chrome_args.is_empty() {
            settings.browser.chrome_args = self.chrome_args.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.browser.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.navigation_timeout {
            settings.navigation_timeout = timeout;
        }
        if let Some(timeout) = self.selector_timeout {
            settings.selector_timeout = timeout;
        }
        if let Some(delay) = self.settle_delay_ms {
            settings.settle_delay_ms = delay;
        }
        if let Some(sleep) = self.sleep_secs {
            settings.default_sleep_secs = sleep;
        }
        if let Some(ttl) = self.task_ttl_secs {
            settings.task_ttl_secs = ttl;
        }
        if let Some(ref region) = self.region {
            settings.row_defaults.region = region.clone();
        }
        if let Some(ref warranty) = self.warranty {
            settings.row_defaults.warranty = warranty.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amzspider.toml");
        std::fs::write(
            &path,
            "output_dir = \"sheets\"\nheadless = false\nsleep_secs = 5\nregion = \"UK\"\n",
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.output_dir.as_deref(), Some("sheets"));
        assert_eq!(config.base_dir().as_deref(), Some(dir.path()));

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());
        assert_eq!(settings.output_dir, dir.path().join("sheets"));
        assert!(!settings.browser.headless);
        assert_eq!(settings.default_sleep_secs, 5);
        assert_eq!(settings.row_defaults.region, "UK");
        assert_eq!(settings.row_defaults.warranty, "无保修");
    }

    #[tokio::test]
    async fn test_load_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("amzspider.json");
        std::fs::write(&json, r#"{"excel_dir": "/srv/xlsx", "task_ttl_secs": 30}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.output_dir.as_deref(), Some("/srv/xlsx"));
        assert_eq!(config.task_ttl_secs, Some(30));

        let yaml = dir.path().join("amzspider.yaml");
        std::fs::write(&yaml, "chrome_args:\n  - --lang=en-GB\nnavigation_timeout: 60\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.chrome_args, vec!["--lang=en-GB"]);
        assert_eq!(config.navigation_timeout, Some(60));
    }

    #[tokio::test]
    async fn test_bad_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("amzspider.toml");
        std::fs::write(&path, "headless = [").unwrap();
        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.starts_with("Failed to parse TOML config"));
    }

    #[test]
    fn test_resolve_path() {
        let config = Config::default();
        let base = Path::new("/etc/amzspider");
        assert_eq!(
            config.resolve_path("/abs/out", base),
            PathBuf::from("/abs/out")
        );
        assert_eq!(
            config.resolve_path("rel/out", base),
            PathBuf::from("/etc/amzspider/rel/out")
        );
    }
}
