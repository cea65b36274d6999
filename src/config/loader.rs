//! Settings resolution from config file, environment and CLI overrides.

use std::path::PathBuf;

use super::{Config, Settings};

/// Options that influence where settings come from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
    /// Output directory override (`--output-dir`).
    pub output_dir: Option<PathBuf>,
}

async fn load_file_config(options: &LoadOptions) -> Config {
    // Priority 1: Explicit --config flag
    if let Some(ref config_path) = options.config_path {
        return match Config::load_from_path(config_path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}", e);
                Config::default()
            }
        };
    }

    // Priority 2: Auto-discover via prefer
    Config::load().await
}

/// Load settings with explicit options.
///
/// Precedence, lowest first: defaults, config file, environment
/// (`EXCEL_DIR`, `CHROME_USER_DATA_DIR`, `CHROME_EXECUTABLE_PATH`,
/// `BROWSER_HEADLESS`), then `options`.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = load_file_config(&options).await;

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(dir) = std::env::var("EXCEL_DIR").ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using EXCEL_DIR from environment: {}", dir);
        settings.output_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
    settings.browser = settings.browser.with_env_overrides();

    if let Some(dir) = options.output_dir {
        settings.output_dir = dir;
    }

    (settings, config)
}
