//! Shared startup for the binary: logging, paths and settings.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{EngineSettings, SETTINGS_FILE};
use crate::paths::{self, PathConfig};

/// Map `-v` count to a level: 0 = warn, 1 = info, 2 = debug, 3+ = trace
pub fn log_level(verbosity: u8) -> log::LevelFilter {
    match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Initialize logging. Console logging respects `RUST_LOG`; file logging
/// uses the verbosity level as-is.
pub fn init_logger(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let level = log_level(verbosity);
    if let Some(path) = log_file {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        env_logger::Builder::new()
            .filter_level(level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .try_init()
            .context("Logger already initialized")?;
        log::info!("Logging to file: {} (level: {:?})", path.display(), level);
    } else {
        let default_level = match verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .try_init()
            .context("Logger already initialized")?;
    }
    Ok(())
}

/// Resolved paths and settings for one run
#[derive(Debug, Clone)]
pub struct Shell {
    pub path_config: PathConfig,
    pub settings_path: PathBuf,
    pub settings: EngineSettings,
}

impl Shell {
    pub fn bootstrap(config_dir: Option<PathBuf>) -> Self {
        let path_config = PathConfig::from_env_and_cli(config_dir);
        let settings_path = paths::config_file(SETTINGS_FILE, &path_config);
        log::info!("Config path: {}", settings_path.display());
        let settings = EngineSettings::load(&settings_path);
        Self {
            path_config,
            settings_path,
            settings,
        }
    }

    /// Persist current settings to the resolved config path
    pub fn save_settings(&self) -> Result<()> {
        paths::ensure_config_dir(&self.path_config)?;
        self.settings.save(&self.settings_path)
    }
}
