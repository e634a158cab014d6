//! Runtime configuration read from `EAD_*` environment variables.

use std::path::PathBuf;

use ead_core::playback::TrackerSettings;

use crate::error::ConfigError;

pub const DB_URL_VAR: &str = "EAD_DB_URL";
pub const CATALOG_PATH_VAR: &str = "EAD_CATALOG_PATH";
pub const SKIP_TOLERANCE_VAR: &str = "EAD_SKIP_TOLERANCE_SECS";
pub const COMPLETION_PERCENT_VAR: &str = "EAD_COMPLETION_PERCENT";

pub const DEFAULT_DB_URL: &str = "sqlite:ead.sqlite3";

#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub db_url: String,
    /// `None` loads the bundled demo catalog.
    pub catalog_path: Option<PathBuf>,
    pub tracker: TrackerSettings,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            db_url: DEFAULT_DB_URL.to_owned(),
            catalog_path: None,
            tracker: TrackerSettings::default_for_training(),
        }
    }
}

impl PortalConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable does not parse or the
    /// resulting tracker settings are out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`PortalConfig::from_env`] with an injectable variable source.
    ///
    /// # Errors
    ///
    /// See [`PortalConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(url) = non_blank(DB_URL_VAR) {
            config.db_url = url.trim().to_owned();
        }
        config.catalog_path = non_blank(CATALOG_PATH_VAR).map(PathBuf::from);

        if let Some(raw) = non_blank(SKIP_TOLERANCE_VAR) {
            let secs = parse_number(SKIP_TOLERANCE_VAR, &raw)?;
            config.tracker = config.tracker.with_skip_tolerance(secs)?;
        }
        if let Some(raw) = non_blank(COMPLETION_PERCENT_VAR) {
            let percent = parse_number(COMPLETION_PERCENT_VAR, &raw)?;
            config.tracker = config.tracker.with_completion_percent(percent)?;
        }
        Ok(config)
    }
}

fn parse_number(var: &'static str, raw: &str) -> Result<f64, ConfigError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidNumber {
            var,
            raw: raw.to_owned(),
        })
}
