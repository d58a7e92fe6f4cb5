mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Locations searched, in order, when no config file is given.
pub const DEFAULT_PATHS: [&str; 4] = [
    "./streamcopy.toml",
    "./config.toml",
    "~/.config/streamcopy/config.toml",
    "/etc/streamcopy/config.toml",
];

/// A configuration value outside its allowed range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid {field}: {reason}")]
pub struct ConfigError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)
        .with_context(|| format!("Invalid config file: {:?}", path))?;

    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_config() {
        Some(path) => load_config(&path),
        None => Ok(Config::default()),
    }
}

/// First existing file among [`DEFAULT_PATHS`].
pub fn find_config() -> Option<PathBuf> {
    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.exists())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> std::result::Result<(), ConfigError> {
    if config.remux.progress_interval == 0 {
        return Err(ConfigError::new(
            "remux.progress_interval",
            "must be greater than 0",
        ));
    }

    if let Some(secs) = config.segment.segment_duration_secs {
        if !(secs.is_finite() && secs > 0.0) {
            return Err(ConfigError::new(
                "segment.segment_duration_secs",
                format!("must be a positive number of seconds, got {}", secs),
            ));
        }
    }

    if let Some(ref name) = config.segment.init_filename {
        if name.trim().is_empty() {
            return Err(ConfigError::new(
                "segment.init_filename",
                "must not be empty",
            ));
        }
        if config.segment.segment_type == streamcopy_av::SegmentType::MpegTs {
            tracing::warn!("segment.init_filename is ignored for mpegts segments");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_progress_interval_rejected() {
        let mut config = Config::default();
        config.remux.progress_interval = 0;
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.field, "remux.progress_interval");
    }

    #[test]
    fn test_segment_duration_must_be_positive() {
        let mut config = Config::default();
        for secs in [0.0, -2.0, f64::NAN] {
            config.segment.segment_duration_secs = Some(secs);
            assert!(validate_config(&config).is_err(), "{}", secs);
        }
        config.segment.segment_duration_secs = Some(4.0);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_remux_options_from_config() {
        let config: Config = toml::from_str(
            r#"
[remux]
progress_interval = 25

[segment]
segment_type = "mpegts"
playlist_type = "event"
segment_duration_secs = 6.0
"#,
        )
        .unwrap();

        let options = config.remux_options();
        assert_eq!(options.progress_interval, 25);
        assert_eq!(options.segment.segment_type, streamcopy_av::SegmentType::MpegTs);
        assert_eq!(options.segment.playlist_type, streamcopy_av::PlaylistType::Event);
        assert_eq!(options.segment.segment_duration, Some(6.0));
        assert_eq!(options.segment.init_filename, None);
    }

    #[test]
    fn test_default_config_matches_library_defaults() {
        assert_eq!(
            Config::default().remux_options(),
            streamcopy_av::RemuxOptions::default()
        );
    }
}
