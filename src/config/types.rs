use serde::{Deserialize, Serialize};
use streamcopy_av::pipeline::PROGRESS_INTERVAL;
use streamcopy_av::{PlaylistType, RemuxOptions, SegmentOptions, SegmentType};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub remux: RemuxConfig,

    #[serde(default)]
    pub segment: SegmentConfig,
}

impl Config {
    /// Pipeline options described by this configuration.
    pub fn remux_options(&self) -> RemuxOptions {
        RemuxOptions {
            progress_interval: self.remux.progress_interval,
            segment: SegmentOptions {
                segment_type: self.segment.segment_type,
                playlist_type: self.segment.playlist_type,
                init_filename: self.segment.init_filename.clone(),
                segment_duration: self.segment.segment_duration_secs,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, used when RUST_LOG is not set
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RemuxConfig {
    /// Packets written between two progress reports during extraction
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
}

fn default_progress_interval() -> u64 {
    PROGRESS_INTERVAL
}

impl Default for RemuxConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SegmentConfig {
    #[serde(default)]
    pub segment_type: SegmentType,

    #[serde(default)]
    pub playlist_type: PlaylistType,

    /// Target segment length (`hls_time`); muxer default when unset
    #[serde(default)]
    pub segment_duration_secs: Option<f64>,

    /// Init segment name for fMP4 output (default: init.mp4)
    #[serde(default)]
    pub init_filename: Option<String>,
}
