/*!
    Pipeline configuration.
*/

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ffmpeg_transform::{ConvertConfig, DurationPolicy, ScalingAlgorithm};
use ffmpeg_types::{PixelFormat, Rational};

const DEFAULT_FRAME_DURATION: Duration = Duration::from_millis(40);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/**
    Size images are scaled to.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSize {
    pub width: u32,
    pub height: u32,
}

/**
    Settings for a [`FramePipeline`](crate::FramePipeline).

    Every field has a default, so a config file only needs the fields it
    changes:

    ```json
    { "output_format": "bgra", "output_size": { "width": 1280, "height": 720 } }
    ```
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Byte order of the output images; `rgba` or `bgra`.
    pub output_format: PixelFormat,
    /// Scale images to this size instead of the source size.
    pub output_size: Option<OutputSize>,
    /// Scaling algorithm used with `output_size`.
    pub scaling: ScalingAlgorithm,
    /// On-screen duration in seconds when neither the frame rate nor the
    /// next timestamp is known.
    pub default_frame_duration: f64,
    /// Hold each frame until the next one arrives when the stream has no
    /// declared frame rate, so its duration can come from the timestamps.
    pub lookahead: bool,
    /// Capacity of the queue between the source and the converter.
    pub source_queue_capacity: usize,
    /// Capacity of the queue between the converter and the consumer.
    pub output_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_format: PixelFormat::Rgba,
            output_size: None,
            scaling: ScalingAlgorithm::default(),
            default_frame_duration: DEFAULT_FRAME_DURATION.as_secs_f64(),
            lookahead: true,
            source_queue_capacity: 4,
            output_queue_capacity: 8,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.output_format.is_displayable() {
            return Err(ConfigError::Invalid(format!(
                "output_format must be rgba or bgra, got {:?}",
                self.output_format
            )));
        }
        if let Some(size) = self.output_size {
            if size.width == 0 || size.height == 0 {
                return Err(ConfigError::Invalid(format!(
                    "output_size {}x{} is empty",
                    size.width, size.height
                )));
            }
        }
        if Duration::try_from_secs_f64(self.default_frame_duration).is_err() {
            return Err(ConfigError::Invalid(format!(
                "default_frame_duration {} is not a valid duration",
                self.default_frame_duration
            )));
        }
        if self.source_queue_capacity == 0 || self.output_queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue capacities must be at least 1".into()));
        }
        Ok(())
    }

    /// The fallback duration, or 40 ms if the configured value is unusable.
    pub fn default_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.default_frame_duration).unwrap_or(DEFAULT_FRAME_DURATION)
    }

    pub fn convert_config(&self) -> ConvertConfig {
        let config = ConvertConfig::new(self.output_format).with_algorithm(self.scaling);
        match self.output_size {
            Some(size) => config.with_size(size.width, size.height),
            None => config,
        }
    }

    pub fn duration_policy(&self, frame_rate: Option<Rational>) -> DurationPolicy {
        DurationPolicy::new(frame_rate, self.default_duration()).with_lookahead(self.lookahead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.default_duration(), Duration::from_millis(40));
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config = PipelineConfig::from_json_str(
            r#"{
                "output_format": "bgra",
                "output_size": { "width": 640, "height": 360 },
                "scaling": "nearest",
                "lookahead": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.output_format, PixelFormat::Bgra);
        assert_eq!(config.scaling, ScalingAlgorithm::Nearest);
        assert!(!config.lookahead);

        let convert = config.convert_config();
        assert_eq!(convert.size, Some((640, 360)));
        assert_eq!(convert.format, PixelFormat::Bgra);
    }

    #[test]
    fn rejects_non_display_format() {
        let err = PipelineConfig::from_json_str(r#"{ "output_format": "yuv420p" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_duration() {
        let err =
            PipelineConfig::from_json_str(r#"{ "default_frame_duration": -1.0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_capacity() {
        let config = PipelineConfig {
            output_queue_capacity: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = PipelineConfig::from_json_str("{ output_format: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pipeline.json");
        let config = PipelineConfig {
            output_format: PixelFormat::Bgra,
            default_frame_duration: 0.02,
            ..PipelineConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(PipelineConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn duration_policy_uses_frame_rate() {
        let policy = PipelineConfig::default().duration_policy(Some(Rational::new(25, 1)));
        assert_eq!(policy.frame_period(), Some(Duration::from_millis(40)));
        assert!(!policy.needs_lookahead());
    }
}
