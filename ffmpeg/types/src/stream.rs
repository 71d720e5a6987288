/*!
    Stream information types.
*/

use std::time::Duration;

use crate::{ColorInfo, PixelFormat, Rational};

/**
    Information about a video stream, queried once when the stream opens.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct VideoStreamInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub pixel_format: PixelFormat,
    /// Declared frame rate (may be unavailable for variable-rate streams).
    pub frame_rate: Option<Rational>,
    /// Time base for timestamps.
    pub time_base: Rational,
    /// Color description declared by the container or codec.
    pub color: ColorInfo,
    /// Total duration (may be unavailable for some streams).
    pub duration: Option<Duration>,
}

impl VideoStreamInfo {
    /**
        Create stream info with no declared frame rate or duration and
        default color description for the frame height.
    */
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat, time_base: Rational) -> Self {
        Self {
            width,
            height,
            pixel_format,
            frame_rate: None,
            time_base,
            color: ColorInfo::for_height(height),
            duration: None,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: Rational) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    pub fn with_color(mut self, color: ColorInfo) -> Self {
        self.color = color;
        self
    }

    /**
        Returns the aspect ratio as a float.
    */
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /**
        Returns the frame rate as fps, if available.
    */
    pub fn fps(&self) -> Option<f64> {
        self.frame_rate.filter(|r| r.is_positive()).map(|r| r.to_f64())
    }

    /**
        Returns the nominal frame period, if the frame rate is declared.
    */
    pub fn frame_period(&self) -> Option<Duration> {
        self.frame_rate?.invert().to_duration()
    }
}
