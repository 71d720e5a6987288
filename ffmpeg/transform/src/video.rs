/*!
    Video frame conversion.
*/

use ffmpeg_types::{ColorInfo, ColorRange, Error, FrameBuffer, PixelFormat, Result, VideoFrame};

use crate::colorspace::YuvMatrix;
use crate::planes::{copy_planes, is_readable, is_writable, pack, unpack, validate};
use crate::scale::scale;

/**
    Scaling algorithm for video resizing.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScalingAlgorithm {
    /// Nearest neighbor - fastest, lowest quality.
    Nearest,
    /// Bilinear interpolation - fast, acceptable quality.
    #[default]
    Bilinear,
}

/**
    Configuration for frame conversion.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertConfig {
    /// Target pixel format.
    pub format: PixelFormat,
    /// Target size in pixels; `None` keeps the source size.
    pub size: Option<(u32, u32)>,
    /// Scaling algorithm to use when the size changes.
    pub algorithm: ScalingAlgorithm,
    /// Quantization range for YUV targets; `None` keeps the source range.
    pub color_range: Option<ColorRange>,
}

impl ConvertConfig {
    /**
        Create a new conversion configuration that keeps the source size.
    */
    pub fn new(format: PixelFormat) -> Self {
        Self {
            format,
            size: None,
            algorithm: ScalingAlgorithm::default(),
            color_range: None,
        }
    }

    /**
        Create configuration for BGRA output (common for display).
    */
    pub fn to_bgra() -> Self {
        Self::new(PixelFormat::Bgra)
    }

    /**
        Create configuration for RGBA output.
    */
    pub fn to_rgba() -> Self {
        Self::new(PixelFormat::Rgba)
    }

    /**
        Scale output frames to the given size.
    */
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /**
        Set the scaling algorithm.
    */
    pub fn with_algorithm(mut self, algorithm: ScalingAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /**
        Set the quantization range written for YUV targets.
    */
    pub fn with_color_range(mut self, range: ColorRange) -> Self {
        self.color_range = Some(range);
        self
    }
}

/**
    Frame converter.

    Converts decoder frames to the target format, handling:
    - Geometry validation (plane count, stride, buffer length)
    - Pixel format conversion (YUV → RGB, RGB → YUV, channel order)
    - Scaling to different dimensions
    - Stride normalization (output planes are always tightly packed)

    The converter only borrows the source frame; the returned frame owns all
    of its data and never refers back to decoder memory.

    Colorspace coefficients are computed lazily on first use and
    recomputed if the source color description changes.
*/
pub struct FrameConverter {
    config: ConvertConfig,
    /// Cached coefficients and the color description they were built for.
    matrix_state: Option<MatrixState>,
}

struct MatrixState {
    color: ColorInfo,
    output_range: ColorRange,
    input: YuvMatrix,
    output: YuvMatrix,
}

impl FrameConverter {
    /**
        Create a new converter with the given configuration.

        Fails with `UnsupportedFormat` if no conversion can produce the
        target format or the target size is empty.
    */
    pub fn new(config: ConvertConfig) -> Result<Self> {
        if !is_writable(config.format) {
            return Err(Error::unsupported_format(format!(
                "pixel format {:?} not supported for output",
                config.format
            )));
        }
        if let Some((width, height)) = config.size {
            if width == 0 || height == 0 {
                return Err(Error::unsupported_format(format!(
                    "output size {width}x{height} is empty"
                )));
            }
        }

        Ok(Self {
            config,
            matrix_state: None,
        })
    }

    /**
        Returns true if frames in `source` format can be converted to
        `target` format.
    */
    pub fn supports(source: PixelFormat, target: PixelFormat) -> bool {
        source == target || (is_readable(source) && is_writable(target))
    }

    /**
        Get the target configuration.
    */
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /**
        Convert a frame to the target format.

        Frames that already match the target format and size are copied
        plane by plane without touching pixel values. Everything else goes
        through an RGBA raster: unpack, optionally scale, pack.
    */
    #[tracing::instrument(
        level = "trace",
        skip_all,
        fields(format = ?frame.format, width = frame.width, height = frame.height)
    )]
    pub fn convert(&mut self, frame: &FrameBuffer) -> Result<VideoFrame> {
        validate(frame)?;

        let (width, height) = self.config.size.unwrap_or((frame.width, frame.height));
        let resize = (width, height) != (frame.width, frame.height);
        let target = self.config.format;

        if frame.format == target && !resize {
            return Ok(VideoFrame::new(
                copy_planes(frame),
                width,
                height,
                target,
                frame.pts,
                frame.time_base,
            )
            .with_color(frame.color));
        }

        if !Self::supports(frame.format, target) {
            return Err(Error::unsupported_format(format!(
                "no conversion from {:?} to {:?}",
                frame.format, target
            )));
        }

        let state = self.matrix_state(frame.color);
        let (input, output, out_color) = (state.input, state.output, state.color);
        let out_color = out_color.with_range(output.range());

        let raster = unpack(frame, &input)?;
        let raster = if resize {
            scale(
                &raster,
                frame.width as usize,
                frame.height as usize,
                width as usize,
                height as usize,
                self.config.algorithm,
            )
        } else {
            raster
        };
        let data = pack(&raster, width, height, target, &output)?;

        Ok(VideoFrame::new(data, width, height, target, frame.pts, frame.time_base)
            .with_color(out_color))
    }

    /**
        Coefficients for the given source color description, rebuilt only
        when it differs from the cached one.
    */
    fn matrix_state(&mut self, color: ColorInfo) -> &MatrixState {
        let output_range = self.config.color_range.unwrap_or(color.range);
        let stale = self
            .matrix_state
            .as_ref()
            .is_none_or(|state| state.color != color || state.output_range != output_range);

        if stale {
            tracing::debug!(?color, ?output_range, "building colorspace coefficients");
        }

        let state = match self.matrix_state.take() {
            Some(state) if !stale => state,
            _ => MatrixState {
                color,
                output_range,
                input: YuvMatrix::new(color.matrix, color.range),
                output: YuvMatrix::new(color.matrix, output_range),
            },
        };
        self.matrix_state.insert(state)
    }
}

impl std::fmt::Debug for FrameConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameConverter")
            .field("config", &self.config)
            .field("initialized", &self.matrix_state.is_some())
            .finish()
    }
}
