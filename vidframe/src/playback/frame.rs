use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;

use ffmpeg_transform::DurationSource;
use ffmpeg_types::PixelFormat;

/**
    One converted frame, ready to be drawn.

    The image is owned by the frame (never by the decoder) and shared by
    reference, so clones are cheap. When the pipeline outputs BGRA, the
    image buffer holds BGRA bytes despite its type name.
*/
#[derive(Clone)]
pub struct PresentationFrame {
    image: Arc<RgbaImage>,
    format: PixelFormat,
    pts: Duration,
    duration: Duration,
    duration_source: DurationSource,
    packet_duration: Option<Duration>,
    sequence: u64,
}

impl PresentationFrame {
    pub(crate) fn new(
        image: RgbaImage,
        format: PixelFormat,
        pts: Duration,
        duration: Duration,
        duration_source: DurationSource,
        packet_duration: Option<Duration>,
        sequence: u64,
    ) -> Self {
        Self {
            image: Arc::new(image),
            format,
            pts,
            duration,
            duration_source,
            packet_duration,
            sequence,
        }
    }

    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Byte order of the image: `Rgba` or `Bgra`.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Presentation time since stream start.
    pub fn pts(&self) -> Duration {
        self.pts
    }

    /// How long the frame stays on screen.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }

    /// Which timing rule produced [`duration`](Self::duration).
    pub fn duration_source(&self) -> DurationSource {
        self.duration_source
    }

    /**
        Packet duration reported by the decoder, if any. Informational only;
        it does not affect the on-screen duration.
    */
    pub fn packet_duration(&self) -> Option<Duration> {
        self.packet_duration
    }

    /// Position of the frame in decode order, starting at 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Time at which the next frame should replace this one.
    pub fn end(&self) -> Duration {
        self.pts.saturating_add(self.duration)
    }
}

impl std::fmt::Debug for PresentationFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentationFrame")
            .field("sequence", &self.sequence)
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format)
            .field("pts", &self.pts)
            .field("duration", &self.duration)
            .field("duration_source", &self.duration_source)
            .finish_non_exhaustive()
    }
}
