use std::time::Duration;

use image::RgbaImage;

use ffmpeg_transform::{DurationPolicy, FrameConverter};
use ffmpeg_types::{Error, FrameBuffer, PixelFormat, Result};

use super::frame::PresentationFrame;

/// A converted frame whose duration is not resolved yet.
struct Pending {
    image: RgbaImage,
    pts: Duration,
    packet_duration: Option<Duration>,
    sequence: u64,
}

/**
    Conversion and timing for a stream of frames in decode order.

    Each pushed buffer is converted right away (so it can be released) and
    gets a monotonically non-decreasing timestamp. In look-ahead mode a
    converted frame waits here until the next timestamp is known.
*/
pub(crate) struct FrameStage {
    converter: FrameConverter,
    policy: DurationPolicy,
    format: PixelFormat,
    pending: Option<Pending>,
    last_pts: Option<Duration>,
    last_duration: Duration,
    next_sequence: u64,
}

impl FrameStage {
    pub fn new(converter: FrameConverter, policy: DurationPolicy) -> Self {
        let format = converter.config().format;
        Self {
            converter,
            policy,
            format,
            pending: None,
            last_pts: None,
            last_duration: Duration::ZERO,
            next_sequence: 0,
        }
    }

    /**
        Convert one buffer. Returns the frame that became ready, if any.

        A malformed buffer is rejected with `InvalidFrame` and leaves the
        timing state untouched, so the following frames keep their
        timestamps.
    */
    pub fn push(&mut self, buffer: &FrameBuffer) -> Result<Option<PresentationFrame>> {
        let converted = self.converter.convert(buffer)?;
        let (width, height) = (converted.width, converted.height);
        let image = RgbaImage::from_raw(width, height, converted.data).ok_or_else(|| {
            Error::invalid_frame(format!("converted {width}x{height} image has the wrong size"))
        })?;

        let raw_pts = buffer.presentation_time();
        let lookahead = self.policy.needs_lookahead();

        let mut ready = None;
        if lookahead && raw_pts.is_none() {
            // the synthesized timestamp depends on the previous duration
            ready = self.pending.take().map(|p| self.finish(p, None));
        }

        let pts = self.timestamp(raw_pts);
        let frame = Pending {
            image,
            pts,
            packet_duration: buffer.packet_duration(),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        if !lookahead {
            return Ok(Some(self.finish(frame, None)));
        }

        if ready.is_none() {
            ready = self.pending.take().map(|p| self.finish(p, Some(pts)));
        }
        self.pending = Some(frame);
        Ok(ready)
    }

    /// Resolve the frame still waiting for a successor.
    pub fn flush(&mut self) -> Option<PresentationFrame> {
        self.pending.take().map(|p| self.finish(p, None))
    }

    /**
        Clamp timestamps that go backwards and fill in missing ones.
    */
    fn timestamp(&mut self, raw: Option<Duration>) -> Duration {
        let pts = match (raw, self.last_pts) {
            (Some(pts), Some(last)) if pts < last => {
                tracing::warn!(?pts, ?last, "timestamp went backwards, clamping");
                last
            }
            (Some(pts), _) => pts,
            (None, Some(last)) => last.saturating_add(self.last_duration),
            (None, None) => Duration::ZERO,
        };
        self.last_pts = Some(pts);
        pts
    }

    fn finish(&mut self, pending: Pending, next_pts: Option<Duration>) -> PresentationFrame {
        let (duration, source) = self.policy.resolve(Some(pending.pts), next_pts);
        self.last_duration = duration;
        PresentationFrame::new(
            pending.image,
            self.format,
            pending.pts,
            duration,
            source,
            pending.packet_duration,
            pending.sequence,
        )
    }
}
