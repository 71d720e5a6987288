/*!
    Decoded frame types.

    [`FrameBuffer`] is what a decoder hands out: plane data in the decoder's
    native layout, possibly padded and possibly pooled. [`VideoFrame`] is a
    tightly packed, self-owned frame produced by conversion.
*/

use std::time::Duration;

use crate::{ColorInfo, PixelFormat, PooledBuffer, Pts, Rational};

/// Default MPEG time base used when a frame carries none.
const DEFAULT_TIME_BASE: Rational = Rational::new(1, 90000);

/**
    Location of one plane inside a frame's data.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Byte offset of the first row.
    pub offset: usize,
    /// Distance in bytes between the starts of consecutive rows.
    pub stride: usize,
}

impl PlaneLayout {
    pub const fn new(offset: usize, stride: usize) -> Self {
        Self { offset, stride }
    }

    /**
        Lay out all planes of `format` back to back, with each stride
        rounded up to a multiple of `align` bytes.

        Returns the layouts and the total number of bytes needed.
    */
    pub fn for_format(
        format: PixelFormat,
        width: u32,
        height: u32,
        align: usize,
    ) -> (Vec<PlaneLayout>, usize) {
        let align = align.max(1);
        let mut offset = 0;
        let planes = (0..format.plane_count())
            .map(|plane| {
                let row_bytes = format.plane_row_bytes(plane, width);
                let stride = row_bytes.div_ceil(align) * align;
                let layout = PlaneLayout::new(offset, stride);
                offset += stride * format.plane_rows(plane, height);
                layout
            })
            .collect();
        (planes, offset)
    }

    /// Tightly packed layout without row padding.
    pub fn tight(format: PixelFormat, width: u32, height: u32) -> Vec<PlaneLayout> {
        Self::for_format(format, width, height, 1).0
    }
}

/**
    One decoded frame as produced by a decoder.

    The plane data belongs to the decoder (typically its buffer pool) until
    the frame is released. Consumers only ever borrow it; anything that must
    outlive the release has to be copied out.

    Geometry is not validated on construction: a decoder may hand out
    malformed frames and the converter is responsible for rejecting them.
*/
pub struct FrameBuffer {
    /// Pixel format of the planes.
    pub format: PixelFormat,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Per-plane offset and stride.
    pub planes: Vec<PlaneLayout>,
    /// Presentation timestamp, if the decoder provided one.
    pub pts: Option<Pts>,
    /// Time base for `pts` and `duration_hint`.
    pub time_base: Rational,
    /// Decoder-reported packet duration in time base units.
    pub duration_hint: Option<i64>,
    /// Color description of the samples.
    pub color: ColorInfo,
    data: PooledBuffer,
}

impl FrameBuffer {
    /**
        Create a frame from raw plane data and explicit plane layouts.
    */
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: Vec<PlaneLayout>,
        data: impl Into<PooledBuffer>,
    ) -> Self {
        Self {
            format,
            width,
            height,
            planes,
            pts: None,
            time_base: DEFAULT_TIME_BASE,
            duration_hint: None,
            color: ColorInfo::for_height(height),
            data: data.into(),
        }
    }

    /**
        Create a frame whose planes are packed back to back without padding.
    */
    pub fn packed(
        format: PixelFormat,
        width: u32,
        height: u32,
        data: impl Into<PooledBuffer>,
    ) -> Self {
        let planes = PlaneLayout::tight(format, width, height);
        Self::new(format, width, height, planes, data)
    }

    pub fn with_pts(mut self, pts: Pts, time_base: Rational) -> Self {
        self.pts = Some(pts);
        self.time_base = time_base;
        self
    }

    pub fn with_duration_hint(mut self, ticks: i64) -> Self {
        self.duration_hint = Some(ticks);
        self
    }

    pub fn with_color(mut self, color: ColorInfo) -> Self {
        self.color = color;
        self
    }

    /// All plane data, including padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /**
        Bytes of plane `index`, from its first row to the end of its last
        row (clipped to the available data).
    */
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let layout = self.planes.get(index)?;
        let rows = self.format.plane_rows(index, self.height);
        let end = layout
            .offset
            .saturating_add(layout.stride.saturating_mul(rows))
            .min(self.data.len());
        self.data.get(layout.offset..end)
    }

    /// Stride of plane `index`, or 0 if the plane does not exist.
    pub fn stride(&self, index: usize) -> usize {
        self.planes.get(index).map_or(0, |p| p.stride)
    }

    /**
        Presentation time since stream start, if known.
    */
    pub fn presentation_time(&self) -> Option<Duration> {
        self.pts?.to_duration(self.time_base)
    }

    /**
        Decoder-reported packet duration as wall time, if known and positive.
    */
    pub fn packet_duration(&self) -> Option<Duration> {
        let ticks = self.duration_hint.filter(|&t| t > 0)?;
        Pts(ticks).to_duration(self.time_base)
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("planes", &self.planes)
            .field("pts", &self.pts)
            .field("time_base", &self.time_base)
            .finish_non_exhaustive()
    }
}

/**
    A converted frame with tightly packed planes.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFrame {
    /// Plane data, packed back to back without padding.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format of `data`.
    pub format: PixelFormat,
    /// Presentation timestamp copied from the source frame.
    pub pts: Option<Pts>,
    /// Time base for `pts`.
    pub time_base: Rational,
    /// Color description of the samples (meaningful for YUV formats).
    pub color: ColorInfo,
}

impl VideoFrame {
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        pts: Option<Pts>,
        time_base: Rational,
    ) -> Self {
        Self {
            data,
            width,
            height,
            format,
            pts,
            time_base,
            color: ColorInfo::for_height(height),
        }
    }

    pub fn with_color(mut self, color: ColorInfo) -> Self {
        self.color = color;
        self
    }

    /**
        Presentation time since stream start, if known.
    */
    pub fn presentation_time(&self) -> Option<Duration> {
        self.pts?.to_duration(self.time_base)
    }

    /**
        Bytes of plane `index`.
    */
    pub fn plane(&self, index: usize) -> Option<&[u8]> {
        let layouts = PlaneLayout::tight(self.format, self.width, self.height);
        let layout = layouts.get(index)?;
        let len = layout.stride * self.format.plane_rows(index, self.height);
        self.data.get(layout.offset..layout.offset + len)
    }
}

impl From<VideoFrame> for FrameBuffer {
    fn from(frame: VideoFrame) -> Self {
        let mut buffer = FrameBuffer::packed(frame.format, frame.width, frame.height, frame.data)
            .with_color(frame.color);
        buffer.pts = frame.pts;
        buffer.time_base = frame.time_base;
        buffer
    }
}
