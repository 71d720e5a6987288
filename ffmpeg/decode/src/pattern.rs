/*!
    Synthetic color bar source.
*/

use std::sync::Arc;

use ffmpeg_types::{
    BufferPool, ChromaSiting, ColorInfo, ColorMatrix, ColorRange, Error, FrameBuffer,
    PixelFormat, PlaneLayout, Pts, Rational, Result, VideoStreamInfo,
};

use crate::source::{FrameRecycler, FrameSource, PoolRecycler};

/// 90 kHz, the usual MPEG clock.
const TIME_BASE: Rational = Rational::new(1, 90_000);

/// Row alignment used by FFmpeg's frame allocator.
const DEFAULT_ALIGN: usize = 32;

/// How far the bars move per frame, in pixels.
const SCROLL: u64 = 4;

/// 100% color bars: RGB and BT.601 limited-range YUV.
const BARS: [([u8; 3], [u8; 3]); 8] = [
    ([255, 255, 255], [235, 128, 128]),
    ([255, 255, 0], [210, 16, 146]),
    ([0, 255, 255], [170, 166, 16]),
    ([0, 255, 0], [145, 54, 34]),
    ([255, 0, 255], [106, 202, 222]),
    ([255, 0, 0], [81, 90, 240]),
    ([0, 0, 255], [41, 240, 110]),
    ([0, 0, 0], [16, 128, 128]),
];

/**
    A source that renders vertical color bars scrolling sideways.

    Frames are deterministic: frame `n` of two sources with the same
    settings is byte-identical. Plane rows are padded to the configured
    alignment and the padding is filled with a marker byte, like a real
    decoder that never clears its pool.
*/
pub struct TestPatternSource {
    info: VideoStreamInfo,
    pool: BufferPool,
    /// Timestamp ticks between consecutive frames.
    interval: i64,
    frame_count: Option<u64>,
    next_index: u64,
    align: usize,
}

impl TestPatternSource {
    /**
        Create an endless 30 fps source.
    */
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let color = ColorInfo::new(ColorRange::Limited, ColorMatrix::Bt601, ChromaSiting::Left);
        let info = VideoStreamInfo::new(width, height, format, TIME_BASE)
            .with_frame_rate(Rational::new(30, 1))
            .with_color(color);
        Self {
            info,
            pool: BufferPool::new(8),
            interval: 3000,
            frame_count: None,
            next_index: 0,
            align: DEFAULT_ALIGN,
        }
    }

    /**
        Declare a different frame rate. Timestamps follow the new rate.
    */
    pub fn with_frame_rate(mut self, rate: Rational) -> Self {
        if rate.is_positive() {
            self.interval = i64::from(TIME_BASE.den) * i64::from(rate.den) / i64::from(rate.num);
        }
        self.info.frame_rate = Some(rate);
        self
    }

    /**
        Stop declaring a frame rate; timestamps keep their spacing.
    */
    pub fn without_frame_rate(mut self) -> Self {
        self.info.frame_rate = None;
        self
    }

    /// End the stream after `count` frames.
    pub fn with_frame_count(mut self, count: u64) -> Self {
        self.frame_count = Some(count);
        self.info.duration = Pts(self.interval * count as i64).to_duration(TIME_BASE);
        self
    }

    /// Round plane strides up to a multiple of `align` bytes.
    pub fn with_alignment(mut self, align: usize) -> Self {
        self.align = align.max(1);
        self
    }

    /// Pool that backs every frame this source hands out.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Number of frames produced so far.
    pub fn frames_produced(&self) -> u64 {
        self.next_index
    }

    fn render(&self, index: u64) -> Result<FrameBuffer> {
        let format = self.info.pixel_format;
        let (width, height) = (self.info.width, self.info.height);
        let (planes, len) = PlaneLayout::for_format(format, width, height, self.align);

        let mut data = self.pool.get(len);
        data.fill(0xA5);

        let shift = (index * SCROLL) as usize;
        for (plane, layout) in planes.iter().enumerate() {
            let line = bar_row(format, plane, width, shift)?;
            for y in 0..format.plane_rows(plane, height) {
                let start = layout.offset + y * layout.stride;
                data[start..start + line.len()].copy_from_slice(&line);
            }
        }

        Ok(
            FrameBuffer::new(format, width, height, planes, data)
                .with_pts(Pts(index as i64 * self.interval), TIME_BASE)
                .with_duration_hint(self.interval)
                .with_color(self.info.color),
        )
    }
}

impl FrameSource for TestPatternSource {
    fn metadata(&self) -> &VideoStreamInfo {
        &self.info
    }

    fn acquire(&mut self) -> Result<Option<FrameBuffer>> {
        if self.frame_count.is_some_and(|count| self.next_index >= count) {
            return Ok(None);
        }
        let frame = self.render(self.next_index)?;
        tracing::trace!(index = self.next_index, pts = ?frame.pts, "rendered test pattern");
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn release(&mut self, frame: FrameBuffer) {
        drop(frame);
    }

    fn recycler(&self) -> Option<Arc<dyn FrameRecycler>> {
        Some(Arc::new(PoolRecycler))
    }
}

impl std::fmt::Debug for TestPatternSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestPatternSource")
            .field("info", &self.info)
            .field("next_index", &self.next_index)
            .field("frame_count", &self.frame_count)
            .finish_non_exhaustive()
    }
}

/// Which bar covers luma column `x`.
fn bar(x: usize, width: u32, shift: usize) -> usize {
    let width = width.max(1) as usize;
    ((x + shift) % width) * BARS.len() / width
}

/**
    One row of `plane` without padding. Every row of a plane is the same.
*/
fn bar_row(format: PixelFormat, plane: usize, width: u32, shift: usize) -> Result<Vec<u8>> {
    let w = width as usize;
    let (hs, _) = format.chroma_shift();
    let chroma_w = (w + (1 << hs) - 1) >> hs;
    let rgb = |x: usize| BARS[bar(x, width, shift)].0;
    let yuv = |x: usize, c: usize| BARS[bar(x, width, shift)].1[c];

    let row: Vec<u8> = match format {
        PixelFormat::Rgba => (0..w).flat_map(|x| opaque(rgb(x))).collect(),
        PixelFormat::Bgra => (0..w).flat_map(|x| opaque(swap(rgb(x)))).collect(),
        PixelFormat::Rgb24 => (0..w).flat_map(rgb).collect(),
        PixelFormat::Bgr24 => (0..w).flat_map(|x| swap(rgb(x))).collect(),

        PixelFormat::Yuv420p | PixelFormat::Yuv422p | PixelFormat::Yuv444p => match plane {
            0 => (0..w).map(|x| yuv(x, 0)).collect(),
            _ => (0..chroma_w).map(|cx| yuv(cx << hs, plane)).collect(),
        },
        PixelFormat::Nv12 => match plane {
            0 => (0..w).map(|x| yuv(x, 0)).collect(),
            _ => (0..chroma_w).flat_map(|cx| [yuv(cx << hs, 1), yuv(cx << hs, 2)]).collect(),
        },

        PixelFormat::Yuv420p10 => match plane {
            0 => (0..w).flat_map(|x| ten_bit(yuv(x, 0), 0)).collect(),
            _ => (0..chroma_w).flat_map(|cx| ten_bit(yuv(cx << hs, plane), 0)).collect(),
        },
        PixelFormat::P010le => match plane {
            0 => (0..w).flat_map(|x| ten_bit(yuv(x, 0), 6)).collect(),
            _ => (0..chroma_w)
                .flat_map(|cx| {
                    let [u0, u1] = ten_bit(yuv(cx << hs, 1), 6);
                    let [v0, v1] = ten_bit(yuv(cx << hs, 2), 6);
                    [u0, u1, v0, v1]
                })
                .collect(),
        },

        _ => {
            return Err(Error::unsupported_format(format!(
                "no test pattern for {format:?}"
            )));
        }
    };
    Ok(row)
}

fn swap([r, g, b]: [u8; 3]) -> [u8; 3] {
    [b, g, r]
}

fn opaque([r, g, b]: [u8; 3]) -> [u8; 4] {
    [r, g, b, 255]
}

/// Widen an 8-bit sample to 10 bits, stored little-endian with `msb_shift`.
fn ten_bit(value: u8, msb_shift: u32) -> [u8; 2] {
    ((u16::from(value) << 2) << msb_shift).to_le_bytes()
}
