/*!
    File-backed frame source using FFmpeg's demuxers and decoders.
*/

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_next::{
    codec::{self, decoder::Video as VideoDecoderFFmpeg},
    ffi,
    format::context::Input as InputContext,
    media::Type,
    util::color,
    util::frame::video::Video as VideoFrameFFmpeg,
};

use ffmpeg_types::{
    BufferPool, ChromaSiting, ColorInfo, ColorMatrix, ColorRange, Error, FrameBuffer,
    PixelFormat, PlaneLayout, Pts, Rational, Result, VideoStreamInfo,
};

use crate::source::{FrameRecycler, FrameSource, PoolRecycler};

/**
    Decodes the best video stream of a media file.

    Decoded frames are copied into pooled buffers with the decoder's native
    strides, so the FFmpeg frame can be reused for the next decode right
    away while the copy travels downstream.
*/
pub struct FfmpegSource {
    input: InputContext,
    decoder: VideoDecoderFFmpeg,
    stream_index: usize,
    info: VideoStreamInfo,
    pool: BufferPool,
    decoded: VideoFrameFFmpeg,
    eof_sent: bool,
}

impl FfmpegSource {
    /**
        Open a media file and prepare a decoder for its best video stream.
    */
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        ffmpeg_next::init().map_err(|e| Error::decode(e.to_string()))?;

        let input = ffmpeg_next::format::input(&path).map_err(|e| Error::decode(e.to_string()))?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or_else(|| Error::unsupported_format("no video stream"))?;
        let stream_index = stream.index();
        let time_base = rational_from_ffmpeg(stream.time_base());

        let frame_rate = if stream.avg_frame_rate().numerator() != 0 {
            Some(rational_from_ffmpeg(stream.avg_frame_rate()))
        } else if stream.rate().numerator() != 0 {
            Some(rational_from_ffmpeg(stream.rate()))
        } else {
            None
        };

        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .and_then(|ctx| ctx.decoder().video())
            .map_err(|e| Error::decode(e.to_string()))?;

        let pixel_format = pixel_format_from_ffmpeg(decoder.format()).ok_or_else(|| {
            Error::unsupported_format(format!("unsupported pixel format: {:?}", decoder.format()))
        })?;

        let color = color_from_ffmpeg(
            decoder.color_range(),
            decoder.color_space(),
            decoder.chroma_location(),
            decoder.height(),
        );

        let mut info =
            VideoStreamInfo::new(decoder.width(), decoder.height(), pixel_format, time_base)
                .with_color(color);
        info.frame_rate = frame_rate;
        if input.duration() > 0 {
            info.duration = Some(Duration::from_micros(input.duration() as u64));
        }

        tracing::info!(
            width = info.width,
            height = info.height,
            format = ?info.pixel_format,
            fps = ?info.fps(),
            "opened video stream"
        );

        Ok(Self {
            input,
            decoder,
            stream_index,
            info,
            pool: BufferPool::new(8),
            decoded: VideoFrameFFmpeg::empty(),
            eof_sent: false,
        })
    }

    /// Pool that backs every frame this source hands out.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /**
        Feed the decoder one more packet of our stream, or EOF once the
        input is exhausted.
    */
    fn feed(&mut self) -> Result<()> {
        let mut packet = ffmpeg_next::Packet::empty();
        loop {
            match packet.read(&mut self.input) {
                Ok(()) if packet.stream() != self.stream_index => continue,
                Ok(()) => {
                    return self
                        .decoder
                        .send_packet(&packet)
                        .map_err(|e| Error::decode(e.to_string()));
                }
                Err(ffmpeg_next::Error::Eof) => {
                    self.eof_sent = true;
                    return match self.decoder.send_eof() {
                        Ok(()) | Err(ffmpeg_next::Error::Eof) => Ok(()),
                        Err(e) => Err(Error::decode(e.to_string())),
                    };
                }
                Err(e) => return Err(Error::decode(e.to_string())),
            }
        }
    }

    /**
        Copy the current decoded frame into a pooled buffer.
    */
    fn copy_decoded(&self) -> Result<FrameBuffer> {
        let frame = &self.decoded;
        let format = pixel_format_from_ffmpeg(frame.format()).ok_or_else(|| {
            Error::unsupported_format(format!("unsupported pixel format: {:?}", frame.format()))
        })?;
        let (width, height) = (frame.width(), frame.height());

        let mut planes = Vec::with_capacity(format.plane_count());
        let mut offset = 0;
        for plane in 0..format.plane_count() {
            let stride = frame.stride(plane);
            planes.push(PlaneLayout::new(offset, stride));
            offset += stride * format.plane_rows(plane, height);
        }

        let mut data = self.pool.get(offset);
        for (plane, layout) in planes.iter().enumerate() {
            let src = frame.data(plane);
            let len = (layout.stride * format.plane_rows(plane, height)).min(src.len());
            data[layout.offset..layout.offset + len].copy_from_slice(&src[..len]);
        }

        let color = color_from_ffmpeg(
            frame.color_range(),
            frame.color_space(),
            frame.chroma_location(),
            height,
        );

        let mut buffer = FrameBuffer::new(format, width, height, planes, data).with_color(color);
        buffer.pts = frame.timestamp().or_else(|| frame.pts()).map(Pts);
        buffer.time_base = self.info.time_base;
        if let Some(ticks) = duration_hint(frame.packet().duration) {
            buffer = buffer.with_duration_hint(ticks);
        }
        Ok(buffer)
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &VideoStreamInfo {
        &self.info
    }

    fn acquire(&mut self) -> Result<Option<FrameBuffer>> {
        loop {
            match self.decoder.receive_frame(&mut self.decoded) {
                Ok(()) => return self.copy_decoded().map(Some),
                Err(ffmpeg_next::Error::Other { errno }) if errno == ffi::EAGAIN => {
                    if self.eof_sent {
                        return Ok(None);
                    }
                    self.feed()?;
                }
                Err(ffmpeg_next::Error::Eof) => return Ok(None),
                Err(e) => return Err(Error::decode(e.to_string())),
            }
        }
    }

    fn release(&mut self, frame: FrameBuffer) {
        drop(frame);
    }

    fn recycler(&self) -> Option<Arc<dyn FrameRecycler>> {
        Some(Arc::new(PoolRecycler))
    }
}

impl std::fmt::Debug for FfmpegSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfmpegSource")
            .field("stream_index", &self.stream_index)
            .field("info", &self.info)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// FFmpeg reports 0 (or a negative value) when the packet duration is unknown.
fn duration_hint(ticks: i64) -> Option<i64> {
    (ticks > 0).then_some(ticks)
}

fn rational_from_ffmpeg(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

fn pixel_format_from_ffmpeg(format: ffmpeg_next::format::Pixel) -> Option<PixelFormat> {
    use ffmpeg_next::format::Pixel;

    match format {
        Pixel::YUV420P | Pixel::YUVJ420P => Some(PixelFormat::Yuv420p),
        Pixel::YUV422P | Pixel::YUVJ422P => Some(PixelFormat::Yuv422p),
        Pixel::YUV444P | Pixel::YUVJ444P => Some(PixelFormat::Yuv444p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::BGR24 => Some(PixelFormat::Bgr24),
        Pixel::YUV420P10LE => Some(PixelFormat::Yuv420p10),
        Pixel::P010LE => Some(PixelFormat::P010le),
        _ => None,
    }
}

/**
    Map FFmpeg's color tags, falling back to the usual defaults for the
    frame height when a tag is unspecified.
*/
fn color_from_ffmpeg(
    range: color::Range,
    space: color::Space,
    location: ffmpeg_next::util::chroma::Location,
    height: u32,
) -> ColorInfo {
    use ffmpeg_next::util::chroma::Location;

    let range = match range {
        color::Range::JPEG => ColorRange::Full,
        _ => ColorRange::Limited,
    };
    let matrix = match space {
        color::Space::BT709 => ColorMatrix::Bt709,
        color::Space::BT470BG | color::Space::SMPTE170M => ColorMatrix::Bt601,
        _ => ColorMatrix::for_height(height),
    };
    let siting = match location {
        Location::Center => ChromaSiting::Center,
        _ => ChromaSiting::Left,
    };
    ColorInfo::new(range, matrix, siting)
}
