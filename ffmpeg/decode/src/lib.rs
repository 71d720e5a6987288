/*!
    Frame sources for the ffmpeg crate ecosystem.

    A [`FrameSource`] hands out decoded frames one at a time and takes them
    back once the consumer is done with them. This crate provides the trait,
    a deterministic [`TestPatternSource`], and (with the `ffmpeg` feature) a
    file-backed source built on FFmpeg's decoders.
*/

#[cfg(feature = "ffmpeg")]
mod ffmpeg;
mod pattern;
mod source;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;
pub use pattern::TestPatternSource;
pub use source::{FrameRecycler, FrameSource, PoolRecycler};
