/*!
    Shared types for the ffmpeg crate ecosystem.

    This crate defines the vocabulary of the ecosystem: the types that cross crate
    boundaries. It has no dependency on FFmpeg, making it lightweight and enabling
    consumers to depend on it without pulling in FFmpeg bindings.
*/

mod error;
mod format;
mod frame;
mod pool;
mod stream;
mod time;

pub use error::{Error, Result};
pub use format::{ChromaSiting, ColorInfo, ColorMatrix, ColorRange, PixelFormat};
pub use frame::{FrameBuffer, PlaneLayout, VideoFrame};
pub use pool::{BufferPool, PooledBuffer};
pub use stream::VideoStreamInfo;
pub use time::{Pts, Rational};
