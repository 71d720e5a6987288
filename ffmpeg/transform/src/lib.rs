/*!
    Media frame transformation for the ffmpeg crate ecosystem.

    This crate converts decoded frames into presentable ones: geometry
    validation, pixel format and colorspace conversion, scaling, stride
    normalization, and the on-screen duration policy.

    All conversion is done in integer fixed-point arithmetic, so identical
    input frames always produce identical output bytes.
*/

mod colorspace;
mod planes;
mod scale;
mod timing;
mod video;

pub use colorspace::YuvMatrix;
pub use timing::{DurationPolicy, DurationSource};
pub use video::{ConvertConfig, FrameConverter, ScalingAlgorithm};
