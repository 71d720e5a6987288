/*!
    Turns decoded video frames into timed, renderer-ready images.

    A [`FramePipeline`] pulls [`FrameBuffer`](ffmpeg_types::FrameBuffer)s
    from a [`FrameSource`](ffmpeg_decode::FrameSource) on one thread,
    converts them into RGBA/BGRA images on another, and hands out
    [`PresentationFrame`]s (an image plus how long it stays on screen) in
    decode order. Buffers go back to the source as soon as their pixels have
    been copied out.

    ```ignore
    let source = TestPatternSource::new(1280, 720, PixelFormat::Yuv420p);
    let pipeline = FramePipeline::start(source, &PipelineConfig::default())?;
    while let Next::Frame(frame) = pipeline.next()? {
        render(frame.image(), frame.duration());
    }
    ```
*/

mod config;
mod playback;

pub use config::{ConfigError, OutputSize, PipelineConfig};
pub use playback::{
    FramePipeline, HandoffQueue, Next, PipelineStats, PresentationFrame, Presenter, WallClock,
};
