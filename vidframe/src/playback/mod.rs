mod clock;
mod frame;
mod handoff;
mod pipeline;
mod presenter;
mod stage;

pub use clock::WallClock;
pub use frame::PresentationFrame;
pub use handoff::HandoffQueue;
pub use pipeline::{FramePipeline, Next, PipelineStats};
pub use presenter::Presenter;
