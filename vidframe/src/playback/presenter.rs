use std::time::Duration;

use ffmpeg_types::Result;

use super::clock::WallClock;
use super::frame::PresentationFrame;
use super::pipeline::{FramePipeline, Next};

/**
    Picks the frame to show for a playback position.

    Call [`update`](Self::update) once per render tick with the clock
    position. Frames are advanced when the position passes the end of the
    current frame's on-screen duration. Positions are measured from the
    first frame's timestamp, so streams that do not start at zero play
    immediately.
*/
pub struct Presenter {
    pipeline: FramePipeline,
    current: Option<PresentationFrame>,
    previous: Option<PresentationFrame>,
    base_pts: Option<Duration>,
    end_of_stream: bool,
}

impl Presenter {
    pub fn new(pipeline: FramePipeline) -> Self {
        Self {
            pipeline,
            current: None,
            previous: None,
            base_pts: None,
            end_of_stream: false,
        }
    }

    /**
        Advance to the frame due at `position`.

        Never blocks: if the pipeline has nothing ready the current frame
        stays up. Returns true if the current frame changed.
    */
    pub fn update(&mut self, position: Duration) -> Result<bool> {
        let mut changed = false;

        loop {
            let due = match &self.current {
                None => true,
                Some(frame) => self.relative(frame.end()) <= position,
            };
            if !due || self.end_of_stream {
                break;
            }

            match self.pipeline.try_next()? {
                Some(Next::Frame(frame)) => {
                    if self.base_pts.is_none() {
                        self.base_pts = Some(frame.pts());
                    }
                    self.previous = self.current.replace(frame);
                    changed = true;
                }
                Some(Next::EndOfStream) => self.end_of_stream = true,
                None => break,
            }
        }

        Ok(changed)
    }

    /// [`update`](Self::update) with the clock's current position.
    pub fn update_from(&mut self, clock: &WallClock) -> Result<bool> {
        self.update(clock.position())
    }

    /// The frame to draw now.
    pub fn current(&self) -> Option<&PresentationFrame> {
        self.current.as_ref()
    }

    /// The frame shown before the current one.
    pub fn previous(&self) -> Option<&PresentationFrame> {
        self.previous.as_ref()
    }

    /**
        Returns true once the stream has ended and the last frame's
        duration has elapsed at `position`.
    */
    pub fn is_ended(&self, position: Duration) -> bool {
        self.end_of_stream
            && self
                .current
                .as_ref()
                .is_none_or(|frame| self.relative(frame.end()) <= position)
    }

    pub fn pipeline(&self) -> &FramePipeline {
        &self.pipeline
    }

    pub fn into_pipeline(self) -> FramePipeline {
        self.pipeline
    }

    fn relative(&self, time: Duration) -> Duration {
        time.saturating_sub(self.base_pts.unwrap_or(Duration::ZERO))
    }
}

impl std::fmt::Debug for Presenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Presenter")
            .field("current", &self.current.as_ref().map(|frame| frame.sequence()))
            .field("base_pts", &self.base_pts)
            .field("end_of_stream", &self.end_of_stream)
            .finish_non_exhaustive()
    }
}
