/*!
    The decoder-side frame contract.
*/

use std::sync::Arc;

use ffmpeg_types::{FrameBuffer, Result, VideoStreamInfo};

/**
    A producer of decoded frames.

    Frames handed out by [`acquire`](FrameSource::acquire) belong to the
    source's memory (usually a buffer pool). Every acquired frame must be
    given back exactly once through [`release`](FrameSource::release), and
    only after all of its data has been copied out. Since `release` takes
    the frame by value, it cannot be read afterwards.

    A source whose `acquire` waits for free memory must also hand out a
    [`recycler`](FrameSource::recycler). Otherwise frames only come back
    between two `acquire` calls, and a blocked `acquire` never sees them.
*/
pub trait FrameSource: Send {
    /**
        Stream metadata: dimensions, pixel format, color description,
        time base and declared frame rate.
    */
    fn metadata(&self) -> &VideoStreamInfo;

    /**
        Block until the next frame is decoded.

        Returns `Ok(None)` at end of stream and `Err(Error::Decode)` when the
        bitstream is corrupt.
    */
    fn acquire(&mut self) -> Result<Option<FrameBuffer>>;

    /**
        Return a frame to the source.
    */
    fn release(&mut self, frame: FrameBuffer);

    /**
        A handle that gives frames back from any thread.

        Frames returned through the recycler count as released and must not
        be passed to `release` as well. The default of `None` routes every
        frame through `release`.
    */
    fn recycler(&self) -> Option<Arc<dyn FrameRecycler>> {
        None
    }
}

/**
    Thread-safe return path for frames, used while the source itself is
    busy in [`FrameSource::acquire`].
*/
pub trait FrameRecycler: Send + Sync {
    fn recycle(&self, frame: FrameBuffer);
}

/**
    Recycler for sources whose frames live in a
    [`BufferPool`](ffmpeg_types::BufferPool). Dropping a frame hands its
    memory back to the pool, so nothing else needs to happen.
*/
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolRecycler;

impl FrameRecycler for PoolRecycler {
    fn recycle(&self, frame: FrameBuffer) {
        drop(frame);
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn metadata(&self) -> &VideoStreamInfo {
        (**self).metadata()
    }

    fn acquire(&mut self) -> Result<Option<FrameBuffer>> {
        (**self).acquire()
    }

    fn release(&mut self, frame: FrameBuffer) {
        (**self).release(frame)
    }

    fn recycler(&self) -> Option<Arc<dyn FrameRecycler>> {
        (**self).recycler()
    }
}
