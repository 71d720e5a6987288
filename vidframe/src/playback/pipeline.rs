use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use ffmpeg_decode::{FrameRecycler, FrameSource};
use ffmpeg_transform::FrameConverter;
use ffmpeg_types::{Error, FrameBuffer, Result, VideoStreamInfo};

use crate::config::PipelineConfig;

use super::frame::PresentationFrame;
use super::handoff::HandoffQueue;
use super::stage::FrameStage;

/**
    What [`FramePipeline::next`] produced.
*/
#[derive(Debug)]
pub enum Next {
    Frame(PresentationFrame),
    EndOfStream,
}

/**
    Counters for one pipeline run.
*/
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Buffers taken from the source.
    pub acquired: u64,
    /// Buffers handed back to the source.
    pub released: u64,
    /// Frames returned by `next`.
    pub emitted: u64,
    /// Malformed buffers that were skipped.
    pub dropped: u64,
}

#[derive(Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            acquired: self.acquired.load(Ordering::Acquire),
            released: self.released.load(Ordering::Acquire),
            emitted: self.emitted.load(Ordering::Acquire),
            dropped: self.dropped.load(Ordering::Acquire),
        }
    }
}

/// Acquire stage → convert stage.
enum SourceEvent {
    Frame(FrameBuffer),
    End,
    Failed(Error),
}

/// Convert stage → consumer.
enum StageEvent {
    Frame(PresentationFrame),
    End,
    Failed(Error),
}

/// How buffers get back to the source once their pixels are copied.
enum ReturnPath {
    /// Straight from the convert stage through the source's recycler.
    Recycle(Arc<dyn FrameRecycler>),
    /// Through the acquire stage, which calls `release`.
    Channel(Sender<FrameBuffer>),
}

impl ReturnPath {
    fn give_back(&self, frame: FrameBuffer, counters: &Counters) {
        match self {
            Self::Recycle(recycler) => {
                recycler.recycle(frame);
                counters.released.fetch_add(1, Ordering::AcqRel);
            }
            // the acquire stage keeps receiving until this sender is dropped
            Self::Channel(returns) => {
                let _ = returns.send(frame);
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Open,
    Delivered,
    Cancelled,
}

/**
    Staged frame pipeline: acquire → convert → consumer.

    The acquire stage owns the source and is the only place buffers are
    released. The convert stage turns buffers into [`PresentationFrame`]s
    and sends each buffer back once its pixels are copied. Bounded queues
    between the stages apply backpressure. Sources that provide a
    [`FrameRecycler`] get their buffers back from the convert stage
    directly, even while the acquire stage is blocked in `acquire`.

    The stream ends with exactly one terminal result from
    [`next`](Self::next): `Ok(Next::EndOfStream)` or the error that stopped
    the stream. Later calls return `Err(Error::Closed)`. After
    [`cancel`](Self::cancel) every call returns `Err(Error::Cancelled)`.
    By the time the terminal result is delivered every acquired buffer has
    been released.
*/
pub struct FramePipeline {
    info: VideoStreamInfo,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stop_flag: Arc<AtomicBool>,
    source_queue: Arc<HandoffQueue<SourceEvent>>,
    output_queue: Arc<HandoffQueue<StageEvent>>,
    counters: Arc<Counters>,
    terminal: Mutex<Terminal>,
}

impl FramePipeline {
    /**
        Start both stages for `source`.

        Fails with `UnsupportedFormat` before any buffer is acquired if the
        configured output is not RGBA/BGRA or the stream's pixel format
        cannot be converted to it, and with `InvalidConfig` if the other
        settings are out of range.
    */
    #[tracing::instrument(skip_all, name = "FramePipeline::start", err)]
    pub fn start<S>(source: S, config: &PipelineConfig) -> Result<Self>
    where
        S: FrameSource + 'static,
    {
        let info = source.metadata().clone();

        if !config.output_format.is_displayable() {
            return Err(Error::unsupported_format(format!(
                "output format {:?} is not a display format",
                config.output_format
            )));
        }
        if !FrameConverter::supports(info.pixel_format, config.output_format) {
            return Err(Error::unsupported_format(format!(
                "cannot convert {:?} to {:?}",
                info.pixel_format, config.output_format
            )));
        }
        let converter = FrameConverter::new(config.convert_config())?;
        config.validate().map_err(|e| Error::invalid_config(e.to_string()))?;
        let stage = FrameStage::new(converter, config.duration_policy(info.frame_rate));

        tracing::debug!(
            width = info.width,
            height = info.height,
            format = ?info.pixel_format,
            frame_rate = ?info.frame_rate,
            "starting frame pipeline"
        );

        let stop_flag = Arc::new(AtomicBool::new(false));
        let source_queue = Arc::new(HandoffQueue::new(config.source_queue_capacity));
        let output_queue = Arc::new(HandoffQueue::new(config.output_queue_capacity));
        let counters = Arc::new(Counters::default());
        let (return_tx, return_rx) = crossbeam_channel::unbounded();
        let (finished_tx, finished_rx) = crossbeam_channel::bounded::<()>(0);
        let returns = match source.recycler() {
            Some(recycler) => ReturnPath::Recycle(recycler),
            None => ReturnPath::Channel(return_tx),
        };

        // Spawn acquire thread
        let acquire_handle = {
            let queue = Arc::clone(&source_queue);
            let stop = Arc::clone(&stop_flag);
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                acquire_frames(source, queue, return_rx, finished_tx, stop, counters)
            })
        };

        // Spawn convert thread
        let convert_handle = {
            let input = Arc::clone(&source_queue);
            let output = Arc::clone(&output_queue);
            let stop = Arc::clone(&stop_flag);
            let counters = Arc::clone(&counters);
            thread::spawn(move || {
                convert_frames(stage, input, output, returns, finished_rx, stop, counters)
            })
        };

        Ok(Self {
            info,
            handles: Mutex::new(vec![acquire_handle, convert_handle]),
            stop_flag,
            source_queue,
            output_queue,
            counters,
            terminal: Mutex::new(Terminal::Open),
        })
    }

    /// Stream metadata reported by the source at startup.
    pub fn metadata(&self) -> &VideoStreamInfo {
        &self.info
    }

    /**
        Wait for the next frame.
    */
    pub fn next(&self) -> Result<Next> {
        self.check_terminal()?;
        let event = self.output_queue.pop();
        self.deliver(event)
    }

    /**
        Like [`next`](Self::next), but returns `Ok(None)` instead of waiting
        when no frame is ready yet.
    */
    pub fn try_next(&self) -> Result<Option<Next>> {
        self.check_terminal()?;
        match self.output_queue.try_pop() {
            Some(event) => self.deliver(Some(event)).map(Some),
            None if self.output_queue.is_drained() => self.deliver(None).map(Some),
            None => Ok(None),
        }
    }

    /**
        Stop both stages and release every buffer still in flight.

        Frames not yet returned by `next` are discarded.
    */
    pub fn cancel(&self) {
        *self.terminal.lock() = Terminal::Cancelled;
        self.shutdown();
    }

    /**
        Stop the pipeline and wait for both stages to exit.

        Once this returns both stages have exited and every acquired buffer
        has been released, so the returned counters are final.
    */
    pub fn finish(self) -> PipelineStats {
        self.shutdown();
        self.counters.snapshot()
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.terminal.lock() == Terminal::Cancelled
    }

    fn check_terminal(&self) -> Result<()> {
        match *self.terminal.lock() {
            Terminal::Open => Ok(()),
            Terminal::Delivered => Err(Error::Closed),
            Terminal::Cancelled => Err(Error::Cancelled),
        }
    }

    fn deliver(&self, event: Option<StageEvent>) -> Result<Next> {
        let mut terminal = self.terminal.lock();
        if *terminal == Terminal::Cancelled {
            return Err(Error::Cancelled);
        }

        match event {
            Some(StageEvent::Frame(frame)) => {
                self.counters.emitted.fetch_add(1, Ordering::AcqRel);
                Ok(Next::Frame(frame))
            }
            Some(StageEvent::End) => {
                *terminal = Terminal::Delivered;
                Ok(Next::EndOfStream)
            }
            Some(StageEvent::Failed(e)) => {
                *terminal = Terminal::Delivered;
                Err(e)
            }
            None => {
                *terminal = Terminal::Delivered;
                Err(Error::Closed)
            }
        }
    }

    fn shutdown(&self) {
        self.stop_flag.store(true, Ordering::Release);
        self.source_queue.close();
        self.output_queue.close();
        self.output_queue.drain();

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("pipeline stage panicked");
            }
        }
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FramePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramePipeline")
            .field("info", &self.info)
            .field("stats", &self.stats())
            .field("queued", &self.output_queue.len())
            .finish_non_exhaustive()
    }
}

fn release<S: FrameSource>(source: &mut S, frame: FrameBuffer, counters: &Counters) {
    source.release(frame);
    counters.released.fetch_add(1, Ordering::AcqRel);
}

fn acquire_frames<S: FrameSource>(
    mut source: S,
    queue: Arc<HandoffQueue<SourceEvent>>,
    returns: Receiver<FrameBuffer>,
    finished: Sender<()>,
    stop_flag: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    loop {
        for frame in returns.try_iter() {
            release(&mut source, frame, &counters);
        }

        if stop_flag.load(Ordering::Acquire) {
            break;
        }

        let event = match source.acquire() {
            Ok(Some(frame)) => {
                counters.acquired.fetch_add(1, Ordering::AcqRel);
                SourceEvent::Frame(frame)
            }
            Ok(None) => SourceEvent::End,
            Err(e) => {
                tracing::error!(error = %e, "source failed");
                SourceEvent::Failed(e)
            }
        };
        let last = !matches!(event, SourceEvent::Frame(_));

        if let Err(rejected) = queue.push(event) {
            if let SourceEvent::Frame(frame) = rejected {
                release(&mut source, frame, &counters);
            }
            break;
        }
        if last {
            break;
        }
    }

    // The convert stage hangs up once it holds no more buffers
    for frame in returns.iter() {
        release(&mut source, frame, &counters);
    }
    tracing::debug!("acquire stage finished");
    // wakes the convert stage, which is waiting to deliver the terminal event
    drop(finished);
}

fn convert_frames(
    mut stage: FrameStage,
    input: Arc<HandoffQueue<SourceEvent>>,
    output: Arc<HandoffQueue<StageEvent>>,
    returns: ReturnPath,
    acquire_finished: Receiver<()>,
    stop_flag: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    let mut terminal = None;

    while let Some(event) = input.pop() {
        if stop_flag.load(Ordering::Acquire) {
            if let SourceEvent::Frame(buffer) = event {
                returns.give_back(buffer, &counters);
            }
            break;
        }

        let ready = match event {
            SourceEvent::Frame(buffer) => {
                let result = stage.push(&buffer);
                returns.give_back(buffer, &counters);
                match result {
                    Ok(ready) => ready,
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(error = %e, "dropping malformed frame");
                        counters.dropped.fetch_add(1, Ordering::AcqRel);
                        None
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "conversion failed");
                        terminal = Some(StageEvent::Failed(e));
                        break;
                    }
                }
            }
            SourceEvent::End => {
                terminal = Some(StageEvent::End);
                stage.flush()
            }
            SourceEvent::Failed(e) => {
                terminal = Some(StageEvent::Failed(e));
                stage.flush()
            }
        };

        if let Some(frame) = ready {
            if output.push(StageEvent::Frame(frame)).is_err() {
                break;
            }
        }
        if terminal.is_some() {
            break;
        }
    }

    input.close();
    for event in input.drain() {
        if let SourceEvent::Frame(buffer) = event {
            returns.give_back(buffer, &counters);
        }
    }

    // Hold the terminal event back until the acquire stage has released
    // everything, so a consumer that sees it also sees final counters.
    drop(returns);
    let _ = acquire_finished.recv();

    if let Some(event) = terminal {
        let _ = output.push(event);
    }
    output.close();
    tracing::debug!("convert stage finished");
}
