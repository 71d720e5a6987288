use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use ffmpeg_decode::{FrameRecycler, FrameSource, TestPatternSource};
use ffmpeg_transform::DurationSource;
use ffmpeg_types::{
    BufferPool, Error, FrameBuffer, PixelFormat, PlaneLayout, Pts, Rational, Result,
    VideoStreamInfo,
};
use parking_lot::{Condvar, Mutex};
use vidframe::{
    FramePipeline, Next, OutputSize, PipelineConfig, PresentationFrame, Presenter, WallClock,
};

const TB: Rational = Rational::new(1, 1000);

enum Step {
    Frame(FrameBuffer),
    Fail(Error),
}

/// A source that plays back a fixed list of frames and errors.
struct ScriptedSource {
    info: VideoStreamInfo,
    steps: VecDeque<Step>,
    acquires: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(info: VideoStreamInfo) -> Self {
        Self {
            info,
            steps: VecDeque::new(),
            acquires: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn frame(mut self, frame: FrameBuffer) -> Self {
        self.steps.push_back(Step::Frame(frame));
        self
    }

    fn fail(mut self, error: Error) -> Self {
        self.steps.push_back(Step::Fail(error));
        self
    }
}

impl FrameSource for ScriptedSource {
    fn metadata(&self) -> &VideoStreamInfo {
        &self.info
    }

    fn acquire(&mut self) -> Result<Option<FrameBuffer>> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        match self.steps.pop_front() {
            Some(Step::Frame(frame)) => Ok(Some(frame)),
            Some(Step::Fail(error)) => Err(error),
            None => Ok(None),
        }
    }

    fn release(&mut self, frame: FrameBuffer) {
        drop(frame);
    }
}

/// Decoder surfaces shared between a source and its recycler.
struct Surfaces {
    in_use: Mutex<usize>,
    returned: Condvar,
    capacity: usize,
}

impl Surfaces {
    /// Wait up to a second for a free surface, like a hardware decoder.
    fn take(&self) -> Result<()> {
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut in_use = self.in_use.lock();
        while *in_use >= self.capacity {
            if self.returned.wait_until(&mut in_use, deadline).timed_out() {
                return Err(Error::decode(format!("no free surface, {} outstanding", *in_use)));
            }
        }
        *in_use += 1;
        Ok(())
    }

    fn give_back(&self) {
        *self.in_use.lock() -= 1;
        self.returned.notify_one();
    }
}

impl FrameRecycler for Surfaces {
    fn recycle(&self, frame: FrameBuffer) {
        drop(frame);
        self.give_back();
    }
}

/// A source with a fixed number of surfaces whose `acquire` blocks until
/// one is returned.
struct SurfaceSource {
    info: VideoStreamInfo,
    surfaces: Arc<Surfaces>,
    remaining: usize,
    next_pts: i64,
}

impl SurfaceSource {
    fn new(surfaces: usize, frames: usize) -> Self {
        Self {
            info: rgba_info(Some(Rational::new(25, 1))),
            surfaces: Arc::new(Surfaces {
                in_use: Mutex::new(0),
                returned: Condvar::new(),
                capacity: surfaces,
            }),
            remaining: frames,
            next_pts: 0,
        }
    }
}

impl FrameSource for SurfaceSource {
    fn metadata(&self) -> &VideoStreamInfo {
        &self.info
    }

    fn acquire(&mut self) -> Result<Option<FrameBuffer>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.surfaces.take()?;
        self.remaining -= 1;
        let frame = FrameBuffer::packed(PixelFormat::Rgba, 8, 2, vec![7u8; 64])
            .with_pts(Pts(self.next_pts), TB);
        self.next_pts += 40;
        Ok(Some(frame))
    }

    fn release(&mut self, frame: FrameBuffer) {
        drop(frame);
        self.surfaces.give_back();
    }

    fn recycler(&self) -> Option<Arc<dyn FrameRecycler>> {
        Some(Arc::clone(&self.surfaces) as Arc<dyn FrameRecycler>)
    }
}

/// A source whose `acquire` takes `delay` per frame.
struct SlowSource {
    info: VideoStreamInfo,
    delay: Duration,
}

impl FrameSource for SlowSource {
    fn metadata(&self) -> &VideoStreamInfo {
        &self.info
    }

    fn acquire(&mut self) -> Result<Option<FrameBuffer>> {
        std::thread::sleep(self.delay);
        let frame = FrameBuffer::packed(PixelFormat::Rgba, 8, 2, vec![0u8; 64]);
        Ok(Some(frame.with_pts(Pts(0), TB)))
    }

    fn release(&mut self, frame: FrameBuffer) {
        drop(frame);
    }
}

fn rgba_info(frame_rate: Option<Rational>) -> VideoStreamInfo {
    let info = VideoStreamInfo::new(8, 2, PixelFormat::Rgba, TB);
    match frame_rate {
        Some(rate) => info.with_frame_rate(rate),
        None => info,
    }
}

/// 8x2 RGBA frame from the pool, filled with `fill`.
fn rgba_frame(pool: &BufferPool, stride: usize, pts: Option<i64>, fill: u8) -> FrameBuffer {
    let mut data = pool.get(stride * 2);
    data.fill(fill);
    let frame = FrameBuffer::new(PixelFormat::Rgba, 8, 2, vec![PlaneLayout::new(0, stride)], data);
    match pts {
        Some(pts) => frame.with_pts(Pts(pts), TB),
        None => frame,
    }
}

fn expect_frame(pipeline: &FramePipeline) -> PresentationFrame {
    match pipeline.next() {
        Ok(Next::Frame(frame)) => frame,
        other => panic!("expected a frame, got {other:?}"),
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn full_hd_at_declared_frame_rate() {
    let source = TestPatternSource::new(1920, 1080, PixelFormat::Yuv420p).with_frame_count(3);
    let pool = source.pool().clone();
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    for sequence in 0..3 {
        let frame = expect_frame(&pipeline);
        assert_eq!((frame.width(), frame.height()), (1920, 1080));
        assert_eq!(frame.sequence(), sequence);
        assert_eq!(frame.duration_source(), DurationSource::FrameRate);
        assert!((frame.duration_secs() - 1.0 / 30.0).abs() < 1e-6);
        assert_eq!(frame.packet_duration(), Some(frame.duration()));
    }
    assert!(matches!(pipeline.next(), Ok(Next::EndOfStream)));

    let stats = pipeline.finish();
    assert_eq!(stats.acquired, 3);
    assert_eq!(stats.released, 3);
    assert_eq!(stats.emitted, 3);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn short_stride_frame_is_dropped_and_stream_continues() {
    let pool = BufferPool::new(4);
    let source = ScriptedSource::new(rgba_info(Some(Rational::new(25, 1))))
        .frame(rgba_frame(&pool, 32, Some(0), 10))
        .frame(rgba_frame(&pool, 31, Some(40), 20))
        .frame(rgba_frame(&pool, 32, Some(80), 30));
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    let first = expect_frame(&pipeline);
    let second = expect_frame(&pipeline);
    assert_eq!(first.image().as_raw()[0], 10);
    assert_eq!(second.image().as_raw()[0], 30);
    assert_eq!(second.pts(), Duration::from_millis(80));
    assert_eq!(second.sequence(), 1);
    assert!(matches!(pipeline.next(), Ok(Next::EndOfStream)));

    let stats = pipeline.finish();
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.emitted, 2);
    assert_eq!((stats.acquired, stats.released), (3, 3));
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn end_of_stream_is_delivered_once() {
    let source = TestPatternSource::new(32, 16, PixelFormat::Nv12).with_frame_count(5);
    let pool = source.pool().clone();
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    for _ in 0..5 {
        expect_frame(&pipeline);
    }
    assert!(matches!(pipeline.next(), Ok(Next::EndOfStream)));
    assert!(matches!(pipeline.next(), Err(Error::Closed)));
    assert!(matches!(pipeline.try_next(), Err(Error::Closed)));

    let stats = pipeline.finish();
    assert_eq!(stats.acquired, stats.released);
    assert_eq!(pool.outstanding(), 0);
    assert!(pool.idle() > 0);
}

#[test]
fn cancel_mid_stream_releases_everything() {
    let source = TestPatternSource::new(64, 32, PixelFormat::Yuv420p);
    let pool = source.pool().clone();
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    let frame = expect_frame(&pipeline);
    assert_eq!(frame.sequence(), 0);

    pipeline.cancel();
    assert!(pipeline.is_cancelled());
    assert!(matches!(pipeline.next(), Err(Error::Cancelled)));
    assert!(matches!(pipeline.try_next(), Err(Error::Cancelled)));
    assert!(matches!(pipeline.next(), Err(Error::Cancelled)));

    let stats = pipeline.stats();
    assert!(stats.acquired >= 1);
    assert_eq!(stats.acquired, stats.released);
    assert_eq!(stats.emitted, 1);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn timestamps_stay_in_decode_order() {
    let pool = BufferPool::new(4);
    let mut source = ScriptedSource::new(rgba_info(None));
    let gaps = [0i64, 33, 67, 100, 133, 170, 200, 233, 267, 300];
    for (i, pts) in gaps.iter().enumerate() {
        source = source.frame(rgba_frame(&pool, 32, Some(*pts), i as u8));
    }
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    let mut frames = Vec::new();
    while let Next::Frame(frame) = pipeline.next().unwrap() {
        frames.push(frame);
    }

    assert_eq!(frames.len(), gaps.len());
    for (i, pair) in frames.windows(2).enumerate() {
        assert!(pair[0].pts() < pair[1].pts());
        assert_eq!(pair[0].sequence() + 1, pair[1].sequence());
        assert_eq!(pair[0].duration(), pair[1].pts() - pair[0].pts(), "frame {i}");
        assert_eq!(pair[0].duration_source(), DurationSource::Lookahead);
    }
    let last = frames.last().unwrap();
    assert_eq!(last.duration_source(), DurationSource::Default);
    assert_eq!(last.duration(), Duration::from_millis(40));
}

#[test]
fn backwards_and_missing_timestamps() {
    let pool = BufferPool::new(4);
    let source = ScriptedSource::new(rgba_info(Some(Rational::new(25, 1))))
        .frame(rgba_frame(&pool, 32, Some(100), 1))
        .frame(rgba_frame(&pool, 32, Some(60), 2))
        .frame(rgba_frame(&pool, 32, None, 3));
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    let pts: Vec<Duration> = (0..3).map(|_| expect_frame(&pipeline).pts()).collect();
    assert_eq!(
        pts,
        vec![
            Duration::from_millis(100),
            Duration::from_millis(100),
            Duration::from_millis(140),
        ]
    );
}

#[test]
fn decode_error_is_surfaced_after_pending_frames() {
    let pool = BufferPool::new(4);
    let source = ScriptedSource::new(rgba_info(None))
        .frame(rgba_frame(&pool, 32, Some(0), 1))
        .frame(rgba_frame(&pool, 32, Some(50), 2))
        .fail(Error::decode("corrupt slice"));
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    assert_eq!(expect_frame(&pipeline).duration(), Duration::from_millis(50));
    assert_eq!(expect_frame(&pipeline).sequence(), 1);
    assert!(matches!(pipeline.next(), Err(Error::Decode(_))));
    assert!(matches!(pipeline.next(), Err(Error::Closed)));

    let stats = pipeline.finish();
    assert_eq!((stats.acquired, stats.released), (2, 2));
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn unsupported_output_fails_before_acquiring() {
    let source = ScriptedSource::new(rgba_info(None));
    let acquires = Arc::clone(&source.acquires);
    let config = PipelineConfig {
        output_format: PixelFormat::Yuv420p,
        ..PipelineConfig::default()
    };
    let err = FramePipeline::start(source, &config).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert_eq!(acquires.load(Ordering::SeqCst), 0);

    let config = PipelineConfig {
        output_size: Some(OutputSize { width: 0, height: 4 }),
        ..PipelineConfig::default()
    };
    let err = FramePipeline::start(ScriptedSource::new(rgba_info(None)), &config).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
}

#[test]
fn bgra_output_with_scaling() {
    let source = TestPatternSource::new(16, 8, PixelFormat::Rgba).with_frame_count(1);
    let config = PipelineConfig {
        output_format: PixelFormat::Bgra,
        output_size: Some(OutputSize { width: 8, height: 4 }),
        ..PipelineConfig::default()
    };
    let pipeline = FramePipeline::start(source, &config).unwrap();

    let frame = expect_frame(&pipeline);
    assert_eq!((frame.width(), frame.height()), (8, 4));
    assert_eq!(frame.format(), PixelFormat::Bgra);
    // first bar is white in any byte order
    assert_eq!(&frame.image().as_raw()[..4], &[255, 255, 255, 255]);
}

#[test]
fn presenter_follows_frame_durations() {
    let pool = BufferPool::new(4);
    let source = ScriptedSource::new(rgba_info(Some(Rational::new(25, 1))))
        .frame(rgba_frame(&pool, 32, Some(1000), 1))
        .frame(rgba_frame(&pool, 32, Some(1040), 2))
        .frame(rgba_frame(&pool, 32, Some(1080), 3));
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();
    let mut presenter = Presenter::new(pipeline);

    wait_until(|| presenter.update(Duration::ZERO).unwrap());
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(0));

    assert!(!presenter.update(Duration::from_millis(39)).unwrap());
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(0));

    wait_until(|| presenter.update(Duration::from_millis(40)).unwrap());
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(1));
    assert_eq!(presenter.previous().map(|f| f.sequence()), Some(0));

    let end = Duration::from_millis(120);
    wait_until(|| {
        presenter.update(end).unwrap();
        presenter.is_ended(end)
    });
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(2));
    assert!(!presenter.is_ended(Duration::from_millis(119)));

    let stats = presenter.into_pipeline().finish();
    assert_eq!(stats.emitted, 3);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn fixed_surface_source_gets_buffers_back_while_blocked() {
    let source = SurfaceSource::new(2, 6);
    let surfaces = Arc::clone(&source.surfaces);
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    for sequence in 0..6 {
        let frame = expect_frame(&pipeline);
        assert_eq!(frame.sequence(), sequence);
        assert_eq!(frame.pts(), Duration::from_millis(40 * sequence));
    }
    assert!(matches!(pipeline.next(), Ok(Next::EndOfStream)));

    let stats = pipeline.stats();
    assert_eq!((stats.acquired, stats.released), (6, 6));
    assert_eq!(*surfaces.in_use.lock(), 0);
    pipeline.finish();
}

#[test]
fn counters_are_final_at_end_of_stream() {
    let pool = BufferPool::new(4);
    let source = ScriptedSource::new(rgba_info(Some(Rational::new(25, 1))))
        .frame(rgba_frame(&pool, 32, Some(0), 1))
        .frame(rgba_frame(&pool, 32, Some(40), 2))
        .frame(rgba_frame(&pool, 32, Some(80), 3));
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    for _ in 0..3 {
        expect_frame(&pipeline);
    }
    assert!(matches!(pipeline.next(), Ok(Next::EndOfStream)));

    // no join yet: the terminal result waits for every release
    let stats = pipeline.stats();
    assert_eq!((stats.acquired, stats.released, stats.emitted), (3, 3, 3));
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn cancel_wakes_a_blocked_consumer() {
    let source = SlowSource {
        info: rgba_info(Some(Rational::new(25, 1))),
        delay: Duration::from_millis(300),
    };
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();

    std::thread::scope(|scope| {
        let consumer = scope.spawn(|| pipeline.next());
        std::thread::sleep(Duration::from_millis(50));
        pipeline.cancel();
        let result = consumer.join().unwrap();
        assert!(matches!(result, Err(Error::Cancelled)), "got {result:?}");
    });

    assert!(matches!(pipeline.try_next(), Err(Error::Cancelled)));
    let stats = pipeline.finish();
    assert_eq!(stats.acquired, stats.released);
    assert_eq!(stats.emitted, 0);
}

#[test]
fn out_of_range_config_is_rejected_at_start() {
    let configs = [
        PipelineConfig {
            default_frame_duration: f64::NAN,
            ..PipelineConfig::default()
        },
        PipelineConfig {
            default_frame_duration: -0.5,
            ..PipelineConfig::default()
        },
        PipelineConfig {
            source_queue_capacity: 0,
            ..PipelineConfig::default()
        },
    ];

    for config in configs {
        let source = ScriptedSource::new(rgba_info(None));
        let acquires = Arc::clone(&source.acquires);
        let err = FramePipeline::start(source, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)), "{config:?}: {err:?}");
        assert_eq!(acquires.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn presenter_follows_wall_clock() {
    let pool = BufferPool::new(4);
    let source = ScriptedSource::new(rgba_info(Some(Rational::new(25, 1))))
        .frame(rgba_frame(&pool, 32, Some(0), 1))
        .frame(rgba_frame(&pool, 32, Some(40), 2))
        .frame(rgba_frame(&pool, 32, Some(80), 3));
    let pipeline = FramePipeline::start(source, &PipelineConfig::default()).unwrap();
    let mut presenter = Presenter::new(pipeline);
    let clock = WallClock::paused_at(Duration::ZERO);

    wait_until(|| presenter.update_from(&clock).unwrap());
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(0));

    clock.reset_to(Duration::from_millis(45));
    wait_until(|| presenter.update_from(&clock).unwrap());
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(1));

    // a paused clock holds the frame
    assert!(clock.is_paused());
    assert!(!presenter.update_from(&clock).unwrap());
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(1));

    clock.reset_to(Duration::from_millis(120));
    wait_until(|| {
        presenter.update_from(&clock).unwrap();
        presenter.is_ended(clock.position())
    });
    assert_eq!(presenter.current().map(|f| f.sequence()), Some(2));
}
