/*!
    On-screen duration policy.

    A frame stays visible for:
    1. the reciprocal of the stream's declared frame rate, when one is declared;
    2. otherwise, in look-ahead mode, the gap to the next frame's timestamp;
    3. otherwise, a caller-supplied default.
*/

use std::time::Duration;

use ffmpeg_types::Rational;

/**
    Which tier of the policy produced a duration.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DurationSource {
    /// Reciprocal of the declared frame rate.
    FrameRate,
    /// Distance to the next frame's timestamp.
    Lookahead,
    /// Caller-supplied default.
    Default,
}

/**
    Resolves how long each frame stays on screen.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationPolicy {
    frame_period: Option<Duration>,
    lookahead: bool,
    fallback: Duration,
}

impl DurationPolicy {
    /**
        Create a policy from the stream's declared frame rate.

        Undefined rates (zero or negative terms) are treated as absent.
    */
    pub fn new(frame_rate: Option<Rational>, fallback: Duration) -> Self {
        let frame_period = frame_rate
            .filter(|rate| rate.is_positive())
            .and_then(|rate| rate.invert().to_duration())
            .filter(|period| !period.is_zero());
        Self {
            frame_period,
            lookahead: true,
            fallback,
        }
    }

    /// Enable or disable the look-ahead tier.
    pub fn with_lookahead(mut self, lookahead: bool) -> Self {
        self.lookahead = lookahead;
        self
    }

    pub fn frame_period(&self) -> Option<Duration> {
        self.frame_period
    }

    pub fn fallback(&self) -> Duration {
        self.fallback
    }

    /**
        Returns true if callers must know the next frame's timestamp before
        a duration can be resolved.
    */
    pub fn needs_lookahead(&self) -> bool {
        self.lookahead && self.frame_period.is_none()
    }

    /**
        Resolve the duration of a frame presented at `pts`, given the next
        frame's timestamp when it is known.

        The look-ahead tier only applies when `next_pts` is strictly later
        than `pts`; equal or reordered timestamps fall through to the default.
    */
    pub fn resolve(
        &self,
        pts: Option<Duration>,
        next_pts: Option<Duration>,
    ) -> (Duration, DurationSource) {
        if let Some(period) = self.frame_period {
            return (period, DurationSource::FrameRate);
        }

        if self.lookahead {
            if let (Some(pts), Some(next)) = (pts, next_pts) {
                if next > pts {
                    return (next - pts, DurationSource::Lookahead);
                }
            }
        }

        (self.fallback, DurationSource::Default)
    }
}
