/*!
    Rational time bases and timestamps.
*/

use std::time::Duration;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/**
    A rational number, used for time bases and frame rates.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /**
        Returns true if both terms are strictly positive.

        Decoders report unknown frame rates as 0/0 or 0/1, so a zero or
        negative term means "not available".
    */
    pub const fn is_positive(self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /**
        Returns the reciprocal, e.g. frame rate → frame period.
    */
    pub const fn invert(self) -> Self {
        Self::new(self.den, self.num)
    }

    /**
        Interpret this rational as seconds and convert to a [`Duration`].

        Returns `None` for non-positive or undefined values.
    */
    pub fn to_duration(self) -> Option<Duration> {
        if !self.is_positive() {
            return None;
        }
        let nanos = self.num as i128 * NANOS_PER_SEC / self.den as i128;
        u64::try_from(nanos).ok().map(Duration::from_nanos)
    }
}

/**
    Presentation timestamp in stream time base units.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);

impl Pts {
    /**
        Convert to a duration since stream start.

        Returns `None` for negative timestamps or an invalid time base.
    */
    pub fn to_duration(self, time_base: Rational) -> Option<Duration> {
        if self.0 < 0 || !time_base.is_positive() {
            return None;
        }
        let nanos =
            self.0 as i128 * time_base.num as i128 * NANOS_PER_SEC / time_base.den as i128;
        u64::try_from(nanos).ok().map(Duration::from_nanos)
    }
}
