use std::fmt::Debug;

/// Trait representing instants in time. Allows driving a
/// [`Padder`](crate::Padder) with a custom time source. If you want to use a
/// different time source than `std::time::Instant`, implement this trait for
/// your instant type, and the [`Duration`] trait for your corresponding
/// duration type.
pub trait Instant: Clone + Copy {
    type Duration: Duration;

    /// Returns the amount of time elapsed from another instant to this one.
    ///
    /// Should return a zero duration if `earlier` is later than `self`
    fn saturating_duration_since(&self, earlier: Self) -> Self::Duration;
}

pub trait Duration: Clone + Copy + PartialOrd + Debug {
    /// Creates a new duration from a non-negative, finite number of seconds.
    fn from_secs_f64(secs: f64) -> Self;

    /// Returns the number of seconds in this duration.
    fn as_secs_f64(&self) -> f64;
}

impl Instant for std::time::Instant {
    type Duration = std::time::Duration;

    #[inline(always)]
    fn saturating_duration_since(&self, earlier: Self) -> Self::Duration {
        self.saturating_duration_since(earlier)
    }
}

impl Duration for std::time::Duration {
    #[inline(always)]
    fn from_secs_f64(secs: f64) -> Self {
        Self::from_secs_f64(secs)
    }

    #[inline(always)]
    fn as_secs_f64(&self) -> f64 {
        std::time::Duration::as_secs_f64(self)
    }
}
