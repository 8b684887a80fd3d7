//! Padding strategies: which distributions drive a [`Padder`](crate::Padder)
//! and when it may stop.
//!
//! A [`Strategy`] is plain configuration. Countermeasures such as BuFLO or
//! Tamaraw are different values of it, not different types.

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::constants::{HDR_LEN, MTU};
use crate::histo::Histogram;
use crate::mathutil::{closest_multiple, closest_power_of_two};
use crate::session::{Direction, Session};

/// What a padding target is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Count sent frames.
    #[default]
    Messages,
    /// Count sent bytes on the wire.
    Bytes,
}

impl Unit {
    fn sent(self, session: &Session) -> u64 {
        match self {
            Unit::Messages => session.messages(Direction::Sent),
            Unit::Bytes => session.bytes(Direction::Sent),
        }
    }

    fn sent_data(self, session: &Session) -> u64 {
        match self {
            Unit::Messages => session.data_messages(Direction::Sent),
            Unit::Bytes => session.data_bytes(Direction::Sent),
        }
    }
}

/// How long padding continues once a visit is over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Extent {
    /// Pad until explicitly stopped.
    Never,
    /// Pad for at least this many seconds after padding started.
    MinTime { seconds: f64 },
    /// Pad until the count reaches the next power of two.
    Total,
    /// Pad until the count reaches a multiple of the power of two closest to
    /// the data count.
    Payload,
    /// Pad until the count reaches a multiple of `size`.
    Batch { size: u64 },
}

impl Extent {
    pub fn validate(&self) -> Result<(), Error> {
        match *self {
            Extent::MinTime { seconds } if !(seconds >= 0.0 && seconds.is_finite()) => {
                Err(Error::InvalidArgument(format!(
                    "minimum padding time must be a non-negative number of seconds, got {seconds}"
                )))?;
            }
            Extent::Batch { size: 0 } => {
                Err(Error::InvalidArgument("batch size must be positive".to_string()))?;
            }
            _ => {}
        }
        Ok(())
    }

    /// The count at which padding may stop, computed when the visit ends.
    /// `None` for extents that do not depend on a count.
    pub fn target(&self, session: &Session, unit: Unit) -> Result<Option<u64>, Error> {
        let count = unit.sent(session);
        Ok(match *self {
            Extent::Never | Extent::MinTime { .. } => None,
            Extent::Total => Some(closest_power_of_two(to_signed(count)?, true)?),
            Extent::Payload => {
                let k = closest_power_of_two(to_signed(unit.sent_data(session))?, true)?;
                Some(closest_multiple(count, k, true))
            }
            Extent::Batch { size } => Some(closest_multiple(count, size, true)),
        })
    }

    /// The stop condition. Never true while the session is visiting.
    pub fn should_stop(
        &self,
        session: &Session,
        unit: Unit,
        target: Option<u64>,
        elapsed_secs: f64,
    ) -> bool {
        if session.visiting() {
            return false;
        }
        match *self {
            Extent::Never => false,
            Extent::MinTime { seconds } => elapsed_secs >= seconds,
            Extent::Total | Extent::Payload | Extent::Batch { .. } => {
                let count = unit.sent(session);
                target.is_some_and(|t| count > 0 && count >= t)
            }
        }
    }
}

fn to_signed(count: u64) -> Result<i64, Error> {
    i64::try_from(count).map_err(|_| Error::InvalidArgument(format!("count {count} too large")))
}

/// The configuration of a padder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Delay, in seconds, before the next frame after sending data.
    pub burst: Histogram,
    /// Delay, in seconds, before the next frame after sending padding.
    pub gap: Histogram,
    /// Size, in bytes on the wire, of every shaped frame.
    pub length: Histogram,
    pub extent: Extent,
    #[serde(default)]
    pub unit: Unit,
}

impl Strategy {
    /// A strategy that sends one frame of `psize` bytes every `period`
    /// seconds.
    pub fn constant_rate(
        period: f64,
        psize: usize,
        extent: Extent,
        unit: Unit,
    ) -> Result<Self, Error> {
        if !(period > 0.0 && period.is_finite()) {
            Err(Error::InvalidArgument(format!(
                "period must be a positive number of seconds, got {period}"
            )))?;
        }
        let s = Strategy {
            burst: Histogram::uniform(period)?,
            gap: Histogram::uniform(period)?,
            length: Histogram::uniform(psize as f64)?,
            extent,
            unit,
        };
        s.validate()?;
        Ok(s)
    }

    /// Validates that the strategy can be run: the extent is valid and no
    /// frame length exceeds the MTU or leaves room for nothing but a header.
    pub fn validate(&self) -> Result<(), Error> {
        self.extent.validate()?;
        for label in self.length.labels() {
            let len = label.value();
            if label.is_infinity() {
                continue;
            }
            if len > MTU as f64 || len <= HDR_LEN as f64 {
                Err(Error::InvalidArgument(format!(
                    "frame length {len} outside of ({HDR_LEN}, {MTU}]"
                )))?;
            }
        }
        Ok(())
    }
}
