use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use wfpad::{Error, Extent, Strategy, Unit};

/// When CS-BuFLO stops padding after a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Pad the total transmission to a power of two.
    Total,
    /// Pad the transmission to a multiple of the power of two closest to the
    /// amount of payload.
    Payload,
    /// Pad the number of frames to a multiple of a fixed batch size, as
    /// Tamaraw does. Needs the batch size, see [`crate::tamaraw`].
    Batch,
}

impl FromStr for PaddingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "total" => Ok(PaddingMode::Total),
            "payload" => Ok(PaddingMode::Payload),
            "batch" => Ok(PaddingMode::Batch),
            _ => bail!("invalid padding mode '{}', expected total, payload or batch", s),
        }
    }
}

impl fmt::Display for PaddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaddingMode::Total => write!(f, "total"),
            PaddingMode::Payload => write!(f, "payload"),
            PaddingMode::Batch => write!(f, "batch"),
        }
    }
}

/// CS-BuFLO from "A Systematic Approach to Developing and Evaluating Website
/// Fingerprinting Defenses" by Cai et al., CCS 2014. Like BuFLO, but once
/// the visit is over it only pads up to a size that hides the exact length
/// of the transmission, per `mode`, counted in `unit`. The defense counts
/// bytes.
///
/// [`PaddingMode::Batch`] has no batch size here, use [`crate::tamaraw`].
pub fn csbuflo(
    period: f64,
    psize: usize,
    mode: PaddingMode,
    unit: Unit,
) -> Result<Strategy, Error> {
    let extent = match mode {
        PaddingMode::Total => Extent::Total,
        PaddingMode::Payload => Extent::Payload,
        PaddingMode::Batch => {
            return Err(Error::InvalidArgument(
                "batch padding needs a batch size".to_string(),
            ));
        }
    };
    Strategy::constant_rate(period, psize, extent, unit)
}
