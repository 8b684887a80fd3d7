use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use wfpad::{Strategy, Unit};

pub mod adaptive;
pub mod buflo;
pub mod config;
pub mod csbuflo;
pub mod tamaraw;

pub use crate::csbuflo::PaddingMode;

/// Static strategies are countermeasures fully described by a few numeric
/// parameters, and can be given as strings such as `"tamaraw 1448 100
/// 0.01"`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum StaticStrategy {
    /// BuFLO defense.
    Buflo {
        /// seconds between frames
        period: f64,
        /// frame size in bytes
        psize: usize,
        /// minimum padding time in seconds
        min_time: f64,
    },
    /// CS-BuFLO defense.
    Csbuflo {
        /// seconds between frames
        period: f64,
        /// frame size in bytes
        psize: usize,
        /// how much to pad after the visit
        mode: PaddingMode,
    },
    /// Tamaraw defense.
    Tamaraw {
        /// frame size in bytes
        psize: usize,
        /// pad the number of frames to a multiple of this
        l: u64,
        /// seconds between frames
        t: f64,
    },
}

fn parse_param<T: FromStr>(defense: &str, name: &str, value: &str) -> Result<T> {
    value
        .parse::<T>()
        .map_err(|_| anyhow::anyhow!("invalid {defense} defense parameter '{name}': {value}"))
}

impl FromStr for StaticStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.first().copied() {
            Some("buflo") => {
                if parts.len() != 4 {
                    bail!("invalid buflo defense: {}", s);
                }
                Ok(StaticStrategy::Buflo {
                    period: parse_param("buflo", "period", parts[1])?,
                    psize: parse_param("buflo", "psize", parts[2])?,
                    min_time: parse_param("buflo", "min_time", parts[3])?,
                })
            }
            Some("csbuflo") => {
                if parts.len() != 4 {
                    bail!("invalid csbuflo defense: {}", s);
                }
                let mode = parts[3].parse()?;
                if mode == PaddingMode::Batch {
                    bail!("csbuflo batch padding needs a batch size, use tamaraw: {}", s);
                }
                Ok(StaticStrategy::Csbuflo {
                    period: parse_param("csbuflo", "period", parts[1])?,
                    psize: parse_param("csbuflo", "psize", parts[2])?,
                    mode,
                })
            }
            Some("tamaraw") => {
                if parts.len() != 4 {
                    bail!("invalid tamaraw defense: {}", s);
                }
                Ok(StaticStrategy::Tamaraw {
                    psize: parse_param("tamaraw", "psize", parts[1])?,
                    l: parse_param("tamaraw", "l", parts[2])?,
                    t: parse_param("tamaraw", "t", parts[3])?,
                })
            }
            _ => bail!("unknown defense: {}", s),
        }
    }
}

impl fmt::Display for StaticStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaticStrategy::Buflo {
                period,
                psize,
                min_time,
            } => write!(f, "buflo {period} {psize} {min_time}"),
            StaticStrategy::Csbuflo {
                period,
                psize,
                mode,
            } => write!(f, "csbuflo {period} {psize} {mode}"),
            StaticStrategy::Tamaraw { psize, l, t } => write!(f, "tamaraw {psize} {l} {t}"),
        }
    }
}

/// Build the [`Strategy`] of a static strategy, validating its parameters.
pub fn get_strategy(s: &StaticStrategy) -> Result<Strategy> {
    let strategy = match *s {
        StaticStrategy::Buflo {
            period,
            psize,
            min_time,
        } => buflo::buflo(period, psize, min_time)?,
        StaticStrategy::Csbuflo {
            period,
            psize,
            mode,
        } => csbuflo::csbuflo(period, psize, mode, Unit::Bytes)?,
        StaticStrategy::Tamaraw { psize, l, t } => tamaraw::tamaraw(psize, l, t)?,
    };
    Ok(strategy)
}
