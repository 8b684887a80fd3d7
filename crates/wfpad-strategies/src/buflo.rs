use wfpad::{Error, Extent, Strategy, Unit};

/// BuFLO from "Peek-a-Boo, I Still See You: Why Efficient Traffic Analysis
/// Countermeasures Fail" by Dyer et al., S&P 2012. Sends a frame of `psize`
/// bytes every `period` seconds for the whole visit, and keeps going until at
/// least `min_time` seconds have passed since the visit started.
pub fn buflo(period: f64, psize: usize, min_time: f64) -> Result<Strategy, Error> {
    Strategy::constant_rate(
        period,
        psize,
        Extent::MinTime { seconds: min_time },
        Unit::Messages,
    )
}
