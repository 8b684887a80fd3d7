use wfpad::{Error, Extent, Histogram, Strategy, Unit};

/// Adaptive Padding from "Timing Analysis in Low-Latency Mix Networks:
/// Attacks and Defenses" by Shmatikov and Wang, ESORICS 2006. Delays come
/// from a burst histogram after real data and a gap histogram after padding;
/// drawing the infinity bin ends the padding run until the next data. Pads
/// until stopped.
pub fn adaptive(burst: Histogram, gap: Histogram, psize: usize) -> Result<Strategy, Error> {
    let s = Strategy {
        burst,
        gap,
        length: Histogram::uniform(psize as f64)?,
        extent: Extent::Never,
        unit: Unit::Messages,
    };
    s.validate()?;
    Ok(s)
}
