use wfpad::{Error, Extent, Strategy, Unit};

/// Tamaraw from "A Systematic Approach to Developing and Evaluating Website
/// Fingerprinting Defenses" by Cai et al., CCS 2014. Sends fixed-size frames
/// of `psize` bytes, one every `t` seconds, and after the visit pads the
/// number of frames up to a multiple of `l`.
pub fn tamaraw(psize: usize, l: u64, t: f64) -> Result<Strategy, Error> {
    Strategy::constant_rate(t, psize, Extent::Batch { size: l }, Unit::Messages)
}
