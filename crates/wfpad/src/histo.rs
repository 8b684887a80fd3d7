//! Histograms of token counts used to sample delays and frame lengths.
//!
//! A [`Histogram`] maps labels, the right-open upper bounds of its bins, to
//! the number of tokens left in each bin. Sampling picks a bin with
//! probability proportional to its tokens. With token removal enabled every
//! draw consumes a token, and once all tokens are gone the histogram refills
//! itself from the counts it was created with.

use rand::Rng;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Error;
use crate::constants::{INF_LABEL, LABEL_PRECISION};

/// The upper bound of a histogram bin.
///
/// Finite labels are stored in thousandths (milliseconds for delays). The
/// infinity label always sorts after every finite label. In serialized form a
/// label is a number and any negative number denotes infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum Label {
    Finite(u64),
    Infinity,
}

impl Label {
    /// The value of the label, [`f64::INFINITY`] for the infinity label.
    pub fn value(&self) -> f64 {
        match *self {
            Label::Finite(thousandths) => thousandths as f64 / LABEL_PRECISION,
            Label::Infinity => f64::INFINITY,
        }
    }

    pub fn is_infinity(&self) -> bool {
        *self == Label::Infinity
    }
}

/// Scales a value to thousandths, truncating anything finer but tolerating
/// the representation error of values like 0.29.
fn to_thousandths(value: f64) -> u64 {
    let scaled = value * LABEL_PRECISION;
    let rounded = scaled.round();
    if (scaled - rounded).abs() < 1e-6 {
        rounded as u64
    } else {
        scaled.trunc() as u64
    }
}

impl TryFrom<f64> for Label {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value.is_nan() {
            Err(Error::Histogram("label is not a number".to_string()))?;
        }
        if value < 0.0 || value.is_infinite() {
            return Ok(Label::Infinity);
        }
        Ok(Label::Finite(to_thousandths(value)))
    }
}

impl From<Label> for f64 {
    fn from(label: Label) -> Self {
        match label {
            Label::Finite(_) => label.value(),
            Label::Infinity => INF_LABEL,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Finite(_) => write!(f, "{}", self.value()),
            Label::Infinity => write!(f, "inf"),
        }
    }
}

/// The serialized form of a [`Histogram`]: its bins and sampling flags.
/// Counts are those of a fresh histogram (the template).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramConfig {
    pub labels: Vec<Label>,
    pub counts: Vec<u64>,
    #[serde(default)]
    pub interpolate: bool,
    #[serde(default, rename = "remove-tokens")]
    pub remove_tokens: bool,
}

/// A histogram of tokens to sample values from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HistogramConfig", into = "HistogramConfig")]
pub struct Histogram {
    labels: Vec<Label>,
    counts: Vec<u64>,
    template: Vec<u64>,
    total: u64,
    interpolate: bool,
    remove_tokens: bool,
}

impl Histogram {
    /// Create a new histogram from parallel vectors of labels and counts.
    /// Labels may be given in any order. There must be at least one bin, no
    /// label may repeat, and the counts must add up to more than zero.
    pub fn new(
        labels: Vec<Label>,
        counts: Vec<u64>,
        interpolate: bool,
        remove_tokens: bool,
    ) -> Result<Self, Error> {
        if labels.is_empty() {
            Err(Error::Histogram("no bins".to_string()))?;
        }
        if labels.len() != counts.len() {
            Err(Error::Histogram(format!(
                "{} labels but {} counts",
                labels.len(),
                counts.len()
            )))?;
        }

        let mut bins: Vec<(Label, u64)> = labels.into_iter().zip(counts).collect();
        bins.sort_by_key(|(label, _)| *label);
        if let Some(w) = bins.windows(2).find(|w| w[0].0 == w[1].0) {
            Err(Error::Histogram(format!("duplicate label {}", w[0].0)))?;
        }

        let total = bins
            .iter()
            .try_fold(0u64, |acc, (_, c)| acc.checked_add(*c))
            .ok_or_else(|| Error::Histogram("token count overflows".to_string()))?;
        if total == 0 {
            Err(Error::Histogram("no tokens".to_string()))?;
        }

        let (labels, counts): (Vec<Label>, Vec<u64>) = bins.into_iter().unzip();
        Ok(Self {
            labels,
            template: counts.clone(),
            counts,
            total,
            interpolate,
            remove_tokens,
        })
    }

    /// A histogram that always samples `value`. A negative value gives a
    /// histogram that always samples infinity.
    pub fn uniform(value: f64) -> Result<Self, Error> {
        Self::new(vec![Label::try_from(value)?], vec![1], false, false)
    }

    /// Draw a value. The chosen bin loses a token if token removal is
    /// enabled. Returns [`f64::INFINITY`] when the infinity bin is drawn.
    pub fn sample<R: RngCore>(&mut self, rng: &mut R) -> f64 {
        let draw = if self.total == 0 {
            0
        } else {
            rng.random_range(1..=self.total)
        };

        let mut bin = self.labels.len() - 1;
        let mut cumulative = 0;
        for (i, count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= draw {
                bin = i;
                break;
            }
        }

        let value = self.value_in(bin, rng);
        if self.remove_tokens {
            self.take_token(bin);
        }
        value
    }

    /// Remove a token from the bin that `value` falls in. If that bin is
    /// empty, the token is taken from the closest non-empty bin to the left,
    /// or failing that to the right. A no-op unless token removal is
    /// enabled.
    pub fn remove_token(&mut self, value: f64) {
        if !self.remove_tokens {
            return;
        }
        let bin = self.bin_of(value);
        self.take_token(bin);
    }

    /// Restore all counts from the template.
    pub fn refill(&mut self) {
        self.counts.copy_from_slice(&self.template);
        self.total = self.template.iter().sum();
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Tokens left per bin, in label order.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Counts the histogram was created with, in label order.
    pub fn template(&self) -> &[u64] {
        &self.template
    }

    /// Tokens left in total.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn interpolate(&self) -> bool {
        self.interpolate
    }

    pub fn remove_tokens(&self) -> bool {
        self.remove_tokens
    }

    fn value_in<R: RngCore>(&self, bin: usize, rng: &mut R) -> f64 {
        let upper = self.labels[bin].value();
        if !self.interpolate || upper.is_infinite() {
            return upper;
        }
        let lower = if bin == 0 {
            0.0
        } else {
            self.labels[bin - 1].value()
        };
        lower + (upper - lower) * rng.random::<f64>()
    }

    fn bin_of(&self, value: f64) -> usize {
        let last = self.labels.len() - 1;
        if value.is_nan() || value.is_infinite() {
            return last;
        }
        if !self.interpolate {
            if let Ok(label) = Label::try_from(value) {
                if let Ok(i) = self.labels.binary_search(&label) {
                    return i;
                }
            }
        }
        // right-open bins: the first label strictly above the value
        self.labels
            .partition_point(|l| l.value() <= value)
            .min(last)
    }

    fn take_token(&mut self, bin: usize) {
        let counts = &self.counts;
        let bin = if counts[bin] > 0 {
            Some(bin)
        } else {
            (0..bin)
                .rev()
                .find(|&i| counts[i] > 0)
                .or_else(|| (bin + 1..counts.len()).find(|&i| counts[i] > 0))
        };
        let Some(bin) = bin else {
            self.refill();
            return;
        };

        self.counts[bin] -= 1;
        self.total -= 1;
        if self.total == 0 {
            log::trace!(
                "histogram depleted, refilling {} tokens",
                self.template.iter().sum::<u64>()
            );
            self.refill();
        }
    }
}

impl TryFrom<HistogramConfig> for Histogram {
    type Error = Error;

    fn try_from(config: HistogramConfig) -> Result<Self, Self::Error> {
        Histogram::new(config.labels, config.counts, config.interpolate, config.remove_tokens)
    }
}

impl From<Histogram> for HistogramConfig {
    fn from(h: Histogram) -> Self {
        HistogramConfig {
            labels: h.labels,
            counts: h.template,
            interpolate: h.interpolate,
            remove_tokens: h.remove_tokens,
        }
    }
}
