use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use wfpad::{Histogram, Strategy, Unit};

use crate::PaddingMode;
use crate::{adaptive, buflo, csbuflo, tamaraw};

/// The countermeasure a [`Config`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Buflo,
    Csbuflo,
    Tamaraw,
    Adaptive,
}

/// Strategy configuration of a transport. Parsed to/from TOML. Which keys are
/// required depends on the strategy:
///
/// - `buflo`: `period`, `psize`, `mintime`
/// - `csbuflo`: `period`, `psize`, `padding-mode`, optionally `unit`
///   (default `bytes`). Padding mode `batch` takes `psize`, `L` and `t`
///   instead and is Tamaraw
/// - `tamaraw`: `psize`, `L`, `t`
/// - `adaptive`: `psize`, `burst`, `gap`
///
/// Times are in seconds and sizes in bytes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct Config {
    pub strategy: StrategyKind,
    pub period: Option<f64>,
    pub psize: Option<usize>,
    pub padding_mode: Option<PaddingMode>,
    #[serde(rename = "L")]
    pub batch: Option<u64>,
    pub t: Option<f64>,
    pub mintime: Option<f64>,
    pub unit: Option<Unit>,
    pub burst: Option<Histogram>,
    pub gap: Option<Histogram>,
}

fn required<T: Copy>(value: Option<T>, key: &str, kind: StrategyKind) -> Result<T> {
    match value {
        Some(v) => Ok(v),
        None => bail!("missing '{}' for strategy {:?}", key, kind),
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&contents)?;
        log::debug!("loaded {:?} strategy from {}", config.strategy, path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Build and validate the configured strategy.
    pub fn to_strategy(&self) -> Result<Strategy> {
        let kind = self.strategy;
        let psize = required(self.psize, "psize", kind)?;
        let strategy = match kind {
            StrategyKind::Buflo => buflo::buflo(
                required(self.period, "period", kind)?,
                psize,
                required(self.mintime, "mintime", kind)?,
            )?,
            StrategyKind::Csbuflo => match required(self.padding_mode, "padding-mode", kind)? {
                PaddingMode::Batch => {
                    let mut s = tamaraw::tamaraw(
                        psize,
                        required(self.batch, "L", kind)?,
                        required(self.t, "t", kind)?,
                    )?;
                    if let Some(unit) = self.unit {
                        s.unit = unit;
                    }
                    s
                }
                mode => csbuflo::csbuflo(
                    required(self.period, "period", kind)?,
                    psize,
                    mode,
                    self.unit.unwrap_or(Unit::Bytes),
                )?,
            },
            StrategyKind::Tamaraw => tamaraw::tamaraw(
                psize,
                required(self.batch, "L", kind)?,
                required(self.t, "t", kind)?,
            )?,
            StrategyKind::Adaptive => {
                let (Some(burst), Some(gap)) = (&self.burst, &self.gap) else {
                    bail!("missing 'burst' or 'gap' histogram for strategy {:?}", kind);
                };
                adaptive::adaptive(burst.clone(), gap.clone(), psize)?
            }
        };
        Ok(strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wfpad::{Extent, Label};

    #[test]
    fn csbuflo_config() {
        let c = Config::from_toml(
            r#"
            strategy = "csbuflo"
            period = 0.01
            psize = 1448
            padding-mode = "payload"
            unit = "bytes"
            "#,
        )
        .unwrap();
        let s = c.to_strategy().unwrap();
        assert_eq!(s.extent, Extent::Payload);
        assert_eq!(s.unit, Unit::Bytes);

        // counts bytes unless told otherwise
        let c = Config::from_toml(
            r#"
            strategy = "csbuflo"
            period = 0.01
            psize = 1448
            padding-mode = "total"
            "#,
        )
        .unwrap();
        assert_eq!(c.to_strategy().unwrap().unit, Unit::Bytes);
    }

    #[test]
    fn csbuflo_batch_config() {
        let c = Config::from_toml(
            r#"
            strategy = "csbuflo"
            psize = 750
            padding-mode = "batch"
            L = 100
            t = 0.005
            "#,
        )
        .unwrap();
        assert_eq!(c.padding_mode, Some(PaddingMode::Batch));
        let s = c.to_strategy().unwrap();
        assert_eq!(s.extent, Extent::Batch { size: 100 });
        assert_eq!(s.unit, Unit::Messages);

        let c = Config::from_toml(
            "strategy = \"csbuflo\"\npsize = 750\npadding-mode = \"batch\"\nt = 0.005\n",
        )
        .unwrap();
        let err = c.to_strategy().unwrap_err();
        assert!(err.to_string().contains("'L'"), "{err}");
    }

    #[test]
    fn tamaraw_config() {
        let c = Config::from_toml(
            r#"
            strategy = "tamaraw"
            psize = 750
            L = 100
            t = 0.005
            "#,
        )
        .unwrap();
        assert_eq!(c.batch, Some(100));
        assert_eq!(
            c.to_strategy().unwrap().extent,
            Extent::Batch { size: 100 }
        );
    }

    #[test]
    fn adaptive_config() {
        let c = Config::from_toml(
            r#"
            strategy = "adaptive"
            psize = 1448

            [burst]
            labels = [0.005, 0.02, -1.0]
            counts = [10, 5, 1]
            interpolate = true
            remove-tokens = true

            [gap]
            labels = [0.05, -1.0]
            counts = [1, 3]
            "#,
        )
        .unwrap();
        let s = c.to_strategy().unwrap();
        assert_eq!(s.extent, Extent::Never);
        assert_eq!(
            s.burst.labels(),
            &[Label::Finite(5), Label::Finite(20), Label::Infinity]
        );
        assert!(s.burst.remove_tokens());
        assert!(!s.gap.interpolate());
    }

    #[test]
    fn missing_values() {
        let toml = "strategy = \"buflo\"\nperiod = 0.01\npsize = 1448\n";
        let c = Config::from_toml(toml).unwrap();
        let err = c.to_strategy().unwrap_err();
        assert!(err.to_string().contains("mintime"));

        let c = Config::from_toml("strategy = \"adaptive\"\npsize = 1448\n").unwrap();
        assert!(c.to_strategy().is_err());
    }

    #[test]
    fn invalid_values() {
        // unknown key
        assert!(Config::from_toml("strategy = \"buflo\"\nrho = 1\n").is_err());
        // unknown strategy
        assert!(Config::from_toml("strategy = \"wtfpad\"\n").is_err());
        // unknown padding mode
        let toml = "strategy = \"csbuflo\"\npadding-mode = \"power\"\n";
        assert!(Config::from_toml(toml).is_err());
        // histogram without tokens
        assert!(
            Config::from_toml(
                "strategy = \"adaptive\"\npsize = 1448\n[gap]\nlabels = [0.1]\ncounts = [0]\n"
            )
            .is_err()
        );
        // parses, but the strategy is invalid
        let toml = "strategy = \"tamaraw\"\npsize = 750\nL = 0\nt = 0.01\n";
        let c = Config::from_toml(toml).unwrap();
        assert!(c.to_strategy().is_err());
    }

    #[test]
    fn file_round_trip() {
        let c = Config::from_toml(
            "strategy = \"buflo\"\nperiod = 0.01\npsize = 1448\nmintime = 10.0\n",
        )
        .unwrap();
        let path = std::env::temp_dir().join(format!("wfpad-config-{}.toml", std::process::id()));
        c.save_to_file(&path).unwrap();
        let loaded = Config::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, c);
        assert!(Config::from_file(&path).is_err());
    }
}
