//! Run configuration shared by the library and the CLI.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, Result};
use crate::grid::Grid;

/// Which parts of the standardization are applied per band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NormalizeMode {
    /// (x − μ) / σ
    #[default]
    CenterAndScale,
    /// x − μ
    CenterOnly,
    /// x / σ
    ScaleOnly,
}

impl NormalizeMode {
    pub fn centers(self) -> bool {
        matches!(self, Self::CenterAndScale | Self::CenterOnly)
    }

    pub fn scales(self) -> bool {
        matches!(self, Self::CenterAndScale | Self::ScaleOnly)
    }
}

/// Denominator used for the standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StdConvention {
    /// Divide by n − 1.
    #[default]
    Sample,
    /// Divide by n.
    Population,
}

/// Band used to put cluster labels in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceBand {
    Index(usize),
    Name(String),
}

impl Default for ReferenceBand {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl ReferenceBand {
    /// Resolve against the grid's band list.
    pub fn resolve(&self, grid: &Grid) -> Result<usize> {
        self.resolve_names(&grid.band_names())
    }

    pub fn resolve_names(&self, names: &[String]) -> Result<usize> {
        match self {
            Self::Index(index) if *index < names.len() => Ok(*index),
            Self::Index(index) => Err(ConfigurationError::ReferenceBandIndex {
                index: *index,
                n_bands: names.len(),
            }
            .into()),
            Self::Name(name) => names.iter().position(|n| n == name).ok_or_else(|| {
                ConfigurationError::ReferenceBandName { name: name.clone(), available: names.to_vec() }.into()
            }),
        }
    }
}

impl std::str::FromStr for ReferenceBand {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(i) => Self::Index(i),
            Err(_) => Self::Name(s.to_string()),
        })
    }
}

/// Every recognized option. Missing JSON keys take the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    pub normalize: NormalizeMode,
    pub std_convention: StdConvention,
    /// Upper end of the elbow sweep (k = 1..=max_clusters).
    pub max_clusters: usize,
    /// Operator choice after reviewing the elbow series.
    pub chosen_clusters: Option<usize>,
    /// Cells drawn to fit centers.
    pub sample_size: usize,
    /// Independent k-means starts per fit.
    pub restarts: usize,
    /// Lloyd iteration cap per start.
    pub max_iterations: usize,
    pub seed: u64,
    pub reference_band: ReferenceBand,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeMode::default(),
            std_convention: StdConvention::default(),
            max_clusters: 10,
            chosen_clusters: None,
            sample_size: 10_000,
            restarts: 25,
            max_iterations: 100,
            seed: 42,
            reference_band: ReferenceBand::default(),
        }
    }
}

impl RegionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_clusters < 1 {
            return Err(ConfigurationError::MaxClusters(self.max_clusters).into());
        }
        if let Some(k) = self.chosen_clusters {
            if k < 1 {
                return Err(ConfigurationError::ChosenClusters(k).into());
            }
        }
        if self.restarts < 1 {
            return Err(ConfigurationError::Restarts(self.restarts).into());
        }
        if self.sample_size == 0 {
            return Err(ConfigurationError::SampleSize(self.sample_size).into());
        }
        if self.max_iterations == 0 {
            return Err(ConfigurationError::MaxIterations(self.max_iterations).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn partial_json_takes_defaults() {
        let cfg: RegionConfig =
            serde_json::from_str(r#"{"normalize":"center-only","reference_band":"rate","seed":7}"#).unwrap();
        assert_eq!(cfg.normalize, NormalizeMode::CenterOnly);
        assert_eq!(cfg.reference_band, ReferenceBand::Name("rate".into()));
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.restarts, 25);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_restarts_is_a_configuration_error() {
        let cfg = RegionConfig { restarts: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::Configuration(ConfigurationError::Restarts(0)))));
    }

    #[test]
    fn zero_sample_size_and_max_clusters_are_rejected() {
        let cfg = RegionConfig { sample_size: 0, ..Default::default() };
        assert!(cfg.validate().is_err());
        let cfg = RegionConfig { max_clusters: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::Configuration(ConfigurationError::MaxClusters(0)))));
    }

    #[test]
    fn reference_band_resolves_by_name_and_index() {
        let names = vec!["stock".to_string(), "rate".to_string()];
        assert_eq!(ReferenceBand::Name("rate".into()).resolve_names(&names).unwrap(), 1);
        assert_eq!("0".parse::<ReferenceBand>().unwrap().resolve_names(&names).unwrap(), 0);
        assert!(matches!(
            ReferenceBand::Name("depth".into()).resolve_names(&names),
            Err(Error::Configuration(ConfigurationError::ReferenceBandName { .. }))
        ));
        assert!(matches!(
            ReferenceBand::Index(2).resolve_names(&names),
            Err(Error::Configuration(ConfigurationError::ReferenceBandIndex { index: 2, n_bands: 2 }))
        ));
    }
}
