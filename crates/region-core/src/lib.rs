//! Regionalization engine for co-registered raster covariates.
//!
//! Cells of a multi-band [`Grid`] are standardized, grouped by seeded
//! multi-start k-means, and written back as a categorical [`RegionGrid`]
//! whose labels are ordered by one reference band.
//!
//! ```rust
//! use region_core::{Band, Grid, RegionConfig, Regionalizer};
//!
//! let stock = vec![1.0, 1.1, 9.0, 9.2];
//! let rate = vec![2.0, 2.1, 7.0, 7.3];
//! let grid = Grid::new(2, 2, vec![Band::new("stock", stock), Band::new("rate", rate)]).unwrap();
//!
//! let r = Regionalizer::new(RegionConfig { restarts: 4, ..Default::default() }).unwrap();
//! let result = r.regionalize_with(&grid, 2).unwrap();
//! assert_eq!(result.regions.labels, vec![Some(2), Some(2), Some(1), Some(1)]);
//! ```

pub mod classify;
pub mod cluster;
pub mod config;
pub mod elbow;
pub mod error;
pub mod grid;
pub mod labels;
pub mod normalize;
pub mod pipeline;

pub use classify::{classify, classify_with_stats, RegionGrid};
pub use cluster::{ClusterModel, KMeans, NonConvergence};
pub use config::{NormalizeMode, ReferenceBand, RegionConfig, StdConvention};
pub use elbow::{ElbowPoint, ElbowSeries, ElbowSweep, KneeLocator, MaxDistanceKnee};
pub use error::{ConfigurationError, Error, InvalidInputError, Result};
pub use grid::{Band, Extent, Grid};
pub use labels::LabelLut;
pub use normalize::{BandStats, NormalizedGrid, Normalizer};
pub use pipeline::{ModelReport, RegionResult, Regionalizer};
