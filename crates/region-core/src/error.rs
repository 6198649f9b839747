//! Error taxonomy for the regionalization engine.
//!
//! Both error families abort the requesting operation; nothing partial is
//! returned. Non-convergence is not an error and lives on
//! [`ClusterModel::warnings`](crate::cluster::ClusterModel::warnings).

use thiserror::Error;

/// Malformed or unusable input data.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    #[error("grid has zero cells ({width}×{height})")]
    EmptyGrid { width: usize, height: usize },

    #[error("grid dimensions {width}×{height} overflow the cell count")]
    GridTooLarge { width: usize, height: usize },

    #[error("grid has no bands")]
    NoBands,

    #[error("band {band:?} has {found} cells, expected {expected}")]
    BandShapeMismatch { band: String, expected: usize, found: usize },

    #[error("band name {0:?} is used more than once")]
    DuplicateBand(String),

    #[error("band name at position {0} is empty")]
    UnnamedBand(usize),

    #[error("band {0:?} holds no valid cells")]
    AllNoDataBand(String),

    #[error("band {band:?} is constant ({value}); standard deviation is zero")]
    ConstantBand { band: String, value: f64 },

    #[error("grid has no valid cells: every cell is no-data in at least one band")]
    NoValidCells,

    #[error("k = {k} exceeds the {available} valid cells available for fitting")]
    TooManyClusters { k: usize, available: usize },

    #[error("feature matrix has {found} columns, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("band {band:?} missing from grid; fitted bands are {expected:?}")]
    MissingBand { band: String, expected: Vec<String> },

    #[error("assignment covers {found} cells, grid has {expected}")]
    AssignmentShape { expected: usize, found: usize },

    #[error("cell {cell} assigned to cluster {index}, but the label table has {k} entries")]
    UnknownCluster { cell: usize, index: usize, k: usize },

    #[error("malformed grid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Parameter values that can never produce a model.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("max_clusters must be at least 1, got {0}")]
    MaxClusters(usize),

    #[error("chosen_clusters must be at least 1, got {0}")]
    ChosenClusters(usize),

    #[error("restarts must be at least 1, got {0}")]
    Restarts(usize),

    #[error("sample_size must be positive, got {0}")]
    SampleSize(usize),

    #[error("max_iterations must be positive, got {0}")]
    MaxIterations(usize),

    #[error("reference band {name:?} not found; bands are {available:?}")]
    ReferenceBandName { name: String, available: Vec<String> },

    #[error("reference band index {index} out of range for {n_bands} bands")]
    ReferenceBandIndex { index: usize, n_bands: usize },

    #[error("no cluster count chosen; review the elbow series and set chosen_clusters")]
    NoChosenClusters,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, Error>;
