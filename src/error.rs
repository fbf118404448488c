//! Error types for the tabfit pipeline

use thiserror::Error;

/// Result type alias for tabfit operations
pub type Result<T> = std::result::Result<T, TabfitError>;

/// Broad failure category, used to decide whether a failure aborts a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad configuration: unknown family, malformed grid, empty search space
    Configuration,
    /// Bad data: schema or dimension mismatches, too few rows
    Data,
    /// A single fit that failed numerically; recoverable inside a search
    Numerical,
    /// Worker pool or budget exhaustion
    Resource,
    /// Filesystem and (de)serialization failures
    Io,
}

/// Main error type for tabfit
#[derive(Error, Debug)]
pub enum TabfitError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown model family: {0}")]
    UnknownModelFamily(String),

    #[error("Empty search space for family {0}")]
    EmptySearchSpace(String),

    #[error("No candidate model families configured")]
    NoCandidateFamilies,

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Schema mismatch: expected columns {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Insufficient data: {folds} folds requested but only {rows} rows available")]
    InsufficientData { folds: usize, rows: usize },

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    NotFitted,

    #[error("Numerical error: {0}")]
    NumericalError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("No candidate of family {0} produced a finite score")]
    NoViableCandidate(String),

    #[error("Resource error: {0}")]
    ResourceError(String),

    #[error("Family {family} failed: {source}")]
    Family {
        family: String,
        #[source]
        source: Box<TabfitError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TabfitError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TabfitError::ConfigError(_)
            | TabfitError::UnknownModelFamily(_)
            | TabfitError::EmptySearchSpace(_)
            | TabfitError::NoCandidateFamilies => ErrorKind::Configuration,
            TabfitError::DataError(_)
            | TabfitError::SchemaMismatch { .. }
            | TabfitError::InsufficientData { .. }
            | TabfitError::LengthMismatch { .. }
            | TabfitError::ShapeError { .. }
            | TabfitError::FeatureNotFound(_)
            | TabfitError::NotFitted => ErrorKind::Data,
            TabfitError::NumericalError(_)
            | TabfitError::InvalidParameter { .. }
            | TabfitError::NoViableCandidate(_) => ErrorKind::Numerical,
            TabfitError::ResourceError(_) => ErrorKind::Resource,
            TabfitError::IoError(_) | TabfitError::SerializationError(_) => ErrorKind::Io,
            TabfitError::Family { source, .. } => source.kind(),
        }
    }

    /// Whether a single candidate fit failing with this error may be scored
    /// as the worst value instead of aborting the search
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TabfitError::NumericalError(_) | TabfitError::InvalidParameter { .. }
        )
    }

    /// Attach the name of the model family this error came from
    pub fn in_family(self, family: impl Into<String>) -> Self {
        TabfitError::Family {
            family: family.into(),
            source: Box::new(self),
        }
    }
}

impl From<polars::error::PolarsError> for TabfitError {
    fn from(err: polars::error::PolarsError) -> Self {
        TabfitError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for TabfitError {
    fn from(err: serde_json::Error) -> Self {
        TabfitError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for TabfitError {
    fn from(err: bincode::Error) -> Self {
        TabfitError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for TabfitError {
    fn from(err: toml::de::Error) -> Self {
        TabfitError::ConfigError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for TabfitError {
    fn from(err: ndarray::ShapeError) -> Self {
        TabfitError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
