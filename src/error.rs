use thiserror::Error;

/// Errors raised while reading an Arlequin file into a genotype table.
///
/// Every variant is fatal for the read that produced it. The soft outcomes
/// (no sample data, an all-monomorphic replicate) are reported as `Ok(None)`
/// instead.
#[derive(Error, Debug)]
pub enum ArpError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("table shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// A missing input file, or a chromosome or marker request that selects
    /// nothing.
    #[error("not found: {message}")]
    NotFound { message: String },

    /// The file and the locus metadata disagree.
    #[error("inconsistent input: {message}")]
    InconsistentInput { message: String },

    /// Rejected before any data is read.
    #[error("unsupported request: {message}")]
    UnsupportedRequest { message: String },
}

pub type Result<T, E = ArpError> = std::result::Result<T, E>;

impl ArpError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn inconsistent(message: impl Into<String>) -> Self {
        Self::InconsistentInput {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedRequest {
            message: message.into(),
        }
    }
}
