use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read transaction log: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("dataset is empty: {0}")]
    EmptyDataset(&'static str),

    /// Raised when a split or a fit would see only one label value.
    #[error("labels contain a single class, {0} required")]
    SingleClass(&'static str),

    #[error("invalid booster parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Linfa(#[from] linfa::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_message_fits_rows_and_columns() {
        let err = PipelineError::ShapeMismatch {
            expected: 4,
            actual: 3,
        };
        assert_eq!(err.to_string(), "shape mismatch: expected 4, got 3");
    }
}
