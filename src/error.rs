use thiserror::Error;

/// Error types for the curvefit-rs library.
#[derive(Error, Debug)]
pub enum FitError {
    /// Two sequences that must have the same length do not.
    #[error("Shape mismatch: {what} has length {actual}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The x or y data is empty.
    #[error("Empty data: x and y must contain at least one sample")]
    EmptyData,

    /// Fewer samples than parameters, so the reduced chi-square has no
    /// degrees of freedom.
    #[error("Underdetermined fit: {samples} samples for {parameters} parameters")]
    Underdetermined { samples: usize, parameters: usize },

    /// Parameter index out of range.
    #[error("Parameter index {index} out of range for {len} parameters")]
    IndexOutOfRange { index: usize, len: usize },

    /// Error indicating a mismatch in matrix dimensions.
    #[error("Matrix dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Error indicating a singular matrix was encountered.
    #[error("Singular matrix encountered")]
    SingularMatrix,

    /// Error during function evaluation.
    #[error("Function evaluation error: {0}")]
    FunctionEvaluation(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Malformed line in a data file.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Rendering a figure failed.
    #[error("Plot error: {0}")]
    Plot(String),

    /// Output file extension not handled by any backend.
    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for curvefit-rs operations.
pub type Result<T> = std::result::Result<T, FitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FitError::ShapeMismatch {
            what: "y",
            expected: 5,
            actual: 4,
        };
        assert!(format!("{}", err).contains("y has length 4, expected 5"));

        let err = FitError::Underdetermined {
            samples: 2,
            parameters: 3,
        };
        assert!(format!("{}", err).contains("2 samples for 3 parameters"));

        let err = FitError::IndexOutOfRange { index: 7, len: 3 };
        assert!(format!("{}", err).contains("index 7"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FitError = io_err.into();

        match err {
            FitError::Io(_) => (),
            _ => panic!("Expected Io variant"),
        }
    }
}
