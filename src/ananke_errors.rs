use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnankeError {
    #[error("Invalid particle data: {0}")]
    Schema(String),

    #[error("Isochrone header error in {path}: {reason}")]
    HeaderFormat { path: String, reason: String },

    #[error("Isochrone data error in {path}: {reason}")]
    DataFormat { path: String, reason: String },

    #[error("Isochrone file name does not match 'output_<metallicity>.dat': {0}")]
    InvalidIsochroneFilename(String),

    #[error("Photometric system not found: {0}")]
    SystemNotFound(String),

    #[error("Metallicity {metallicity} outside isochrone coverage [{min}, {max}]")]
    MetallicityOutOfRange { metallicity: f64, min: f64, max: f64 },

    #[error("Star outside isochrone coverage: {0}")]
    Coverage(String),

    #[error("Survey engine failed ({status}): {stderr}")]
    EngineExecution { status: String, stderr: String },

    #[error("Survey engine timed out after {0:?}")]
    EngineTimeout(Duration),

    #[error("Unknown parameter file key: {0}")]
    UnknownParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Malformed exchange file {path}: {reason}")]
    ExchangeFormat { path: String, reason: String },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl PartialEq for AnankeError {
    fn eq(&self, other: &Self) -> bool {
        use AnankeError::*;
        match (self, other) {
            (Schema(a), Schema(b)) => a == b,
            (
                HeaderFormat {
                    path: pa,
                    reason: ra,
                },
                HeaderFormat {
                    path: pb,
                    reason: rb,
                },
            ) => pa == pb && ra == rb,
            (
                DataFormat {
                    path: pa,
                    reason: ra,
                },
                DataFormat {
                    path: pb,
                    reason: rb,
                },
            ) => pa == pb && ra == rb,
            (InvalidIsochroneFilename(a), InvalidIsochroneFilename(b)) => a == b,
            (SystemNotFound(a), SystemNotFound(b)) => a == b,
            (
                MetallicityOutOfRange {
                    metallicity: za,
                    min: mina,
                    max: maxa,
                },
                MetallicityOutOfRange {
                    metallicity: zb,
                    min: minb,
                    max: maxb,
                },
            ) => za == zb && mina == minb && maxa == maxb,
            (Coverage(a), Coverage(b)) => a == b,
            (
                EngineExecution {
                    status: sa,
                    stderr: ea,
                },
                EngineExecution {
                    status: sb,
                    stderr: eb,
                },
            ) => sa == sb && ea == eb,
            (EngineTimeout(a), EngineTimeout(b)) => a == b,
            (UnknownParameter(a), UnknownParameter(b)) => a == b,
            (InvalidParameter(a), InvalidParameter(b)) => a == b,
            (InvalidInput(a), InvalidInput(b)) => a == b,
            (
                ExchangeFormat {
                    path: pa,
                    reason: ra,
                },
                ExchangeFormat {
                    path: pb,
                    reason: rb,
                },
            ) => pa == pb && ra == rb,

            // not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}
