pub mod measure;
pub mod normalize;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error, PartialEq, Eq)]
    pub enum EngineError {
        #[error("circle tessellation needs at least 3 segments, got {0}")]
        InvalidCircleSegments(usize),
        #[error("curve tessellation needs at least 2 samples, got {0}")]
        InvalidCurveSamples(usize),
    }
}

pub use measure::{
    BoundingBox, Dimensions, MeasureOptions, MeasureReport, Measurement, RoundingMode, measure,
    measure_with,
};
pub use errors::EngineError;
pub use normalize::{NormalizeOptions, NormalizeReport, SkippedCurve, normalize_document};
