use thiserror::Error;

/// Outcomes of a punch that did not change the stored record.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PunchError {
    #[error("already checked in for this day")]
    AlreadyCheckedIn,
    #[error("already checked out for this day")]
    AlreadyCheckedOut,
    #[error("check-out is 24 hours or more after the open check-in")]
    ShiftTooLong,
    #[error("no check-in recorded for this day")]
    NotCheckedInYet,
    #[error("no face enrollment registered for this user")]
    NoEnrollment,
    #[error("no face detected in the submitted image")]
    NoFaceDetected,
    #[error("face did not match the enrollment (score {score:.2}%)")]
    MatchRejected { score: f64 },
    #[error("feature vector dimension mismatch: enrolled {enrolled}, sample {sample}")]
    DimensionMismatch { enrolled: usize, sample: usize },
    #[error("enrollment was extracted with model {enrolled}, sample with {sample}")]
    EnrollmentModelMismatch { enrolled: String, sample: String },
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("face feature extraction timed out")]
    ExtractionTimeout,
    #[error("face extractor unavailable: {0}")]
    ExtractorUnavailable(String),
    #[error("invalid correction: {0}")]
    InvalidCorrection(String),
    #[error("attendance store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record was modified concurrently")]
    VersionConflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for PunchError {
    fn from(err: StoreError) -> Self {
        PunchError::StoreUnavailable(err.to_string())
    }
}
