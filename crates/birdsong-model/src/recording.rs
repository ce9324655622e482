use thiserror::Error;

/// A pointer to one downloadable audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRef {
    pub source_url: String,
    /// Target name on disk, already passed through the sanitizer.
    pub suggested_filename: String,
}

/// A record on a provider page that cannot be turned into a [`RecordingRef`].
///
/// These are skipped by the fetch loop. Anything else (network, decode,
/// filesystem) is a different error type and propagates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("field '{field}' has the wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("no usable filename in '{0}'")]
    EmptyFilename(String),
}
