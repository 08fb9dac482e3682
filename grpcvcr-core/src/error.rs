use std::fmt;
use std::path::PathBuf;

/// All error types produced by the grpcvcr library.
///
/// Transport-level gRPC errors (a recorded episode's status) are
/// deliberately not part of this hierarchy: they are reproduced through
/// [`tonic::Status`] on the synthesized call objects, not raised here.
#[derive(Debug)]
pub enum VcrError {
    /// `record_mode == NONE` and the cassette file does not exist.
    CassetteNotFound(PathBuf),

    /// Recording is expected but the flow found no match and cannot record.
    NoMatchingInteraction {
        method: String,
        body: Vec<u8>,
        available_methods: Vec<String>,
    },

    /// A replay-only cassette found no matching episode for a live request.
    RecordingDisabled(String),

    /// `save()` failed to write the cassette file.
    CassetteWriteFailure {
        path: PathBuf,
        cause: std::io::Error,
    },

    /// The codec could not parse or emit a cassette document.
    SerializationFailure {
        message: String,
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for VcrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcrError::CassetteNotFound(path) => {
                write!(f, "cassette not found: {}", path.display())
            }
            VcrError::NoMatchingInteraction {
                method,
                available_methods,
                ..
            } => write!(
                f,
                "no matching interaction for {method} (cassette has: {})",
                available_methods.join(", ")
            ),
            VcrError::RecordingDisabled(method) => {
                write!(f, "recording disabled: no recorded episode for {method}")
            }
            VcrError::CassetteWriteFailure { path, cause } => {
                write!(f, "failed to write cassette {}: {cause}", path.display())
            }
            VcrError::SerializationFailure { message, .. } => {
                write!(f, "cassette serialization failure: {message}")
            }
        }
    }
}

impl std::error::Error for VcrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VcrError::CassetteWriteFailure { cause, .. } => Some(cause),
            VcrError::SerializationFailure { cause: Some(c), .. } => Some(c.as_ref()),
            _ => None,
        }
    }
}

/// Convenience type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VcrError>;
