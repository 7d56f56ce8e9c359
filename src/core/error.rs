//! Error types and result-code mapping.
//!
//! Every failure the aggregate manager can report maps onto a fixed GENI
//! result code. Taxonomy errors are encoded into the result envelope by the
//! lifecycle handler itself; faults (authorization failures and unexpected
//! internal errors) propagate to the public adapter, which encodes them with
//! the generic failure code.

use thiserror::Error;

/// Credential verification failure.
///
/// Raised by the credential gateway. Never recovered locally: the operation
/// aborts before touching any registry or catalog state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("authorization failed: {message}")]
pub struct AuthorizationError {
    /// Human-readable reason, including per-credential rejections.
    pub message: String,
}

impl AuthorizationError {
    /// Create an authorization error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Aggregate manager error conditions.
#[derive(Debug, Error)]
pub enum AmError {
    /// Missing or invalid option, malformed request document, mixed URN types.
    #[error("Bad Arguments: {message}")]
    BadArguments { message: String },

    /// Requested RSpec type or version is not supported.
    #[error("Bad Version: {message}")]
    BadVersion { message: String },

    /// Fewer available resources than requested.
    #[error("Too Big: insufficient resources to fulfill request ({requested} requested, {available} available)")]
    InsufficientResources { requested: usize, available: usize },

    /// Allocate on a slice URN that is already registered.
    #[error("Slice {slice_urn} already exists")]
    DuplicateSlice { slice_urn: String },

    /// Operation targets an unknown slice URN.
    #[error("Search Failed: no slice \"{slice_urn}\" found")]
    SearchFailed { slice_urn: String },

    /// Slice aggregated status is `shutdown`.
    #[error("Unavailable: Slice {slice_urn} is unavailable.")]
    Unavailable { slice_urn: String },

    /// Renewal requested beyond every authorizing credential or the lease bound.
    #[error("Out of range: {message}")]
    OutOfRange { message: String },

    /// Unimplemented path.
    #[error("Server Error: {message}")]
    ServerError { message: String },

    /// Credential verification failed.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    /// Unexpected internal fault.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl AmError {
    /// Create a BadArguments error.
    pub fn bad_arguments(message: impl Into<String>) -> Self {
        Self::BadArguments {
            message: message.into(),
        }
    }

    /// Create a BadVersion error.
    pub fn bad_version(message: impl Into<String>) -> Self {
        Self::BadVersion {
            message: message.into(),
        }
    }

    /// Create a SearchFailed error for the given slice.
    pub fn search_failed(slice_urn: impl Into<String>) -> Self {
        Self::SearchFailed {
            slice_urn: slice_urn.into(),
        }
    }

    /// Create an Unavailable error for the given slice.
    pub fn unavailable(slice_urn: impl Into<String>) -> Self {
        Self::Unavailable {
            slice_urn: slice_urn.into(),
        }
    }

    /// Create an OutOfRange error.
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange {
            message: message.into(),
        }
    }

    /// Create a ServerError.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self::ServerError {
            message: message.into(),
        }
    }

    /// Create an Internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Faults propagate out of the lifecycle handler instead of being encoded there.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Authorization(_) | Self::Internal { .. })
    }

    /// Map this error to its GENI result code.
    pub fn geni_code(&self) -> GeniCode {
        match self {
            Self::BadArguments { .. } => GeniCode::BadArgs,
            Self::BadVersion { .. } => GeniCode::BadVersion,
            Self::InsufficientResources { .. } => GeniCode::TooBig,
            Self::DuplicateSlice { .. } => GeniCode::AlreadyExists,
            Self::SearchFailed { .. } => GeniCode::SearchFailed,
            Self::Unavailable { .. } => GeniCode::Unavailable,
            Self::OutOfRange { .. } => GeniCode::OutOfRange,
            Self::ServerError { .. } => GeniCode::Error,
            Self::Authorization(_) | Self::Internal { .. } => GeniCode::GenericFailure,
        }
    }
}

/// Result type using AmError.
pub type AmResult<T> = Result<T, AmError>;

/// GENI AM API result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeniCode {
    Success = 0,
    BadArgs = 1,
    BadVersion = 4,
    Error = 5,
    TooBig = 6,
    Unavailable = 11,
    SearchFailed = 12,
    AlreadyExists = 17,
    OutOfRange = 19,
    /// Faults encoded by the public adapter.
    GenericFailure = 102,
}

impl GeniCode {
    /// Numeric code as carried on the wire.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up a code by its numeric value.
    pub fn from_i32(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Success,
            1 => Self::BadArgs,
            4 => Self::BadVersion,
            5 => Self::Error,
            6 => Self::TooBig,
            11 => Self::Unavailable,
            12 => Self::SearchFailed,
            17 => Self::AlreadyExists,
            19 => Self::OutOfRange,
            102 => Self::GenericFailure,
            _ => return None,
        })
    }
}

impl std::fmt::Display for GeniCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::BadArgs => "BADARGS",
            Self::BadVersion => "BADVERSION",
            Self::Error => "ERROR",
            Self::TooBig => "TOOBIG",
            Self::Unavailable => "UNAVAILABLE",
            Self::SearchFailed => "SEARCHFAILED",
            Self::AlreadyExists => "ALREADYEXISTS",
            Self::OutOfRange => "OUTOFRANGE",
            Self::GenericFailure => "GENERIC_FAILURE",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(AmError::bad_arguments("x").geni_code().as_i32(), 1);
        assert_eq!(AmError::bad_version("x").geni_code().as_i32(), 4);
        assert_eq!(AmError::server_error("x").geni_code().as_i32(), 5);
        assert_eq!(
            AmError::InsufficientResources {
                requested: 4,
                available: 3
            }
            .geni_code()
            .as_i32(),
            6
        );
        assert_eq!(AmError::unavailable("s").geni_code().as_i32(), 11);
        assert_eq!(AmError::search_failed("s").geni_code().as_i32(), 12);
        assert_eq!(
            AmError::DuplicateSlice {
                slice_urn: "s".into()
            }
            .geni_code()
            .as_i32(),
            17
        );
        assert_eq!(AmError::out_of_range("x").geni_code().as_i32(), 19);
    }

    #[test]
    fn test_faults() {
        let auth: AmError = AuthorizationError::new("no valid credential").into();
        assert!(auth.is_fault());
        assert_eq!(auth.geni_code(), GeniCode::GenericFailure);
        assert!(AmError::internal("boom").is_fault());
        assert!(!AmError::search_failed("s").is_fault());
    }

    #[test]
    fn test_code_lookup() {
        assert_eq!(GeniCode::from_i32(17), Some(GeniCode::AlreadyExists));
        assert_eq!(GeniCode::from_i32(3), None);
        assert_eq!(GeniCode::TooBig.to_string(), "TOOBIG");
    }

    #[test]
    fn test_messages() {
        let err = AmError::search_failed("urn:publicid:IDN+x+slice+a");
        assert_eq!(
            err.to_string(),
            "Search Failed: no slice \"urn:publicid:IDN+x+slice+a\" found"
        );
        let auth: AmError = AuthorizationError::new("expired").into();
        assert_eq!(auth.to_string(), "authorization failed: expired");
    }
}
