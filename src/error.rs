//! Error types for admission processing.
//!
//! Every error maps onto the status code reported in the admission response.
//! Policy violations are the expected outcome of a denied request rather than
//! an operational failure.

use thiserror::Error;

use crate::pipeline::Violation;
use crate::resources::ResolveError;

/// A rule rejected the object under admission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyViolation {
    /// Name of the failing rule
    pub rule: &'static str,
    /// Lowercased identity of the object
    pub target: String,
    pub violation: Violation,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed validation {} for {} - {}",
            self.rule, self.target, self.violation
        )?;
        if !self.violation.offenders().is_empty() {
            write!(f, " for containers {}", self.violation.offenders().join(","))?;
        }
        Ok(())
    }
}

impl std::error::Error for PolicyViolation {}

/// Error type for admission operations
#[derive(Error, Debug)]
pub enum Error {
    /// Envelope, request, request kind or object missing
    #[error("invalid request - {0}")]
    MalformedRequest(String),

    /// Request body is not a decodable admission review
    #[error("unable to decode the admission review: {0}")]
    Decode(#[from] serde_json::Error),

    /// No pod spec could be derived from the object
    #[error("error retrieving pod specification from object - {0}")]
    Resolve(#[from] ResolveError),

    /// A rule failed
    #[error("failed validation - {0}")]
    PolicyViolation(#[from] PolicyViolation),

    /// The admission response could not be built
    #[error("unable to build admission response: {0}")]
    ResponseSerialization(String),
}

impl Error {
    /// Status code reported for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::MalformedRequest(_) | Error::Decode(_) => 400,
            Error::PolicyViolation(_) => 403,
            Error::Resolve(_) | Error::ResponseSerialization(_) => 500,
        }
    }

    /// Whether this is a policy decision rather than a processing failure
    pub fn is_policy_violation(&self) -> bool {
        matches!(self, Error::PolicyViolation(_))
    }
}

/// Result type alias for admission operations
pub type Result<T> = std::result::Result<T, Error>;
