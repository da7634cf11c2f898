//! Common error types for Tollgate components.

use thiserror::Error;

/// Errors produced by the Tollgate protocol engine.
///
/// Input-validation and authentication failures carry their own variants
/// so the route layer can reject them with a distinct wire code before any
/// expensive trapdoor work runs.
#[derive(Debug, Error)]
pub enum TollError {
    /// No site stored under the derived or presented api_key
    #[error("site not found: {0}")]
    NotFound(String),

    /// Presented api_secret is not valid base64url
    #[error("invalid api secret: {0}")]
    InvalidSecret(String),

    /// Missing or undecodable request field
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Proof field is not parseable hex; the payload names the field
    #[error("malformed proof field `{0}'")]
    MalformedProof(&'static str),

    /// MAC over the challenge base does not match
    #[error("signature mismatch for challenge base")]
    InvalidSignature,

    /// Proof was already redeemed
    #[error("proof already used")]
    AlreadyUsed,

    /// Solution is numerically wrong for every eligible epoch
    #[error("proof verification failed")]
    VerificationFailed,

    /// RSA prime generation failed
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Storage collaborator failure
    #[error("storage error: {0}")]
    Storage(String),
}

impl TollError {
    /// Returns true if retrying the same request could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::KeyGeneration(_))
    }
}
