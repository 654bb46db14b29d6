//! Trust-token seam
//!
//! Tokens are opaque encrypted blobs issued by a provisioning peer. The
//! cryptography lives outside this subsystem; implementations of
//! [`TrustVerifier`] unseal a token into its claims, and callers compare the
//! claims against the node's own identity before acting.

use ism_errors::Error;
use uuid::Uuid;

/// Claims recovered from a trust token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    /// Trust scope the token was issued under.
    pub scope: String,
    /// Node the token targets.
    pub node_id: Uuid,
}

/// Decrypts and authenticates trust tokens. Implemented by the node's
/// security layer.
pub trait TrustVerifier: Send + Sync {
    /// Unseal a token into its claims.
    ///
    /// # Errors
    ///
    /// Returns an error when the token cannot be decrypted or fails
    /// authentication; callers refuse the requested action in that case.
    fn unseal(&self, token: &str) -> Result<TokenClaims, Error>;
}
