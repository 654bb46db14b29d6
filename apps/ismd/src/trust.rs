//! Trust token verification for remote wipe commands

use ism_errors::{Error, InstallError};
use ism_types::{TokenClaims, TrustVerifier, Uuid};
use serde::Deserialize;

/// Claims as they travel on the wire. The mesh transport authenticates and
/// unwraps the sealed envelope before the daemon sees it, so what arrives
/// here is the cleartext claim set.
#[derive(Deserialize)]
struct WireClaims {
    scope: String,
    node_id: Uuid,
}

/// Verifier for the JSON claim sets carried by wipe tokens.
pub struct ScopeTokenVerifier;

impl TrustVerifier for ScopeTokenVerifier {
    fn unseal(&self, token: &str) -> Result<TokenClaims, Error> {
        let wire: WireClaims =
            serde_json::from_str(token).map_err(|e| InstallError::TokenRejected {
                reason: format!("claims do not parse: {e}"),
            })?;
        Ok(TokenClaims {
            scope: wire.scope,
            node_id: wire.node_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_claims_unseal() {
        let node_id = Uuid::new_v4();
        let token = format!(r#"{{"scope":"plant-7","node_id":"{node_id}"}}"#);
        let claims = ScopeTokenVerifier.unseal(&token).unwrap();
        assert_eq!(claims.scope, "plant-7");
        assert_eq!(claims.node_id, node_id);
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let err = ScopeTokenVerifier.unseal("not json").unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::TokenRejected { .. })
        ));
    }
}
