use jsonwebtoken::{decode, decode_header, jwk::Jwk, Algorithm, DecodingKey, Validation};
use tracing::{debug, warn};

use super::{claims::AuthClaims, error::AuthError, jwks::KeySet};
use crate::config::AuthConfig;

/// Checks bearer tokens against the trusted key set and a required permission.
pub struct TokenVerifier {
    keys: KeySet,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(keys: KeySet, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        Self { keys, validation }
    }

    pub fn from_config(cfg: &AuthConfig) -> anyhow::Result<Self> {
        let keys = match &cfg.jwks_file {
            Some(path) => KeySet::from_file(path)?,
            None => KeySet::remote(cfg.jwks_url.clone(), cfg.jwks_timeout, cfg.jwks_max_age)?,
        };
        Ok(Self::new(keys, &cfg.issuer(), &cfg.audience))
    }

    /// Validate the raw `Authorization` header value and require `permission`.
    pub async fn verify(
        &self,
        authorization: Option<&str>,
        permission: &str,
    ) -> Result<AuthClaims, AuthError> {
        let token = bearer_token(authorization)?;
        let kid = key_id(token)?;
        let jwk = self.keys.find(&kid).await.map_err(|e| {
            warn!(%kid, error = %e, "no signing key for token");
            e
        })?;
        self.verify_with_key(token, &jwk, permission)
    }

    /// Signature, claims and permission checks against an already selected key.
    pub fn verify_with_key(
        &self,
        token: &str,
        jwk: &Jwk,
        permission: &str,
    ) -> Result<AuthClaims, AuthError> {
        let key = DecodingKey::from_jwk(jwk).map_err(|_| AuthError::UnknownKey)?;
        let claims = decode::<AuthClaims>(token, &key, &self.validation)
            .map_err(|e| {
                debug!(error = %e, "token rejected");
                AuthError::from(e)
            })?
            .claims;
        check_permission(&claims, permission)?;
        debug!(sub = %claims.sub, iss = %claims.iss, exp = claims.exp, %permission, "token verified");
        Ok(claims)
    }
}

/// Extract the token from `Bearer <token>`.
pub fn bearer_token(authorization: Option<&str>) -> Result<&str, AuthError> {
    let header = authorization.ok_or(AuthError::MissingHeader)?;
    let parts: Vec<&str> = header.split_whitespace().collect();
    match parts.as_slice() {
        [] => Err(AuthError::NotBearer),
        [scheme, ..] if !scheme.eq_ignore_ascii_case("bearer") => Err(AuthError::NotBearer),
        [_] => Err(AuthError::TokenNotFound),
        [_, token] => Ok(*token),
        _ => Err(AuthError::MalformedHeader),
    }
}

fn key_id(token: &str) -> Result<String, AuthError> {
    let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
    header.kid.ok_or(AuthError::MissingKeyId)
}

pub fn check_permission(claims: &AuthClaims, permission: &str) -> Result<(), AuthError> {
    if claims.permissions.is_none() {
        return Err(AuthError::MissingPermissions);
    }
    if claims.has_permission(permission) {
        Ok(())
    } else {
        warn!(sub = %claims.sub, %permission, "permission not granted");
        Err(AuthError::PermissionDenied)
    }
}
