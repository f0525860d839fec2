use axum::http::StatusCode;
use thiserror::Error;

/// Reason a bearer token was refused. Each variant carries a fixed status,
/// a machine-readable code and a description for the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is expected.")]
    MissingHeader,
    #[error("Authorization header must start with \"Bearer\".")]
    NotBearer,
    #[error("Token not found.")]
    TokenNotFound,
    #[error("Authorization header must be bearer token.")]
    MalformedHeader,
    #[error("Authorization malformed.")]
    MissingKeyId,
    #[error("Unable to parse authentication token.")]
    MalformedToken,
    #[error("Unable to find the appropriate key.")]
    UnknownKey,
    #[error("Token expired.")]
    Expired,
    #[error("Incorrect claims. Please, check the audience and issuer.")]
    InvalidClaims,
    #[error("Permissions not included in JWT.")]
    MissingPermissions,
    #[error("Permission not found.")]
    PermissionDenied,
    #[error("Unable to load signing keys.")]
    KeySetUnavailable,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingHeader
            | AuthError::NotBearer
            | AuthError::TokenNotFound
            | AuthError::MalformedHeader
            | AuthError::MissingKeyId
            | AuthError::Expired
            | AuthError::InvalidClaims => StatusCode::UNAUTHORIZED,
            AuthError::MalformedToken | AuthError::UnknownKey | AuthError::MissingPermissions => {
                StatusCode::BAD_REQUEST
            }
            AuthError::PermissionDenied => StatusCode::FORBIDDEN,
            AuthError::KeySetUnavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "authorization_header_missing",
            AuthError::NotBearer
            | AuthError::TokenNotFound
            | AuthError::MalformedHeader
            | AuthError::MissingKeyId
            | AuthError::MalformedToken
            | AuthError::UnknownKey => "invalid_header",
            AuthError::Expired => "token_expired",
            AuthError::InvalidClaims | AuthError::MissingPermissions => "invalid_claims",
            AuthError::PermissionDenied => "unauthorized",
            AuthError::KeySetUnavailable => "jwks_unavailable",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidIssuer | ErrorKind::InvalidAudience | ErrorKind::MissingRequiredClaim(_) => {
                AuthError::InvalidClaims
            }
            _ => AuthError::MalformedToken,
        }
    }
}
