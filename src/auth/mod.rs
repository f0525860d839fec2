mod claims;
mod error;
pub mod jwks;
pub mod middleware;
pub mod verifier;

pub use claims::AuthClaims;
pub use error::AuthError;
pub use verifier::TokenVerifier;
