use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::errors::Error as JwtError;
use reqwest::Error as ReqwestError;
use thiserror::Error;

use crate::client::{ProviderErrorCode, TokenSet};

/// Failure to produce a client secret
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SigningError {
    /// The requested lifetime is zero or longer than Apple accepts
    #[error("client secret lifetime {requested:?} must be between 1s and {max:?}")]
    InvalidLifetime { requested: Duration, max: Duration },
    /// The private key is not a usable PKCS#8 P-256 key
    #[error("private key rejected: {0}")]
    KeyRejected(#[source] JwtError),
    /// The claims or header could not be serialized
    #[error("failed to encode client secret: {0}")]
    EncodingFailed(#[source] JwtError),
}

/// Failure to extract claims from an identity token
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ClaimsError {
    /// The token is not a structurally valid JWT (segments, base64, JSON or algorithm name)
    #[error("malformed identity token: {0}")]
    MalformedToken(#[source] JwtError),
}

/// Network level failure of the token request
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request did not complete within the configured deadline
    #[error("token request timed out after {0:?}")]
    Timeout(Duration),
    /// Error from the [reqwest] crate (connection, TLS, body read)
    #[error(transparent)]
    Http(#[from] ReqwestError),
}

/// Failure of a token exchange with Apple's validation endpoint
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The client secret could not be signed
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The form body could not be encoded
    #[error("failed to encode token request: {0}")]
    EncodeRequest(#[from] serde_urlencoded::ser::Error),
    /// The request never produced an HTTP response
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Apple answered with an error response. The code is the `error` field verbatim.
    #[error("token request rejected with status {status}: {code}")]
    Rejected { status: u16, code: ProviderErrorCode },
    /// The response body (success or error) was not the expected JSON
    #[error("undecodable token response with status {status}: {source}")]
    InvalidResponse {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
    /// Apple issued tokens but the identity token could not be decoded.
    /// The token set is still returned so the refresh token is not lost.
    #[error("tokens issued but identity token is unreadable: {source}")]
    Claims {
        token_set: Box<TokenSet>,
        #[source]
        source: ClaimsError,
    },
}

impl ExchangeError {
    /// Apple's error code, if the request was rejected by the provider
    pub fn provider_code(&self) -> Option<&ProviderErrorCode> {
        match self {
            Self::Rejected { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Missing or invalid configuration
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("environment variable {name} has invalid value '{value}'")]
    InvalidVar { name: &'static str, value: String },
    #[error("failed to read private key from {}: {source}", .path.display())]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A network, validation or decoding error from [`IdentityTokenVerifier`](crate::IdentityTokenVerifier)
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The JWK id in the provided identity token has no counterpart in Apple's key set
    #[error("JSON Web Key id '{0}' missing in Apple key set")]
    MissingJwk(String),
    /// The JWT header is missing the key id field (kid)
    #[error("Identity token header is missing key id (kid) field")]
    MissingKeyId,
    /// Error from the [jsonwebtoken] crate
    #[error(transparent)]
    Jwt(#[from] JwtError),
    /// Error from the [reqwest] crate. Can occur when fetching keys from Apple
    #[error(transparent)]
    Http(#[from] ReqwestError),
}
