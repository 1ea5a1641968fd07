//! # Apple Sign-In Client
//!
//! Server side half of [Sign in with Apple](https://developer.apple.com/documentation/sign_in_with_apple):
//! validate the authorization code (or a refresh token) your app received against Apple's
//! [token endpoint](https://developer.apple.com/documentation/sign_in_with_apple/generate_and_validate_tokens)
//! and read the identity of the user from the returned identity token.
//!
//! The crate covers three steps:
//! - [`ClientSecret`]: Apple authenticates your backend with an ES256 JWT signed by the
//!   Sign in with Apple private key, not a static secret. A fresh one is signed for every request.
//! - [`ValidationClient`]: posts the code or refresh token to `https://appleid.apple.com/auth/token`
//!   and interprets the [`TokenSet`] or [`ErrorResponse`] it gets back.
//! - [`Claims`]: the identity token claims, normalised. Apple sends booleans such as
//!   `email_verified` either as JSON booleans or as `"true"`/`"false"` strings, and numbers as
//!   integers or floats. Every encoding is accepted, and a claim that is still unreadable becomes
//!   [`TriState::Unknown`] without affecting the others.
//!
//! To implement Sign In with Apple:
//! - You have to have a valid, paid Apple developer account.
//! - Generate an identifier in <https://developer.apple.com/account/resources/identifiers/list> (eg. `com.example.myapp`)
//! - Make sure `Sign In with Apple` Capability is enabled on that identifier.
//! - Create a key with `Sign In with Apple` enabled and download the `.p8` file. Note its Key ID and your Team ID.
//! - Send the `authorizationCode` from your app (or the `code` posted to your web redirect URI) to the backend.
//! - Use this crate to validate the code and decode the identity token.
//!
//! ## Usage
//!
//! ```no_run
//! use apple_signin_client::{ClientConfig, SigningIdentity, ValidationClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let key = std::fs::read("AuthKey_ABC123DEFG.p8")?;
//! let identity = SigningIdentity::new("TEAM123456", "com.example.myapp", "ABC123DEFG", key);
//! let client = ValidationClient::new(identity, ClientConfig::default())?;
//!
//! let validated = client.exchange_app_code("[AUTHORIZATION CODE]").await?;
//! println!("user {} <{}>", validated.claims.subject, validated.claims.email);
//! # Ok(())
//! # }
//! ```
//!
//! ## Trust
//!
//! The identity token returned by the token endpoint comes straight from Apple over TLS, so
//! [`ValidationClient`] reads its claims without checking the signature. An identity token handed
//! to the backend by a client app is a different matter: check it with [`IdentityTokenVerifier`],
//! which verifies it against Apple's published keys.
//!
//! ## Logging
//!
//! Requests, rejections and unreadable claims are reported through [`tracing`]. Secrets and
//! tokens are never logged.
//!
mod claims;
mod client;
mod config;
mod error;
mod secret;
mod transport;
mod verify;

#[cfg(test)]
mod test_support;

pub use claims::{ClaimValue, Claims, InvalidClaim, RawClaims, RealUserStatus, TriState};
pub use client::{
    ErrorResponse, ExchangeRequest, GrantType, ProviderErrorCode, TokenSet, ValidatedTokens,
    ValidationClient,
};
pub use config::{ClientConfig, ACCEPT, CONTENT_TYPE, USER_AGENT, VALIDATION_URL};
pub use error::{ClaimsError, ConfigError, ExchangeError, SigningError, TransportError, VerifyError};
pub use secret::{ClientSecret, SigningIdentity, DEFAULT_SECRET_LIFETIME, MAX_SECRET_LIFETIME};
pub use transport::{HttpResponse, ReqwestTransport, TokenTransport};
pub use verify::{IdentityTokenVerifier, APPLE_ISSUER, KEYS_URL};
