//! Signature verified decoding of identity tokens.
//!
//! [`ValidationClient`](crate::ValidationClient) trusts the identity token it receives over TLS
//! straight from Apple and only reads its claims. Identity tokens that reach the backend any
//! other way, such as the `identityToken` an iOS app sends up after
//! `ASAuthorizationAppleIDCredential`, must be verified against Apple's published keys first.

use std::collections::HashMap;

use jsonwebtoken::{errors::ErrorKind, jwk::JwkSet, Algorithm, DecodingKey, Validation};

use crate::claims::{Claims, RawClaims};
use crate::error::VerifyError;

/// Apple's identity token signing keys
pub const KEYS_URL: &str = "https://appleid.apple.com/auth/keys";
/// Issuer of every Apple identity token
pub const APPLE_ISSUER: &str = "https://appleid.apple.com";

/// Verifies identity tokens against Apple's key set.
///
/// Keep the verifier around instead of creating one per token. The key set is fetched on first
/// use and cached; it is only fetched again when the cached keys cannot verify a token.
#[derive(Clone, Debug)]
pub struct IdentityTokenVerifier {
    keyset_cache: Option<JwkSet>,
    keys_url: String,
    validation: Validation,
}

impl IdentityTokenVerifier {
    /// Accept tokens issued for any of `client_ids` (App IDs or Services IDs)
    pub fn new<T: ToString>(client_ids: &[T]) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(client_ids);
        validation.set_issuer(&[APPLE_ISSUER]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Self {
            keyset_cache: None,
            keys_url: KEYS_URL.to_string(),
            validation,
        }
    }

    pub fn with_keys_url(mut self, url: impl Into<String>) -> Self {
        self.keys_url = url.into();
        self
    }

    /// Seed the cache, e.g. with a key set persisted from an earlier run
    pub fn with_keyset(mut self, keyset: JwkSet) -> Self {
        self.keyset_cache = Some(keyset);
        self
    }

    /// Verify the signature, issuer, audience and expiry, then normalise the claims
    pub async fn verify(&mut self, identity_token: &str) -> Result<Claims, VerifyError> {
        let header = jsonwebtoken::decode_header(identity_token)?;

        let Some(key_id) = header.kid else {
            return Err(VerifyError::MissingKeyId);
        };

        let mut res;

        loop {
            let (just_loaded, keyset) = self.take_cached_keyset().await?;

            res = Self::try_decode(&key_id, &keyset, identity_token, &self.validation);

            let is_keyset_error = match res {
                Err(ref e) => match e {
                    VerifyError::MissingJwk(_) => true,
                    VerifyError::Jwt(e) => matches!(
                        e.kind(),
                        ErrorKind::InvalidEcdsaKey
                            | ErrorKind::InvalidRsaKey(_)
                            | ErrorKind::InvalidAlgorithmName
                            | ErrorKind::InvalidKeyFormat
                    ),
                    _ => false,
                },
                _ => false,
            };

            if just_loaded || res.is_ok() || !is_keyset_error {
                self.keyset_cache = Some(keyset);

                break;
            }

            tracing::debug!(kid = %key_id, "cached Apple key set cannot verify token, refetching");
        }

        res
    }

    fn try_decode(
        kid: &str,
        keyset: &JwkSet,
        token: &str,
        validation: &Validation,
    ) -> Result<Claims, VerifyError> {
        let Some(jwk) = keyset.find(kid) else {
            return Err(VerifyError::MissingJwk(kid.to_string()));
        };

        let key = DecodingKey::from_jwk(jwk)?;

        let token =
            jsonwebtoken::decode::<HashMap<String, serde_json::Value>>(token, &key, validation)?;

        Ok(Claims::from_raw(&RawClaims::from(token.claims)))
    }

    async fn take_cached_keyset(&mut self) -> Result<(bool, JwkSet), VerifyError> {
        if let Some(keyset) = self.keyset_cache.take() {
            return Ok((false, keyset));
        }

        tracing::debug!(url = %self.keys_url, "fetching Apple key set");
        let keyset = reqwest::get(&self.keys_url).await?.json::<JwkSet>().await?;

        Ok((true, keyset))
    }
}
