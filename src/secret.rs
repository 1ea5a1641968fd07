//! Client secret generation.
//!
//! Apple does not hand out static client secrets. Instead the backend signs a short lived
//! ES256 JWT with the private key downloaded from the developer portal and sends it as the
//! `client_secret` form field of every token request.

use std::fmt;
use std::time::Duration;

use jsonwebtoken::{errors::ErrorKind, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::SigningError;

/// Longest lifetime Apple accepts for a client secret (six months).
pub const MAX_SECRET_LIFETIME: Duration = Duration::from_secs(15_777_000);

/// Lifetime used by [`ValidationClient`](crate::ValidationClient) for the secret it signs per request.
pub const DEFAULT_SECRET_LIFETIME: Duration = Duration::from_secs(300);

/// The developer account credentials a client secret is signed with.
///
/// All fields come from the Apple developer portal:
/// - `team_id`: the 10 character Team ID
/// - `client_id`: the App ID or Services ID the tokens are requested for
/// - `key_id`: the identifier of the Sign in with Apple private key
/// - the private key itself, the PKCS#8 PEM content of the downloaded `.p8` file
#[derive(Clone)]
pub struct SigningIdentity {
    team_id: String,
    client_id: String,
    key_id: String,
    private_key: Vec<u8>,
}

impl SigningIdentity {
    pub fn new(
        team_id: impl Into<String>,
        client_id: impl Into<String>,
        key_id: impl Into<String>,
        private_key_pem: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            team_id: team_id.into(),
            client_id: client_id.into(),
            key_id: key_id.into(),
            private_key: private_key_pem.into(),
        }
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("team_id", &self.team_id)
            .field("client_id", &self.client_id)
            .field("key_id", &self.key_id)
            .field("private_key", &"[redacted]")
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct ClientSecretClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: u64,
    exp: u64,
}

/// A signed client secret JWT.
#[derive(Clone)]
pub struct ClientSecret {
    token: String,
    issued_at: u64,
    expires_at: u64,
}

impl ClientSecret {
    /// Sign a new client secret valid from now for `lifetime`.
    ///
    /// The lifetime is counted in whole seconds and must be within `1s..=`[`MAX_SECRET_LIFETIME`].
    pub fn sign(identity: &SigningIdentity, lifetime: Duration) -> Result<Self, SigningError> {
        let now = chrono::Utc::now().timestamp().max(0) as u64;

        Self::sign_at(identity, lifetime, now)
    }

    /// Sign a new client secret with an explicit issue time, in seconds since the Unix epoch.
    pub fn sign_at(
        identity: &SigningIdentity,
        lifetime: Duration,
        issued_at: u64,
    ) -> Result<Self, SigningError> {
        let invalid_lifetime = || SigningError::InvalidLifetime {
            requested: lifetime,
            max: MAX_SECRET_LIFETIME,
        };

        let lifetime_secs = lifetime.as_secs();
        if lifetime_secs == 0 || lifetime > MAX_SECRET_LIFETIME {
            return Err(invalid_lifetime());
        }

        // exp must stay representable and after iat
        let expires_at = issued_at
            .checked_add(lifetime_secs)
            .ok_or_else(invalid_lifetime)?;
        let claims = ClientSecretClaims {
            iss: identity.team_id.clone(),
            sub: identity.client_id.clone(),
            aud: identity.client_id.clone(),
            iat: issued_at,
            exp: expires_at,
        };

        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(identity.key_id.clone());

        let key =
            EncodingKey::from_ec_pem(&identity.private_key).map_err(SigningError::KeyRejected)?;

        let token = jsonwebtoken::encode(&header, &claims, &key).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidKeyFormat
                | ErrorKind::InvalidAlgorithm => SigningError::KeyRejected(e),
                _ => SigningError::EncodingFailed(e),
            }
        })?;

        tracing::debug!(
            key_id = %identity.key_id,
            lifetime_secs,
            "signed client secret"
        );

        Ok(Self {
            token,
            issued_at,
            expires_at,
        })
    }

    /// The compact JWT, as sent in the `client_secret` field
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// Issue time in seconds since the Unix epoch
    pub fn issued_at(&self) -> u64 {
        self.issued_at
    }

    /// Expiry time in seconds since the Unix epoch
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }
}

impl fmt::Debug for ClientSecret {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientSecret")
            .field("token", &"[redacted]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
