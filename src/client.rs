//! Token validation against Apple's `auth/token` endpoint.
//!
//! Every call signs a fresh client secret, sends exactly one request and decodes the identity
//! token of a successful response. There are no retries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::claims::Claims;
use crate::config::{ClientConfig, ACCEPT, CONTENT_TYPE, USER_AGENT};
use crate::error::{ExchangeError, TransportError};
use crate::secret::{ClientSecret, SigningIdentity};
use crate::transport::{ReqwestTransport, TokenTransport};

/// How the client interacts with the validation server
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }
}

/// A token request. The variant decides which grant fields are sent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExchangeRequest {
    /// Validate an authorization code. The code is single use and valid for five minutes.
    /// `redirect_uri` must be the one used in the authorization request, for web sign in only.
    AuthorizationCode {
        code: String,
        redirect_uri: Option<String>,
    },
    /// Validate a refresh token obtained from an earlier authorization code exchange
    RefreshToken { refresh_token: String },
}

impl ExchangeRequest {
    pub fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

/// Wire form of a token request; every field is always present.
#[derive(Serialize)]
struct TokenRequestForm<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
    grant_type: GrantType,
    refresh_token: &'a str,
    redirect_uri: &'a str,
}

impl<'a> TokenRequestForm<'a> {
    fn new(request: &'a ExchangeRequest, client_id: &'a str, client_secret: &'a str) -> Self {
        let mut form = Self {
            client_id,
            client_secret,
            code: "",
            grant_type: request.grant_type(),
            refresh_token: "",
            redirect_uri: "",
        };

        match request {
            ExchangeRequest::AuthorizationCode { code, redirect_uri } => {
                form.code = code.as_str();
                form.redirect_uri = redirect_uri.as_deref().unwrap_or_default();
            }
            ExchangeRequest::RefreshToken { refresh_token } => {
                form.refresh_token = refresh_token.as_str();
            }
        }

        form
    }
}

/// Successful response from the validation server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Reserved for future use. No data set has been defined for access yet.
    #[serde(default)]
    pub access_token: String,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: i64,
    /// The identity token JWT
    pub id_token: String,
    /// Only returned for authorization code requests. Store it securely.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Always `bearer`
    #[serde(default)]
    pub token_type: String,
}

/// Tokens together with the claims decoded from their identity token
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedTokens {
    pub token_set: TokenSet,
    pub claims: Claims,
}

/// Error response body from the validation server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ProviderErrorCode,
}

/// Error codes Apple documents for the token endpoint
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderErrorCode {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    InvalidScope,
    /// Any code not in the documented vocabulary, kept verbatim
    Other(String),
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::Other(code) => code,
        }
    }
}

impl From<String> for ProviderErrorCode {
    fn from(code: String) -> Self {
        match code.as_str() {
            "invalid_request" => Self::InvalidRequest,
            "invalid_client" => Self::InvalidClient,
            "invalid_grant" => Self::InvalidGrant,
            "unauthorized_client" => Self::UnauthorizedClient,
            "unsupported_grant_type" => Self::UnsupportedGrantType,
            "invalid_scope" => Self::InvalidScope,
            _ => Self::Other(code),
        }
    }
}

impl From<ProviderErrorCode> for String {
    fn from(code: ProviderErrorCode) -> Self {
        match code {
            ProviderErrorCode::Other(code) => code,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client for Apple's token validation endpoint.
///
/// Holds only configuration, so one instance can serve concurrent calls.
pub struct ValidationClient<T = ReqwestTransport> {
    identity: SigningIdentity,
    config: ClientConfig,
    transport: T,
}

impl ValidationClient<ReqwestTransport> {
    pub fn new(identity: SigningIdentity, config: ClientConfig) -> Result<Self, TransportError> {
        Ok(Self::with_transport(
            identity,
            config,
            ReqwestTransport::new()?,
        ))
    }
}

impl<T: TokenTransport> ValidationClient<T> {
    pub fn with_transport(identity: SigningIdentity, config: ClientConfig, transport: T) -> Self {
        Self {
            identity,
            config,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn identity(&self) -> &SigningIdentity {
        &self.identity
    }

    /// Validate an authorization code received by a native app
    pub async fn exchange_app_code(
        &self,
        code: impl Into<String>,
    ) -> Result<ValidatedTokens, ExchangeError> {
        self.exchange(ExchangeRequest::AuthorizationCode {
            code: code.into(),
            redirect_uri: None,
        })
        .await
    }

    /// Validate an authorization code received by a website through `redirect_uri`
    pub async fn exchange_web_code(
        &self,
        code: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<ValidatedTokens, ExchangeError> {
        self.exchange(ExchangeRequest::AuthorizationCode {
            code: code.into(),
            redirect_uri: Some(redirect_uri.into()),
        })
        .await
    }

    pub async fn exchange_refresh_token(
        &self,
        refresh_token: impl Into<String>,
    ) -> Result<ValidatedTokens, ExchangeError> {
        self.exchange(ExchangeRequest::RefreshToken {
            refresh_token: refresh_token.into(),
        })
        .await
    }

    /// Send one token request and decode the response.
    ///
    /// Dropping the returned future cancels the request. If no response arrives within
    /// [`ClientConfig::timeout`] the call fails with [`TransportError::Timeout`].
    pub async fn exchange(&self, request: ExchangeRequest) -> Result<ValidatedTokens, ExchangeError> {
        let secret = ClientSecret::sign(&self.identity, self.config.secret_lifetime)?;
        let form = TokenRequestForm::new(&request, self.identity.client_id(), secret.as_str());
        let body = serde_urlencoded::to_string(&form)?;

        let headers = [
            ("content-type", CONTENT_TYPE),
            ("accept", ACCEPT),
            ("user-agent", USER_AGENT),
        ];

        tracing::debug!(
            grant_type = request.grant_type().as_str(),
            url = %self.config.validation_url,
            "sending token request"
        );

        let response = tokio::time::timeout(
            self.config.timeout,
            self.transport
                .post_form(&self.config.validation_url, &headers, body),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.config.timeout))??;

        let status = response.status;
        tracing::debug!(status, "token response received");

        if status != 200 {
            let error = response.json::<ErrorResponse>().map_err(|source| {
                tracing::warn!(status, error = %source, "undecodable error response");
                ExchangeError::InvalidResponse { status, source }
            })?;

            tracing::warn!(status, code = %error.error, "token request rejected");
            return Err(ExchangeError::Rejected {
                status,
                code: error.error,
            });
        }

        let token_set = response.json::<TokenSet>().map_err(|source| {
            tracing::warn!(status, error = %source, "undecodable token response");
            ExchangeError::InvalidResponse { status, source }
        })?;

        match Claims::decode(&token_set.id_token) {
            Ok(claims) => Ok(ValidatedTokens { token_set, claims }),
            Err(source) => Err(ExchangeError::Claims {
                token_set: Box::new(token_set),
                source,
            }),
        }
    }
}
