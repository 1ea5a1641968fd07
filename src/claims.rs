//! Identity token claims.
//!
//! Apple is not consistent about claim encodings: booleans arrive either as JSON booleans or
//! as the strings `"true"`/`"false"`, and numeric claims may be integers or floats. Claims are
//! first read into a [`RawClaims`] map of tagged [`ClaimValue`]s and then normalised one by one,
//! so an oddly encoded claim never spoils the rest of the token.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::ClaimsError;

/// A single claim as it appeared on the wire.
#[derive(Clone, Debug, PartialEq)]
pub enum ClaimValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    /// Arrays and objects. None of the normalised claims accept these.
    Other(serde_json::Value),
    /// Missing or `null`
    Absent,
}

impl ClaimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric value truncated toward zero. `None` for non-numbers and non-finite floats.
    pub fn as_truncated_i64(&self) -> Option<i64> {
        match *self {
            Self::Integer(i) => Some(i),
            Self::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<serde_json::Value> for ClaimValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Bool(b),
            Value::String(s) => Self::String(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => n.as_f64().map_or(Self::Other(Value::Number(n)), Self::Float),
            },
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Other(v) => write!(f, "{}", v),
            Self::Absent => f.write_str("<absent>"),
        }
    }
}

/// Claim name to raw value, before any normalisation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawClaims(HashMap<String, ClaimValue>);

static ABSENT: ClaimValue = ClaimValue::Absent;

impl RawClaims {
    /// Split a compact JWT and read its payload without checking the signature.
    ///
    /// Only the structure is checked: three segments, base64url, a JSON object payload and a
    /// header naming a known algorithm.
    pub fn decode_unverified(token: &str) -> Result<Self, ClaimsError> {
        let mut validation = Validation::new(Algorithm::ES256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let key = DecodingKey::from_secret(&[]);

        let data = jsonwebtoken::decode::<HashMap<String, serde_json::Value>>(
            token,
            &key,
            &validation,
        )
        .map_err(ClaimsError::MalformedToken)?;

        Ok(data.claims.into())
    }

    /// The claim's value, [`ClaimValue::Absent`] when it is missing
    pub fn get(&self, name: &str) -> &ClaimValue {
        self.0.get(name).unwrap_or(&ABSENT)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, serde_json::Value>> for RawClaims {
    fn from(map: HashMap<String, serde_json::Value>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// A boolean claim that may be missing or unreadable.
///
/// `Unknown` is not `False`: a token that does not say
/// `nonce_supported` is not a token that says nonces are unsupported.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum TriState {
    True,
    False,
    #[default]
    Unknown,
}

impl TriState {
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Self::True => Some(true),
            Self::False => Some(false),
            Self::Unknown => None,
        }
    }

    pub fn is_true(self) -> bool {
        self == Self::True
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl From<Option<bool>> for TriState {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Unknown, Self::from)
    }
}

impl From<TriState> for Option<bool> {
    fn from(value: TriState) -> Self {
        value.as_bool()
    }
}

/// Indicates whether the user appears to be a real person.
/// Apple recommends using this to mitigate fraud.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum RealUserStatus {
    #[default]
    Unsupported = 0,
    Unknown = 1,
    LikelyReal = 2,
}

impl RealUserStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Unsupported),
            1 => Some(Self::Unknown),
            2 => Some(Self::LikelyReal),
            _ => None,
        }
    }
}

/// A claim that was present but could not be interpreted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct InvalidClaim {
    pub name: String,
    /// The raw value as it appeared in the token
    pub raw: String,
}

/// Normalised identity token claims.
///
/// String claims default to empty, timestamps to `None`, and boolean claims to
/// [`TriState::Unknown`] when they are missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Always `https://appleid.apple.com` for tokens issued by Apple.
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Unique identifier for the user:
    /// - A unique, stable string, serves as the primary identifier of the user
    /// - Uses the same identifier across all of the apps in the development team associated with an Apple Developer account
    /// - Differs for the same user across different development teams, and can’t identify a user across development teams
    /// - Doesn’t change if the user stops using Sign in with Apple with an app and later starts using it again
    #[serde(rename = "sub")]
    pub subject: String,
    /// The client id of your app
    #[serde(rename = "aud")]
    pub audience: String,
    #[serde(rename = "iat")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(rename = "exp")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Present only if a nonce was passed in the authorization request.
    pub nonce: String,
    /// If this is true and the nonce is missing, treat the nonce as mandatory and fail the transaction.
    pub nonce_supported: TriState,
    /// The user's real email address or the private relay address.
    /// May be empty for Sign in with Apple at Work & School users.
    pub email: String,
    pub email_verified: TriState,
    /// Whether [`email`](Self::email) is the private relay address.
    pub is_private_email: TriState,
    /// Present only on iOS 14, macOS 11, watchOS 7, tvOS 14 and later. Never present for web-based apps.
    pub real_user_status: RealUserStatus,
    /// Hash of the authorization code
    pub c_hash: String,
    /// Time the user authenticated
    pub auth_time: Option<DateTime<Utc>>,
    /// Boolean claims that were present but unreadable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_claims: Vec<InvalidClaim>,
}

impl Claims {
    /// Read the claims of an identity token. The signature is not verified.
    pub fn decode(identity_token: &str) -> Result<Self, ClaimsError> {
        let raw = RawClaims::decode_unverified(identity_token)?;

        Ok(Self::from_raw(&raw))
    }

    /// Normalise a raw claim map. Never fails; see the type level docs for defaults.
    pub fn from_raw(raw: &RawClaims) -> Self {
        let mut invalid_claims = Vec::new();
        let mut tri_state = |name: &str| {
            let value = raw.get(name);
            let state = tolerant_bool(value);
            if state == TriState::Unknown && !value.is_absent() {
                tracing::warn!(claim = name, raw = %value, "unparseable boolean claim");
                invalid_claims.push(InvalidClaim {
                    name: name.to_string(),
                    raw: value.to_string(),
                });
            }
            state
        };

        let nonce_supported = tri_state("nonce_supported");
        let email_verified = tri_state("email_verified");
        let is_private_email = tri_state("is_private_email");

        Self {
            issuer: string_claim(raw, "iss"),
            subject: string_claim(raw, "sub"),
            audience: string_claim(raw, "aud"),
            issued_at: timestamp_claim(raw, "iat"),
            expires_at: timestamp_claim(raw, "exp"),
            nonce: string_claim(raw, "nonce"),
            nonce_supported,
            email: string_claim(raw, "email"),
            email_verified,
            is_private_email,
            real_user_status: real_user_status(raw.get("real_user_status")),
            c_hash: string_claim(raw, "c_hash"),
            auth_time: timestamp_claim(raw, "auth_time"),
            invalid_claims,
        }
    }
}

fn string_claim(raw: &RawClaims, name: &str) -> String {
    raw.get(name).as_str().unwrap_or_default().to_string()
}

fn timestamp_claim(raw: &RawClaims, name: &str) -> Option<DateTime<Utc>> {
    let secs = raw.get(name).as_truncated_i64().filter(|secs| *secs > 0)?;

    DateTime::from_timestamp(secs, 0)
}

fn real_user_status(value: &ClaimValue) -> RealUserStatus {
    let Some(code) = value.as_truncated_i64() else {
        return RealUserStatus::Unsupported;
    };

    RealUserStatus::from_code(code).unwrap_or_else(|| {
        tracing::warn!(code, "out of range real_user_status");
        RealUserStatus::Unsupported
    })
}

/// Native booleans, or exactly `"true"` / `"false"`. Anything else is unknown.
fn tolerant_bool(value: &ClaimValue) -> TriState {
    match value {
        ClaimValue::Bool(b) => TriState::from(*b),
        ClaimValue::String(s) if s == "true" => TriState::True,
        ClaimValue::String(s) if s == "false" => TriState::False,
        _ => TriState::Unknown,
    }
}
