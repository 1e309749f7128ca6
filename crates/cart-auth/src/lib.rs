//! Session authentication.
//!
//! Sessions are issued by the user service as HS256 JSON Web Tokens signed
//! with the shared `JWTSECRET`. This crate only verifies them (and mints
//! them for the CLI and tests); it never talks to the user service.
//!
//! Tokens arrive either as `Authorization: Bearer <token>` or as the
//! `token` cookie. See [`token_from_headers`].

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use cart_core::Identity;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

const MAX_TOKEN_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No token in the request.
    Missing,
    /// Not a three-part JWT, bad base64/JSON, or an unsupported algorithm.
    Malformed(String),
    /// Signature does not match the shared secret.
    BadSignature,
    /// `exp` is in the past.
    Expired,
    /// The verifier itself failed.
    Internal(String),
}

impl AuthError {
    /// `true` for failures caused by the request rather than the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, AuthError::Internal(_))
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Missing => f.write_str("missing session token"),
            AuthError::Malformed(why) => write!(f, "malformed session token: {why}"),
            AuthError::BadSignature => f.write_str("session token signature mismatch"),
            AuthError::Expired => f.write_str("session token expired"),
            AuthError::Internal(why) => write!(f, "session verifier failure: {why}"),
        }
    }
}

impl std::error::Error for AuthError {}

// ---------------------------------------------------------------------------
// Verifier boundary
// ---------------------------------------------------------------------------

/// Turns a raw session token into the caller's identity.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub id: i64,
    /// Expiry, UTC epoch seconds.
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

// ---------------------------------------------------------------------------
// HS256
// ---------------------------------------------------------------------------

/// HS256 verifier over a shared secret.
///
/// **The key is redacted in `Debug` output.**
#[derive(Clone)]
pub struct HmacSessionVerifier {
    key: Vec<u8>,
}

impl std::fmt::Debug for HmacSessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSessionVerifier")
            .field("key", &"<REDACTED>")
            .finish()
    }
}

impl HmacSessionVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: secret.as_ref().to_vec(),
        }
    }

    /// Sign a token for `caller` valid for `ttl` from now.
    pub fn mint(&self, caller: Identity, ttl: chrono::Duration) -> Result<String, AuthError> {
        let exp = chrono::Utc::now()
            .checked_add_signed(ttl)
            .ok_or_else(|| AuthError::Internal("session ttl out of range".to_string()))?
            .timestamp();
        self.mint_claims(&SessionClaims { id: caller.id, exp })
    }

    pub fn mint_claims(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        let header = Header {
            alg: "HS256".to_string(),
            typ: Some("JWT".to_string()),
        };
        let header = encode_part(&header)?;
        let payload = encode_part(claims)?;
        let signing_input = format!("{header}.{payload}");
        let sig = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(sig)))
    }

    /// Verify against an explicit clock (UTC epoch seconds).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims, AuthError> {
        if token.len() > MAX_TOKEN_BYTES {
            return Err(AuthError::Malformed("token too large".to_string()));
        }

        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::Malformed("expected three segments".to_string()));
        };

        let header: Header = decode_part(header_b64, "header")?;
        if header.alg != "HS256" {
            return Err(AuthError::Malformed(format!(
                "unsupported alg {:?}",
                header.alg
            )));
        }

        let sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|e| AuthError::Malformed(format!("signature: {e}")))?;
        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        self.mac(signing_input.as_bytes())?
            .verify_slice(&sig)
            .map_err(|_| AuthError::BadSignature)?;

        let claims: SessionClaims = decode_part(payload_b64, "payload")?;
        if claims.exp <= now {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, input: &[u8]) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        mac.update(input);
        Ok(mac)
    }
}

impl SessionVerifier for HmacSessionVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.verify_at(token, chrono::Utc::now().timestamp())?;
        Ok(Identity { id: claims.id })
    }
}

fn encode_part<T: Serialize>(value: &T) -> Result<String, AuthError> {
    let json = serde_json::to_vec(value).map_err(|e| AuthError::Internal(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_part<T: for<'de> Deserialize<'de>>(b64: &str, what: &str) -> Result<T, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(b64)
        .map_err(|e| AuthError::Malformed(format!("{what}: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| AuthError::Malformed(format!("{what}: {e}")))
}

// ---------------------------------------------------------------------------
// Token extraction
// ---------------------------------------------------------------------------

/// Pick the session token out of the `Authorization` and `Cookie` header
/// values. A bearer token wins over the cookie.
pub fn token_from_headers<'a>(
    authorization: Option<&'a str>,
    cookie: Option<&'a str>,
) -> Result<&'a str, AuthError> {
    if let Some(header) = authorization {
        let header = header.trim();
        let (scheme, token) = header.split_once(' ').unwrap_or((header, ""));
        let token = token.trim();
        if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
            return Err(AuthError::Malformed(
                "invalid authorization header".to_string(),
            ));
        }
        return Ok(token);
    }

    cookie
        .into_iter()
        .flat_map(|c| c.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::Missing)
}
