//! GitHub App authentication tokens.
//!
//! A GitHub App authenticates as itself with a short-lived RS256 JWT:
//!
//! ```text
//! base64url(header) . base64url(claims) . base64url(RSASSA-PKCS1-v1_5-SHA256)
//! ```
//!
//! Claims are `iat`, `exp = iat + APP_TOKEN_LIFETIME_SECS` and `iss` (the app
//! id). The private key is the PEM file downloaded from the app settings, in
//! either PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`) form.

use ring::signature::{RSA_PKCS1_SHA256, RsaKeyPair};
use serde::Serialize;

/// Lifetime of an app JWT, in seconds. GitHub rejects anything above ten minutes.
pub const APP_TOKEN_LIFETIME_SECS: i64 = 600;

const JWT_HEADER: &str = r#"{"alg":"RS256","typ":"JWT"}"#;

/// Errors produced while loading keys or signing tokens.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("invalid PEM document")]
    InvalidPem,
    #[error("unsupported PEM label: {0}")]
    UnsupportedLabel(String),
    #[error("invalid base64 encoding")]
    InvalidBase64,
    #[error("private key rejected: {0}")]
    KeyRejected(String),
    #[error("signing failed")]
    Signing,
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ring::error::KeyRejected> for JwtError {
    fn from(err: ring::error::KeyRejected) -> Self {
        Self::KeyRejected(err.to_string())
    }
}

impl From<ring::error::Unspecified> for JwtError {
    fn from(_: ring::error::Unspecified) -> Self {
        Self::Signing
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iat: i64,
    exp: i64,
    iss: &'a str,
}

// ---------------------------------------------------------------------------
// AppKey
// ---------------------------------------------------------------------------

/// The app's RSA private key.
pub struct AppKey {
    key_pair: RsaKeyPair,
}

impl AppKey {
    /// Load a key from a PEM document.
    pub fn from_pem(pem: &str) -> Result<Self, JwtError> {
        let (label, der) = decode_pem(pem)?;
        let key_pair = match label.as_str() {
            "RSA PRIVATE KEY" => RsaKeyPair::from_der(&der)?,
            "PRIVATE KEY" => RsaKeyPair::from_pkcs8(&der)?,
            other => return Err(JwtError::UnsupportedLabel(other.to_string())),
        };
        Ok(Self { key_pair })
    }

    /// Sign an app JWT for `app_id`, issued at the unix timestamp `issued_at`.
    pub fn sign(&self, app_id: &str, issued_at: i64) -> Result<String, JwtError> {
        let signing_input = signing_input(app_id, issued_at)?;
        let rng = ring::rand::SystemRandom::new();
        let mut signature = vec![0u8; self.key_pair.public().modulus_len()];
        self.key_pair.sign(
            &RSA_PKCS1_SHA256,
            &rng,
            signing_input.as_bytes(),
            &mut signature,
        )?;
        Ok(format!(
            "{}.{}",
            signing_input,
            fast32::base64::RFC4648_URL_NOPAD.encode(&signature)
        ))
    }
}

impl std::fmt::Debug for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppKey").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// The `header.claims` part of the JWT, which is what gets signed.
pub fn signing_input(app_id: &str, issued_at: i64) -> Result<String, JwtError> {
    let claims = Claims {
        iat: issued_at,
        exp: issued_at + APP_TOKEN_LIFETIME_SECS,
        iss: app_id,
    };
    let claims = serde_json::to_string(&claims)?;
    Ok(format!(
        "{}.{}",
        fast32::base64::RFC4648_URL_NOPAD.encode(JWT_HEADER.as_bytes()),
        fast32::base64::RFC4648_URL_NOPAD.encode(claims.as_bytes())
    ))
}

/// Split a PEM document into its label and DER payload.
fn decode_pem(pem: &str) -> Result<(String, Vec<u8>), JwtError> {
    let mut lines = pem.lines().map(str::trim).filter(|l| !l.is_empty());
    let label = lines
        .next()
        .and_then(|l| l.strip_prefix("-----BEGIN "))
        .and_then(|l| l.strip_suffix("-----"))
        .ok_or(JwtError::InvalidPem)?
        .to_string();
    let end = format!("-----END {label}-----");

    let mut body = String::new();
    let mut terminated = false;
    for line in lines {
        if line == end {
            terminated = true;
            break;
        }
        body.push_str(line);
    }
    if !terminated || body.is_empty() {
        return Err(JwtError::InvalidPem);
    }

    let der = fast32::base64::RFC4648
        .decode_str(&body)
        .map_err(|_| JwtError::InvalidBase64)?;
    Ok((label, der))
}
