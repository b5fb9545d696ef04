//! TC3-HMAC-SHA256 request signing
//!
//! Each API call is a `POST /` whose action travels in the `X-TC-Action`
//! header.  The signature covers the content type, host, and action headers
//! plus a SHA-256 digest of the exact body bytes, so the body returned in
//! [`SignedRequest`] must be sent verbatim.
use crate::config::Credentials;
use crate::consts::{API_VERSION, SERVICE};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

static ALGORITHM: &str = "TC3-HMAC-SHA256";
static HTTP_METHOD: &str = "POST";
static CANONICAL_URI: &str = "/";
static CANONICAL_QUERY: &str = "";
static CONTENT_TYPE: &str = "application/json";
static SIGNED_HEADERS: &str = "content-type;host;x-tc-action";
static TERMINATOR: &str = "tc3_request";

/// A fully signed API call, ready to be sent
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct SignedRequest {
    /// The serialized JSON payload; this is the body that was hashed
    pub(crate) body: String,

    /// Lowercase hex SHA-256 digest of `body`
    pub(crate) content_hash: String,

    /// Headers to send, in emission order
    pub(crate) headers: Vec<(&'static str, String)>,
}

/// Serialize `payload` and sign a call to `action` made at `timestamp`
/// (seconds since the Unix epoch)
pub(crate) fn sign<P: Serialize + ?Sized>(
    credentials: &Credentials,
    action: &str,
    payload: &P,
    timestamp: i64,
) -> Result<SignedRequest, SignError> {
    let body = serde_json::to_string(payload).map_err(|source| SignError::Serialize {
        action: action.to_owned(),
        source,
    })?;
    sign_body(credentials, action, body, timestamp)
}

/// Sign a call to `action` whose body has already been serialized
pub(crate) fn sign_body(
    credentials: &Credentials,
    action: &str,
    body: String,
    timestamp: i64,
) -> Result<SignedRequest, SignError> {
    let date = utc_date(timestamp)?;
    let content_hash = sha256_hex(body.as_bytes());
    let canonical = canonical_request(&credentials.endpoint, action, &content_hash);
    let scope = credential_scope(&date);
    let string_to_sign = format!(
        "{ALGORITHM}\n{timestamp}\n{scope}\n{}",
        sha256_hex(canonical.as_bytes())
    );
    let key = signing_key(&credentials.secret_key, &date);
    let signature = hex::encode(hmac_sha256(&key, &string_to_sign));
    let authorization = format!(
        "{ALGORITHM} Credential={}/{scope}, SignedHeaders={SIGNED_HEADERS}, Signature={signature}",
        credentials.secret_id
    );
    let headers = vec![
        ("Authorization", authorization),
        ("Content-Type", CONTENT_TYPE.to_owned()),
        ("Host", credentials.endpoint.clone()),
        ("X-TC-Action", action.to_owned()),
        ("X-TC-Version", API_VERSION.to_owned()),
        ("X-TC-Timestamp", timestamp.to_string()),
        ("X-TC-Region", credentials.region.clone()),
    ];
    Ok(SignedRequest {
        body,
        content_hash,
        headers,
    })
}

/// Build the canonical request string over which the signature is computed
fn canonical_request(host: &str, action: &str, content_hash: &str) -> String {
    let canonical_headers = format!(
        "content-type:{CONTENT_TYPE}\nhost:{host}\nx-tc-action:{}\n",
        action.to_lowercase()
    );
    [
        HTTP_METHOD,
        CANONICAL_URI,
        CANONICAL_QUERY,
        &canonical_headers,
        SIGNED_HEADERS,
        content_hash,
    ]
    .join("\n")
}

fn credential_scope(date: &str) -> String {
    format!("{date}/{SERVICE}/{TERMINATOR}")
}

/// Derive the per-day signing key from the secret key
fn signing_key(secret_key: &str, date: &str) -> Vec<u8> {
    let secret_date = hmac_sha256(format!("TC3{secret_key}").as_bytes(), date);
    let secret_service = hmac_sha256(&secret_date, SERVICE);
    hmac_sha256(&secret_service, TERMINATOR)
}

fn hmac_sha256(key: &[u8], msg: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take a key of any size");
    mac.update(msg.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Format the UTC calendar date of `timestamp` as `YYYY-MM-DD`
fn utc_date(timestamp: i64) -> Result<String, SignError> {
    let dt = OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| SignError::Timestamp(timestamp))?;
    Ok(format!(
        "{:04}-{:02}-{:02}",
        dt.year(),
        u8::from(dt.month()),
        dt.day()
    ))
}

#[derive(Debug, Error)]
pub(crate) enum SignError {
    #[error("failed to serialize payload for {action}")]
    Serialize {
        action: String,
        source: serde_json::Error,
    },
    #[error("timestamp {0} is out of range")]
    Timestamp(i64),
}
