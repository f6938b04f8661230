//! `X-Auth-Token` construction and verification.
//!
//! The token binds the request URL and the session token to a signing
//! time with the session MAC key, then seals the whole record with the
//! session cipher so only the node holding the same session can read it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sn_domain::error::{Error, Result};
use sn_protocol::{RequestToken, FIELD_URL, HEADER_AUTH_KEY};

use crate::crypto::SessionCipher;

fn signed_fields() -> Vec<String> {
    vec![FIELD_URL.to_string(), HEADER_AUTH_KEY.to_string()]
}

fn mac_input<'a>(url: &'a str, auth_key: &'a str, issued_at: &'a [u8; 8]) -> [&'a [u8]; 3] {
    [url.as_bytes(), auth_key.as_bytes(), issued_at.as_slice()]
}

/// Build the sealed header value for a request to `url`.
pub fn seal_request_token(
    cipher: &SessionCipher,
    key_name: &str,
    url: &str,
    auth_key: &str,
    issued_at: i64,
) -> Result<String> {
    let ts = issued_at.to_be_bytes();
    let mac = cipher.mac(&mac_input(url, auth_key, &ts));
    let token = RequestToken {
        key_name: key_name.to_string(),
        issued_at,
        fields: signed_fields(),
        mac: STANDARD.encode(mac),
    };
    cipher.seal_base64(&serde_json::to_vec(&token)?)
}

/// Open and check a header value produced by [`seal_request_token`].
///
/// Fails when the record does not decrypt, the MAC does not cover the
/// presented URL and session token, or the signing time is further
/// than `max_skew_ms` from `now_ms`.
pub fn verify_request_token(
    cipher: &SessionCipher,
    header_value: &str,
    url: &str,
    auth_key: &str,
    now_ms: i64,
    max_skew_ms: i64,
) -> Result<RequestToken> {
    let plain = cipher.open_base64(header_value)?;
    let token: RequestToken = serde_json::from_slice(&plain)
        .map_err(|e| Error::Decryption(format!("malformed request token: {e}")))?;

    if token.fields != signed_fields() {
        return Err(Error::NotAuthenticated(format!(
            "unexpected signed fields {:?}",
            token.fields
        )));
    }
    let tag = STANDARD
        .decode(&token.mac)
        .map_err(|e| Error::NotAuthenticated(format!("invalid request mac encoding: {e}")))?;
    let ts = token.issued_at.to_be_bytes();
    if !cipher.verify_mac(&mac_input(url, auth_key, &ts), &tag) {
        return Err(Error::NotAuthenticated("request signature mismatch".into()));
    }
    if (now_ms - token.issued_at).abs() > max_skew_ms {
        return Err(Error::NotAuthenticated(format!(
            "request token issued at {} is outside the {max_skew_ms}ms window",
            token.issued_at
        )));
    }
    Ok(token)
}
