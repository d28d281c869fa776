//! Session cookie parsing and `Set-Cookie` construction.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};

pub const SESSION_COOKIE_NAME: &str = "spp-session";

/// Raw value of the first session cookie in the request, if any.
///
/// Values are returned as bytes so non-UTF-8 cookies still reach the codec
/// (which rejects them) instead of being mistaken for "no cookie".
pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<&[u8]> {
    headers
        .get_all(COOKIE)
        .iter()
        .flat_map(|header| header.as_bytes().split(|byte| *byte == b';'))
        .find_map(|pair| {
            let pair = pair.trim_ascii();
            let split = pair.iter().position(|byte| *byte == b'=')?;
            let (name, value) = (&pair[..split], &pair[split + 1..]);
            (name.trim_ascii() == SESSION_COOKIE_NAME.as_bytes()).then(|| unquote(value.trim_ascii()))
        })
}

fn unquote(value: &[u8]) -> &[u8] {
    match value {
        [b'"', inner @ .., b'"'] => inner,
        _ => value,
    }
}

/// Session cookie with no expiry: `HttpOnly` always, `Secure` only when the
/// request arrived over an encrypted transport so plain-HTTP clients keep it.
pub(super) fn session_cookie(token: &str, secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={token}; HttpOnly");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}
