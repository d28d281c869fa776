//! # Passgate
//!
//! `passgate` puts a single shared password in front of an HTTP resource. It is
//! meant for staging sites and previews, not for user management: there are no
//! accounts, only one password and a signed session cookie.
//!
//! ## Flow
//!
//! 1. A request carrying a valid `spp-session` cookie is forwarded to the backend.
//! 2. A form POST with the right `ssp-password` field gets a fresh session cookie
//!    and a `303 See Other` back to the same URL.
//! 3. Anything else is answered with `401` and the login page.
//!
//! ## Sessions
//!
//! The cookie value is `<session id>.<signature>`, where the signature is
//! HMAC-SHA256 over the session id keyed by the password. Nothing is stored on
//! the server, so changing the password invalidates every issued session.
//!
//! ## Unconfigured mode
//!
//! When the login template cannot be read the gate lets every request through
//! and logs a warning for each one, unless started with `--missing-template deny`.

pub mod api;
pub mod cli;
pub mod gate;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
