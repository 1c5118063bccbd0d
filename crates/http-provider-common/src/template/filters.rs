//! Filters available to request templates
//!
//! `tojson` is built into minijinja. Everything else a request needs
//! (fallbacks, basic-auth encoding, header casing) is registered here.

use base64::{engine::general_purpose::STANDARD, Engine};
use minijinja::{Environment, Error, ErrorKind, Value};

/// Install every request filter into `env`
pub fn register(env: &mut Environment<'static>) {
    env.add_filter("default", fallback);
    env.add_filter("base64_encode", encode_base64);
    env.add_filter("base64_decode", decode_base64);
    env.add_filter("upper", |s: &str| s.to_uppercase());
    env.add_filter("lower", |s: &str| s.to_lowercase());
}

/// `${ response.body.token | default("") }`
///
/// Only undefined and null fall back; an empty string is a real value.
pub fn fallback(value: Value, or: Value) -> Value {
    match value.is_undefined() || value.is_none() {
        true => or,
        false => value,
    }
}

/// `${ secret.creds.basic | base64_encode }`
pub fn encode_base64(raw: &str) -> String {
    STANDARD.encode(raw)
}

/// Decode into UTF-8 text; binary payloads cannot be placed in a request
pub fn decode_base64(encoded: &str) -> Result<String, Error> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::new(ErrorKind::InvalidOperation, format!("base64_decode: {e}")))?;
    String::from_utf8(bytes).map_err(|_| {
        Error::new(
            ErrorKind::InvalidOperation,
            "base64_decode: decoded bytes are not UTF-8 text",
        )
    })
}
