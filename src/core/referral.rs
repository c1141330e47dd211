//! Referral codes and affiliate links.
//!
//! A referral code is `VH` followed by the first eight characters of the affiliate's
//! account id, uppercased. The same derivation is used to build links and to resolve
//! incoming codes back to an account.

use crate::errors::{Error, Result};

/// Prefix of every referral code.
pub const CODE_PREFIX: &str = "VH";

/// Query parameter that carries the referral code on landing URLs.
pub const REFERRAL_PARAM: &str = "ref";

const CODE_BODY_LEN: usize = 8;

/// Derives the referral code for an account identifier.
#[must_use]
pub fn referral_code(identifier: &str) -> String {
    let body: String = identifier.chars().take(CODE_BODY_LEN).collect();
    format!("{CODE_PREFIX}{}", body.to_uppercase())
}

/// Builds the shareable link for a referral code.
///
/// A bare origin gets `/?ref=CODE`; a base that already carries a query string
/// gets `&ref=CODE` appended.
#[must_use]
pub fn referral_link(base_url: &str, code: &str) -> String {
    let base = base_url.trim();
    if base.contains('?') {
        format!("{base}&{REFERRAL_PARAM}={code}")
    } else {
        format!("{}/?{REFERRAL_PARAM}={code}", base.trim_end_matches('/'))
    }
}

/// Checks that an incoming referral code has the shape produced by
/// [`referral_code`] and is safe to store in a cookie.
///
/// # Errors
/// Returns [`Error::InputValidation`] for a malformed code.
pub fn validate_code(code: &str) -> Result<&str> {
    let body = code
        .strip_prefix(CODE_PREFIX)
        .ok_or_else(|| malformed(code))?;

    let len = body.chars().count();
    let cookie_safe = body
        .chars()
        .all(|c| c.is_ascii_graphic() && !matches!(c, ';' | '=' | ',' | '"' | '\\'));
    let has_lowercase = body.chars().any(|c| c.is_ascii_lowercase());

    if len == 0 || len > CODE_BODY_LEN || !cookie_safe || has_lowercase {
        return Err(malformed(code));
    }
    Ok(code)
}

fn malformed(code: &str) -> Error {
    Error::invalid(format!("malformed referral code '{code}'"))
}

/// Reads the referral code from a landing URL query string (with or without the
/// leading `?`). Empty values are treated as absent.
#[must_use]
pub fn code_from_query(query: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == REFERRAL_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
