use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;

/// Digits, spaces and the usual phone punctuation.
pub static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-\s()]+$").expect("phone pattern is valid"));

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").expect("pattern is valid"));

/// Canonical form used for the fallback result lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Derives the client-facing user id handed out at registration.
///
/// `ann@x.com` -> `user_ann_x_com_1712345678901`.
pub fn derive_user_id(email: &str) -> String {
    let sanitized = NON_ALPHANUMERIC.replace_all(email.trim(), "_");
    format!("user_{}_{}", sanitized, Utc::now().timestamp_millis())
}
