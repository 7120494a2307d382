//! Small shared helpers.

use chrono::Utc;

pub const APP_NAME: &str = "forum_backend";

pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339()
}

pub fn now_unix() -> i64 {
    Utc::now().timestamp()
}

/// Trims the input and maps an empty result to `None`.
pub fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
