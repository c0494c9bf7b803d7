use chrono::{SecondsFormat, Utc};

pub const APP_NAME: &str = "agora_backend";

/// RFC 3339 UTC timestamp with fixed microsecond precision, so that string
/// order matches chronological order in SQL.
pub fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Trims and drops blank optional strings coming from request bodies.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_sort_lexicographically() {
        let first = now_utc_iso();
        let second = now_utc_iso();
        assert_eq!(first.len(), second.len());
        assert!(first <= second);
        assert!(first.ends_with('Z'));
    }

    #[test]
    fn non_blank_filters_whitespace() {
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some(" x ".into())), Some("x".into()));
        assert_eq!(non_blank(None), None);
    }
}
