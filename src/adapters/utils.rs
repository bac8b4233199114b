//! Shared helpers for adapter-layer validation.

/// Returns `true` if every byte of `s` is in the printable ASCII range
/// `0x20..=0x7E` (space through tilde, inclusive).
///
/// Used to validate WiFi SSIDs and the backend URL.
pub(super) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Whether `url` looks like an absolute http(s) URL without a query part.
pub(super) fn is_backend_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            !rest.is_empty() && !url.contains('?') && !url.contains(' ') && is_printable_ascii(url)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_ascii_accepts_normal_strings() {
        assert!(is_printable_ascii("HomeNetwork"));
        assert!(is_printable_ascii("P@$$w0rd!"));
        assert!(is_printable_ascii(""));
    }

    #[test]
    fn printable_ascii_rejects_control_and_high_bytes() {
        assert!(!is_printable_ascii("bad\x00ssid"));
        assert!(!is_printable_ascii("tab\there"));
        assert!(!is_printable_ascii("caf\u{e9}"));
    }

    #[test]
    fn backend_url_shape() {
        assert!(is_backend_url("https://script.google.com/macros/s/abc/exec"));
        assert!(is_backend_url("http://192.168.1.10:8080/api"));
        assert!(!is_backend_url(""));
        assert!(!is_backend_url("https://"));
        assert!(!is_backend_url("ftp://host/x"));
        assert!(!is_backend_url("https://host/exec?action=update"));
    }
}
