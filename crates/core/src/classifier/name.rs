//! Best-effort display-name extraction from free-form announce messages.
//!
//! Observers print announce details as human readable text whose layout is
//! not stable. Extraction is a pure `&str -> Option<String>` lookup over a
//! few permissive patterns; no match is a normal outcome.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// `'name': 'value'` as printed for Python-style dicts.
static SINGLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r"'name':\s?'([^']*)'").unwrap());

/// `"name": "value"` as printed for JSON-style payloads.
static DOUBLE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""name":\s?"([^"]*)""#).unwrap());

/// Magnet display-name parameter.
static MAGNET_DN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]dn=([^&\s]+)").unwrap());

/// Try to pull a display name out of an announce message.
///
/// Patterns are tried in order; empty values count as no match.
pub fn extract_name(message: &str) -> Option<String> {
    let quoted = [&*SINGLE_QUOTED, &*DOUBLE_QUOTED]
        .into_iter()
        .find_map(|re| re.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string());

    let name = match quoted {
        Some(name) if !name.is_empty() => Some(name),
        _ => MAGNET_DN
            .captures(message)
            .and_then(|caps| caps.get(1))
            .map(|m| decode_dn(m.as_str())),
    };

    name.filter(|n| !n.is_empty())
}

fn decode_dn(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.trim().to_string(),
        Err(_) => spaced.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quoted_name() {
        let msg = "incoming dht announce: {'info_hash': 'abc', 'name': 'Ubuntu ISO', 'port': 6881}";
        assert_eq!(extract_name(msg).as_deref(), Some("Ubuntu ISO"));
    }

    #[test]
    fn test_single_quoted_without_space() {
        assert_eq!(extract_name("{'name':'Debian'}").as_deref(), Some("Debian"));
    }

    #[test]
    fn test_double_quoted_name() {
        let msg = r#"announce {"name": "Arch Linux 2026.10.01", "port": 1}"#;
        assert_eq!(extract_name(msg).as_deref(), Some("Arch Linux 2026.10.01"));
    }

    #[test]
    fn test_magnet_display_name() {
        let msg = "peer announced magnet:?xt=urn:btih:abc&dn=Big+Buck%20Bunny&tr=udp";
        assert_eq!(extract_name(msg).as_deref(), Some("Big Buck Bunny"));
    }

    #[test]
    fn test_empty_quoted_name_falls_through() {
        assert_eq!(extract_name("{'name': ''}"), None);
        assert_eq!(
            extract_name("{'name': ''} magnet:?dn=Fallback").as_deref(),
            Some("Fallback")
        );
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract_name(""), None);
        assert_eq!(extract_name("incoming dht announce: 1.2.3.4:6881"), None);
        assert_eq!(extract_name("'name': unterminated"), None);
    }
}
