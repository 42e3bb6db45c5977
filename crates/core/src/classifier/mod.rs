//! Classification of raw swarm events.
//!
//! Turns whatever the observer emits into one of four shapes. Only
//! `HashAnnounced` drives resolution; everything else is informational.
//! Classification is total: malformed input degrades to `Unclassified` or to
//! the `"Unknown"` name, never to an error.

mod name;

pub use name::extract_name;

use crate::record::UNKNOWN_NAME;
use crate::swarm::{InfoHash, SwarmEvent};

/// A classified swarm event.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    /// A peer announced interest in `hash`.
    HashAnnounced { hash: InfoHash, name: String },
    /// Periodic swarm statistics.
    StatsEvent {
        node_count: u64,
        active_request_count: u64,
    },
    /// Diagnostic text, for logging only.
    DiagnosticEvent { text: String },
    /// Anything else.
    Unclassified { kind: String, text: String },
}

/// Classify one raw event.
pub fn classify(event: SwarmEvent) -> Classified {
    match event {
        SwarmEvent::Announce {
            info_hash,
            name,
            message,
        } => match InfoHash::parse(&info_hash) {
            Some(hash) => Classified::HashAnnounced {
                hash,
                name: announce_name(name, &message),
            },
            None => Classified::Unclassified {
                kind: "announce".to_string(),
                text: format!("unparseable info hash {:?}: {}", info_hash, message),
            },
        },
        SwarmEvent::DhtStats {
            num_nodes,
            num_peers,
        } => Classified::StatsEvent {
            node_count: num_nodes,
            active_request_count: num_peers,
        },
        SwarmEvent::Log { message } => Classified::DiagnosticEvent { text: message },
        SwarmEvent::Other { kind, message } => Classified::Unclassified {
            kind,
            text: message,
        },
    }
}

/// Structured names win; otherwise parse the message; otherwise the sentinel.
fn announce_name(structured: Option<String>, message: &str) -> String {
    structured
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or_else(|| extract_name(message))
        .unwrap_or_else(|| UNKNOWN_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn announce(info_hash: &str, name: Option<&str>, message: &str) -> SwarmEvent {
        SwarmEvent::Announce {
            info_hash: info_hash.to_string(),
            name: name.map(String::from),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_announce_with_parsed_name() {
        let classified = classify(announce(
            &format!("<sha1_hash {}>", HEX),
            None,
            "{'name': 'Ubuntu ISO'}",
        ));

        assert_eq!(
            classified,
            Classified::HashAnnounced {
                hash: InfoHash::from_bytes([0xAA; 20]),
                name: "Ubuntu ISO".to_string(),
            }
        );
    }

    #[test]
    fn test_structured_name_takes_precedence() {
        let classified = classify(announce(HEX, Some("Structured"), "{'name': 'Parsed'}"));
        assert!(matches!(
            classified,
            Classified::HashAnnounced { ref name, .. } if name == "Structured"
        ));
    }

    #[test]
    fn test_blank_structured_name_falls_back_to_message() {
        let classified = classify(announce(HEX, Some("   "), "{'name': 'Parsed'}"));
        assert!(matches!(
            classified,
            Classified::HashAnnounced { ref name, .. } if name == "Parsed"
        ));
    }

    #[test]
    fn test_malformed_message_yields_unknown() {
        for message in ["", "garbage \u{0} ''''", "'name: broken", "{'name': ''}"] {
            let classified = classify(announce(HEX, None, message));
            assert!(
                matches!(classified, Classified::HashAnnounced { ref name, .. } if name == UNKNOWN_NAME),
                "message {:?} gave {:?}",
                message,
                classified
            );
        }
    }

    #[test]
    fn test_bad_hash_is_unclassified() {
        let classified = classify(announce("<sha1_hash 1234>", None, "{'name': 'x'}"));
        assert!(matches!(
            classified,
            Classified::Unclassified { ref kind, .. } if kind == "announce"
        ));
    }

    #[test]
    fn test_stats_event() {
        let classified = classify(SwarmEvent::DhtStats {
            num_nodes: 312,
            num_peers: 17,
        });
        assert_eq!(
            classified,
            Classified::StatsEvent {
                node_count: 312,
                active_request_count: 17,
            }
        );
    }

    #[test]
    fn test_log_and_other_events() {
        assert_eq!(
            classify(SwarmEvent::Log {
                message: "bootstrapped".to_string()
            }),
            Classified::DiagnosticEvent {
                text: "bootstrapped".to_string()
            }
        );
        assert_eq!(
            classify(SwarmEvent::Other {
                kind: "peer_connect".to_string(),
                message: "1.2.3.4".to_string()
            }),
            Classified::Unclassified {
                kind: "peer_connect".to_string(),
                text: "1.2.3.4".to_string()
            }
        );
    }
}
