use axum::extract::ws::{Message, Utf8Bytes};
use serde_json::json;

/// Events delivered to live topology viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyEvent {
    /// The inventory changed; the viewer should re-fetch the graph.
    TopologyChanged,
    /// Keepalive, sent when the connection has been idle too long.
    Ping,
}

impl TopologyEvent {
    pub fn to_message(self) -> Message {
        match self {
            TopologyEvent::TopologyChanged => Message::Text(
                json!({"event": "update_topology"}).to_string().into(),
            ),
            TopologyEvent::Ping => {
                Message::Text(Utf8Bytes::from_static("ping"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_event_is_the_fixed_update_payload() {
        let Message::Text(text) = TopologyEvent::TopologyChanged.to_message()
        else {
            panic!("expected text frame");
        };
        let value: serde_json::Value =
            serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["event"], "update_topology");
    }

    #[test]
    fn keepalive_is_plain_ping() {
        let Message::Text(text) = TopologyEvent::Ping.to_message() else {
            panic!("expected text frame");
        };
        assert_eq!(text.as_str(), "ping");
    }
}
