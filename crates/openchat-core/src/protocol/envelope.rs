use serde::{Deserialize, Serialize};

use super::WorkerError;
use crate::events::AgentEvent;

/// One message on the channel between the bridge client and the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    #[serde(rename_all = "camelCase")]
    Request {
        correlation_id: String,
        request_kind: String,
        #[serde(default)]
        payload: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        correlation_id: String,
        #[serde(default)]
        response: serde_json::Value,
    },
    #[serde(rename_all = "camelCase")]
    Error {
        correlation_id: String,
        error: WorkerError,
    },
    Event { event: AgentEvent },
}

impl Envelope {
    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Envelope::Request { correlation_id, .. }
            | Envelope::Response { correlation_id, .. }
            | Envelope::Error { correlation_id, .. } => Some(correlation_id),
            Envelope::Event { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Request { .. } => "request",
            Envelope::Response { .. } => "response",
            Envelope::Error { .. } => "error",
            Envelope::Event { .. } => "event",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let envelope = Envelope::Request {
            correlation_id: "abc".to_string(),
            request_kind: "pinChat".to_string(),
            payload: json!({"chatId": "c1"}),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "kind": "request",
                "correlationId": "abc",
                "requestKind": "pinChat",
                "payload": {"chatId": "c1"}
            })
        );
    }

    #[test]
    fn test_event_has_no_correlation_id() {
        let envelope: Envelope = serde_json::from_value(json!({
            "kind": "event",
            "event": {"subkind": "users_loaded", "users": []}
        }))
        .unwrap();
        assert_eq!(envelope.correlation_id(), None);
        assert_eq!(envelope.kind(), "event");
    }

    #[test]
    fn test_error_envelope_parses() {
        let envelope: Envelope = serde_json::from_value(json!({
            "kind": "error",
            "correlationId": "xyz",
            "error": {"kind": "agent_not_initialized"}
        }))
        .unwrap();
        assert_eq!(envelope.correlation_id(), Some("xyz"));
        assert!(matches!(
            envelope,
            Envelope::Error {
                error: WorkerError::AgentNotInitialized,
                ..
            }
        ));
    }
}
