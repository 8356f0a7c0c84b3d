//! Wire protocol for client-server communication.
//!
//! One JSON document per line in each direction. Requests carry a caller
//! id that is echoed on the matching reply; replies to concurrent requests
//! may arrive in any order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use replkit_core::ToolInfo;

/// Message from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Invoke a named tool with key/value arguments.
    Invoke {
        id: u64,
        tool: String,
        #[serde(default)]
        args: Value,
    },
    /// List the advertised tool definitions.
    ListTools { id: u64 },
    /// Keepalive.
    Ping,
}

/// Message from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerReply {
    /// Successful invocation.
    Result { id: u64, content: String },
    /// Failed invocation or malformed request (id 0 when unattributable).
    Error { id: u64, message: String },
    /// Tool definitions.
    Tools { id: u64, tools: Vec<ToolInfo> },
    /// Keepalive response.
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_roundtrip() {
        let request = ClientRequest::Invoke {
            id: 7,
            tool: "shell".to_string(),
            args: serde_json::json!({ "command": "echo hi" }),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("invoke"));

        let parsed: ClientRequest = serde_json::from_str(&json).unwrap();
        if let ClientRequest::Invoke { id, tool, args } = parsed {
            assert_eq!(id, 7);
            assert_eq!(tool, "shell");
            assert_eq!(args["command"], "echo hi");
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_invoke_args_default_to_null() {
        let parsed: ClientRequest =
            serde_json::from_str(r#"{"type":"invoke","id":1,"tool":"shell"}"#).unwrap();
        if let ClientRequest::Invoke { args, .. } = parsed {
            assert!(args.is_null());
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_reply_serialization() {
        let reply = ServerReply::Error {
            id: 3,
            message: "unknown tool: nope".to_string(),
        };
        let json = serde_json::to_string(&reply).unwrap();
        assert!(json.contains("error"));

        let parsed: ServerReply = serde_json::from_str(&json).unwrap();
        if let ServerReply::Error { id, message } = parsed {
            assert_eq!(id, 3);
            assert!(message.contains("nope"));
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_ping_pong_roundtrip() {
        let json = serde_json::to_string(&ClientRequest::Ping).unwrap();
        let parsed: ClientRequest = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ClientRequest::Ping));

        let json = serde_json::to_string(&ServerReply::Pong).unwrap();
        let parsed: ServerReply = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ServerReply::Pong));
    }
}
