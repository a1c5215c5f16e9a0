use crate::error_handling::types::ProtocolError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope sent by the browser terminal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Connect {
        #[serde(rename = "containerTarget", alias = "containerName")]
        container_target: String,
    },
    Input {
        data: String,
    },
    Resize {
        cols: u16,
        rows: u16,
    },
    Disconnect,
}

/// Envelope sent back to the browser terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Connected { id: Uuid },
    Data { data: String },
    Exit { code: Option<i32> },
    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn decode_text(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Binary frames carry the same JSON, as UTF-8.
pub fn decode_binary(bytes: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ProtocolError::NotText)?;
    decode_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_every_client_envelope() {
        assert_eq!(
            decode_text(r#"{"type":"connect","containerTarget":"web-1"}"#).unwrap(),
            ClientMessage::Connect {
                container_target: "web-1".to_string()
            }
        );
        assert_eq!(
            decode_text(r#"{"type":"input","data":"ls\r"}"#).unwrap(),
            ClientMessage::Input {
                data: "ls\r".to_string()
            }
        );
        assert_eq!(
            decode_text(r#"{"type":"resize","cols":120,"rows":40}"#).unwrap(),
            ClientMessage::Resize {
                cols: 120,
                rows: 40
            }
        );
        assert_eq!(
            decode_text(r#"{"type":"disconnect"}"#).unwrap(),
            ClientMessage::Disconnect
        );
    }

    #[test]
    fn connect_accepts_container_name_alias() {
        assert_eq!(
            decode_text(r#"{"type":"connect","containerName":"demo-ubuntu"}"#).unwrap(),
            ClientMessage::Connect {
                container_target: "demo-ubuntu".to_string()
            }
        );
    }

    #[test]
    fn rejects_malformed_envelopes() {
        for frame in [
            "not json",
            r#"{"data":"x"}"#,
            r#"{"type":"launch"}"#,
            r#"{"type":"connect"}"#,
            r#"{"type":"resize","cols":-1,"rows":10}"#,
        ] {
            assert!(
                matches!(decode_text(frame), Err(ProtocolError::Malformed(_))),
                "{} should not decode",
                frame
            );
        }
        assert!(matches!(
            decode_binary(&[0xff, 0xfe]),
            Err(ProtocolError::NotText)
        ));
    }

    #[test]
    fn binary_frames_decode_as_text() {
        assert_eq!(
            decode_binary(br#"{"type":"input","data":"a"}"#).unwrap(),
            ClientMessage::Input {
                data: "a".to_string()
            }
        );
    }

    #[test]
    fn server_envelopes_have_wire_shape() {
        let id = Uuid::new_v4();
        let to_value = |m: &ServerMessage| -> serde_json::Value {
            serde_json::from_str(&m.to_json().unwrap()).unwrap()
        };

        assert_eq!(
            to_value(&ServerMessage::Connected { id }),
            json!({"type": "connected", "id": id.to_string()})
        );
        assert_eq!(
            to_value(&ServerMessage::Data {
                data: "\x1b[31mx".to_string()
            }),
            json!({"type": "data", "data": "\x1b[31mx"})
        );
        assert_eq!(
            to_value(&ServerMessage::Exit { code: None }),
            json!({"type": "exit", "code": null})
        );
        assert_eq!(
            to_value(&ServerMessage::Exit { code: Some(0) }),
            json!({"type": "exit", "code": 0})
        );
        assert_eq!(
            to_value(&ServerMessage::error("boom")),
            json!({"type": "error", "message": "boom"})
        );
    }
}
