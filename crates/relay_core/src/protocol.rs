//! Protocolo de comunicação: tópicos MQTT e payloads JSON.
//!
//! ```text
//! iot/devices/<device_id>/telemetry   → TelemetryMessage (dispositivo → broker)
//! iot/devices/<device_id>/commands    → {"command": "..."} (broker → dispositivo)
//! ```

use crate::types::{NotificationMessage, Reading, TelemetryMessage};
use serde::{Deserialize, Serialize};

/// Prefixo comum de todos os tópicos.
pub const TOPIC_PREFIX: &str = "iot/devices";

/// Assinatura de telemetria de todos os dispositivos.
pub const TELEMETRY_WILDCARD: &str = "iot/devices/+/telemetry";

/// UUID do serviço anunciado no link de curto alcance.
pub const SERVICE_UUID: &str = "12345678-1234-1234-1234-123456789abc";

/// UUID do atributo read/write/notify.
pub const CHARACTERISTIC_UUID: &str = "87654321-4321-4321-4321-cba987654321";

/// Erros do protocolo.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Erro de serialização: {0}")]
    Serialize(String),

    #[error("Mensagem malformada: {0}")]
    Malformed(String),

    #[error("Comando desconhecido: '{0}'")]
    UnknownCommand(String),
}

pub fn telemetry_topic(device_id: &str) -> String {
    format!("{TOPIC_PREFIX}/{device_id}/telemetry")
}

pub fn command_topic(device_id: &str) -> String {
    format!("{TOPIC_PREFIX}/{device_id}/commands")
}

/// Extrai o ID do dispositivo de `iot/devices/<id>/<canal>`.
pub fn device_id_from_topic(topic: &str) -> Option<&str> {
    let rest = topic.strip_prefix(TOPIC_PREFIX)?.strip_prefix('/')?;
    let (id, _channel) = rest.split_once('/')?;
    (!id.is_empty()).then_some(id)
}

/// Codifica a leitura para o tópico de telemetria.
pub fn encode_telemetry(device_id: &str, reading: &Reading) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(&TelemetryMessage::new(device_id, reading))
        .map_err(|e| ProtocolError::Serialize(e.to_string()))
}

/// Codifica a leitura para o link de curto alcance (sem timestamp).
pub fn encode_notification(device_id: &str, reading: &Reading) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(&NotificationMessage::new(device_id, reading))
        .map_err(|e| ProtocolError::Serialize(e.to_string()))
}

/// Decodifica um payload de telemetria recebido pelo broker.
pub fn decode_telemetry(data: &[u8]) -> Result<TelemetryMessage, ProtocolError> {
    serde_json::from_slice(data).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

// ──────────────────────────────────────────────
// Comandos
// ──────────────────────────────────────────────

/// Comandos aceitos no tópico de comandos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Inverte o LED de status
    ToggleLed,
    /// Reinicia o dispositivo imediatamente
    Reset,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::ToggleLed => "toggle_led",
            Command::Reset => "reset",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ProtocolError> {
        match name {
            "toggle_led" => Ok(Command::ToggleLed),
            "reset" => Ok(Command::Reset),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CommandEnvelope {
    command: String,
}

/// Decodifica `{"command": "<nome>"}`.
pub fn decode_command(data: &[u8]) -> Result<Command, ProtocolError> {
    let envelope: CommandEnvelope =
        serde_json::from_slice(data).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Command::parse(&envelope.command)
}

/// Codifica um comando para envio ao dispositivo.
pub fn encode_command(command: Command) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(&CommandEnvelope {
        command: command.as_str().to_string(),
    })
    .map_err(|e| ProtocolError::Serialize(e.to_string()))
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_reading() -> Reading {
        Reading {
            temperature: 20.1,
            humidity: 55.0,
            weight: 1.2,
            battery: 90,
            timestamp: 1000,
        }
    }

    #[test]
    fn topics_follow_device_identity() {
        assert_eq!(telemetry_topic("esp32_001"), "iot/devices/esp32_001/telemetry");
        assert_eq!(command_topic("esp32_001"), "iot/devices/esp32_001/commands");
        assert_eq!(
            device_id_from_topic("iot/devices/esp32_002/telemetry"),
            Some("esp32_002")
        );
        assert_eq!(device_id_from_topic("iot/devices//telemetry"), None);
        assert_eq!(device_id_from_topic("other/esp32_002/telemetry"), None);
    }

    #[test]
    fn telemetry_payload_has_expected_fields() {
        let bytes = encode_telemetry("esp32_001", &sample_reading()).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["device_id"], "esp32_001");
        assert_eq!(v["battery"], 90);
        assert_eq!(v["timestamp"], 1000);
        assert!((v["temperature"].as_f64().unwrap() - 20.1).abs() < 1e-4);
        assert_eq!(v.as_object().unwrap().len(), 6);
    }

    #[test]
    fn notification_payload_has_no_timestamp() {
        let bytes = encode_notification("esp32_001", &sample_reading()).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(v.get("timestamp").is_none());
        assert_eq!(v["device_id"], "esp32_001");
        assert_eq!(v.as_object().unwrap().len(), 5);
    }

    #[test]
    fn decodes_telemetry_from_broker() {
        let raw = br#"{"device_id":"esp32_003","temperature":22.5,"humidity":60.0,"weight":4.25,"battery":88,"timestamp":42}"#;
        let msg = decode_telemetry(raw).unwrap();
        assert_eq!(msg.device_id, "esp32_003");
        assert_eq!(msg.reading().battery, 88);
        assert!(matches!(
            decode_telemetry(b"not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn decodes_known_commands() {
        assert_eq!(
            decode_command(br#"{"command":"toggle_led"}"#).unwrap(),
            Command::ToggleLed
        );
        assert_eq!(
            decode_command(br#"{"command":"reset"}"#).unwrap(),
            Command::Reset
        );
        assert_eq!(
            decode_command(&encode_command(Command::Reset).unwrap()).unwrap(),
            Command::Reset
        );
    }

    #[test]
    fn rejects_unknown_or_malformed_commands() {
        assert!(matches!(
            decode_command(br#"{"command":"bogus"}"#),
            Err(ProtocolError::UnknownCommand(ref c)) if c == "bogus"
        ));
        assert!(matches!(
            decode_command(br#"{"cmd":"reset"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode_command(b"\xff\xfe"),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
