//! Product and scene catalog types
//!
//! These mirror what the configuration/lookup services hand back. The
//! harness only reads them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::Error;

/// Device-facing transport a product can speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    /// Pub/sub protocol
    #[serde(rename = "MQTT", alias = "mqtt")]
    Mqtt,
    /// Socket-stream protocol
    #[serde(rename = "WS", alias = "WEBSOCKET", alias = "ws", alias = "websocket")]
    WebSocket,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Mqtt => write!(f, "MQTT"),
            TransportKind::WebSocket => write!(f, "WS"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MQTT" => Ok(TransportKind::Mqtt),
            "WS" | "WEBSOCKET" => Ok(TransportKind::WebSocket),
            _ => Err(Error::UnknownTransport(s.to_string())),
        }
    }
}

/// Per-product connection settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSettings {
    /// Secret keys issued to the product; the first one is used
    #[serde(default)]
    pub secret_keys: Vec<String>,
    /// Transports the product accepts terminals on
    #[serde(default)]
    pub transports: Vec<TransportKind>,
}

/// A product registered with the rule engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub settings: ProductSettings,
}

impl Product {
    /// Secret key used for terminal sessions
    pub fn secret_key(&self) -> Option<&str> {
        self.settings
            .secret_keys
            .first()
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }

    /// Display label, falling back to the id when the product is unnamed
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// A when/then rule under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Trigger definition, opaque to the harness
    #[serde(default)]
    pub when: serde_json::Value,
    /// Meta-action ids the rule emits when it fires
    #[serde(default)]
    pub output_action_ids: Vec<String>,
}

/// A scene groups the rules of one product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub product_id: String,
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
}

/// Catalog entry for an event type a product can emit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaEvent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub product_id: String,
    /// Payload field descriptions, opaque to the harness
    #[serde(default)]
    pub fields: serde_json::Value,
}

/// Catalog entry for an action the rule engine can send back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaAction {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub product_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_names() {
        assert_eq!("mqtt".parse::<TransportKind>().unwrap(), TransportKind::Mqtt);
        assert_eq!("WS".parse::<TransportKind>().unwrap(), TransportKind::WebSocket);
        assert_eq!(
            "websocket".parse::<TransportKind>().unwrap(),
            TransportKind::WebSocket
        );
        assert!("coap".parse::<TransportKind>().is_err());

        let parsed: Vec<TransportKind> = serde_json::from_str(r#"["MQTT", "WEBSOCKET"]"#).unwrap();
        assert_eq!(parsed, vec![TransportKind::Mqtt, TransportKind::WebSocket]);
    }

    #[test]
    fn test_secret_key_uses_first_non_empty() {
        let mut product = Product {
            id: "p1".into(),
            name: String::new(),
            settings: ProductSettings::default(),
        };
        assert_eq!(product.secret_key(), None);
        assert_eq!(product.label(), "p1");

        product.settings.secret_keys = vec!["k1".into(), "k2".into()];
        assert_eq!(product.secret_key(), Some("k1"));

        product.settings.secret_keys = vec![String::new()];
        assert_eq!(product.secret_key(), None);
    }
}
