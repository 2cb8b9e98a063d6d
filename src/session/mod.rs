//! Terminal sessions against the device-facing endpoint
//!
//! One session is opened per test unit and closed when the unit finishes,
//! whatever way it finishes. A closed session never delivers another action.

mod loopback;

pub use loopback::{LoopbackConnector, LoopbackRule, LoopbackScript};

use async_trait::async_trait;
use std::sync::Arc;

use crate::common::config::Endpoints;
use crate::common::{Error, Result};
use crate::model::{InputEvent, TerminalAction, TestUnit, TransportKind};

/// Callback invoked for every action the session receives
pub type ActionHandler = Arc<dyn Fn(TerminalAction) + Send + Sync>;

/// Everything needed to open one terminal session
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub url: String,
    pub transport: TransportKind,
    pub product_id: String,
    /// Unique per unit so sessions never share a terminal identity
    pub terminal_id: String,
    pub secret_key: String,
    pub protocol_version: String,
}

/// Opens sessions for a transport implementation
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, endpoint: &EndpointConfig) -> Result<Box<dyn Session>>;
}

/// An open terminal session
#[async_trait]
pub trait Session: Send {
    /// Register the action callback, replacing any earlier one
    fn on_action(&mut self, handler: ActionHandler);

    /// Send one event and wait for it to be acknowledged
    async fn send(&mut self, event: &InputEvent) -> Result<()>;

    /// Close the session; no callback runs once this returns
    async fn close(&mut self) -> Result<()>;
}

/// Pick the endpoint for a unit from its product's settings
///
/// MQTT is preferred when the product supports both transports. Fails when
/// the product has no secret key or supports neither transport.
pub fn resolve_endpoint(unit: &TestUnit, endpoints: &Endpoints) -> Result<EndpointConfig> {
    let product = &unit.product;
    let secret_key = product
        .secret_key()
        .ok_or_else(|| Error::MissingSecretKey {
            product: product.id.clone(),
        })?
        .to_string();

    let supports = |kind| product.settings.transports.contains(&kind);
    let (transport, url) = if supports(TransportKind::Mqtt) {
        (TransportKind::Mqtt, endpoints.mqtt_url.clone())
    } else if supports(TransportKind::WebSocket) {
        (TransportKind::WebSocket, endpoints.websocket_url.clone())
    } else {
        return Err(Error::UnsupportedTransport {
            product: product.id.clone(),
        });
    };

    Ok(EndpointConfig {
        url,
        transport,
        product_id: product.id.clone(),
        terminal_id: format!("Test-{}-{}", product.id, unit.id),
        secret_key,
        protocol_version: endpoints.protocol_version.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mode, Product, ProductSettings};

    fn unit_for(keys: &[&str], transports: Vec<TransportKind>) -> TestUnit {
        let product = Arc::new(Product {
            id: "p1".into(),
            name: "Lamp".into(),
            settings: ProductSettings {
                secret_keys: keys.iter().map(|k| k.to_string()).collect(),
                transports,
            },
        });
        TestUnit::new(Mode::PositiveMatch, product)
    }

    #[test]
    fn test_mqtt_preferred() {
        let unit = unit_for(&["k1"], vec![TransportKind::WebSocket, TransportKind::Mqtt]);
        let endpoint = resolve_endpoint(&unit, &Endpoints::default()).unwrap();
        assert_eq!(endpoint.transport, TransportKind::Mqtt);
        assert_eq!(endpoint.url, "tcp://127.0.0.1:1883");
        assert_eq!(endpoint.secret_key, "k1");
        assert_eq!(endpoint.terminal_id, format!("Test-p1-{}", unit.id));
    }

    #[test]
    fn test_websocket_fallback() {
        let unit = unit_for(&["k1"], vec![TransportKind::WebSocket]);
        let endpoint = resolve_endpoint(&unit, &Endpoints::default()).unwrap();
        assert_eq!(endpoint.transport, TransportKind::WebSocket);
        assert_eq!(endpoint.url, "ws://127.0.0.1:8080/terminal");
    }

    #[test]
    fn test_configuration_errors() {
        let no_key = unit_for(&[], vec![TransportKind::Mqtt]);
        assert!(matches!(
            resolve_endpoint(&no_key, &Endpoints::default()),
            Err(Error::MissingSecretKey { .. })
        ));

        let no_transport = unit_for(&["k1"], vec![]);
        let err = resolve_endpoint(&no_transport, &Endpoints::default()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTransport { .. }));
        assert!(err.is_config());
    }
}
