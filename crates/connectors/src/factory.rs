//! Builds connectors for integration rows.

use std::sync::Arc;

use syncbridge_core::transform::{netsuite, shopify};
use syncbridge_db::models::integration::Integration;

use crate::connector::Connector;
use crate::error::{ConnectorError, ConnectorResult};
use crate::rest::RestConnector;
use crate::settings::ConnectionSettings;

/// Creates a fresh, not yet handshaken connector for an integration.
pub trait ConnectorFactory: Send + Sync {
    fn create(&self, integration: &Integration) -> ConnectorResult<Arc<dyn Connector>>;
}

/// Factory producing [`RestConnector`]s for the supported systems.
pub struct RestConnectorFactory {
    client: reqwest::Client,
    systems: Vec<String>,
}

impl RestConnectorFactory {
    /// Factory for the systems with built-in transformers.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            systems: vec![netsuite::SYSTEM.to_string(), shopify::SYSTEM.to_string()],
        }
    }

    pub fn supports(&self, system: &str) -> bool {
        self.systems.iter().any(|s| s == system)
    }
}

impl Default for RestConnectorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectorFactory for RestConnectorFactory {
    fn create(&self, integration: &Integration) -> ConnectorResult<Arc<dyn Connector>> {
        if !integration.is_active {
            return Err(ConnectorError::Inactive(integration.id));
        }
        if !self.supports(&integration.system) {
            return Err(ConnectorError::UnsupportedSystem(integration.system.clone()));
        }
        let settings = ConnectionSettings::from_integration(integration)?;
        Ok(Arc::new(RestConnector::with_client(
            self.client.clone(),
            integration.id,
            integration.system.clone(),
            settings,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    fn integration(system: &str, is_active: bool) -> Integration {
        Integration {
            id: 4,
            tenant_id: 1,
            system: system.into(),
            name: "store".into(),
            config: json!({"base_url": "https://shop.test"}),
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn builds_connector_for_supported_system() {
        let connector = RestConnectorFactory::new()
            .create(&integration("shopify", true))
            .unwrap();
        assert_eq!(connector.system(), "shopify");
    }

    #[test]
    fn rejects_unknown_and_inactive_integrations() {
        let factory = RestConnectorFactory::new();
        assert_matches!(
            factory.create(&integration("sap", true)).err(),
            Some(ConnectorError::UnsupportedSystem(s)) if s == "sap"
        );
        assert_matches!(
            factory.create(&integration("netsuite", false)).err(),
            Some(ConnectorError::Inactive(4))
        );
    }
}
