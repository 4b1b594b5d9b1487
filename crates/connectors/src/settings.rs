//! Connection settings stored in `integrations.config`.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use syncbridge_db::models::integration::Integration;

use crate::error::{ConnectorError, ConnectorResult};

/// Default records requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Parsed `integrations.config` document.
///
/// ```json
/// { "base_url": "https://erp.example.com/api", "api_token": "...",
///   "page_size": 200, "field_renames": { "custitem_sku": "itemId" } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// External field name → field name the transformer reads.
    #[serde(default)]
    pub field_renames: HashMap<String, String>,
}

impl ConnectionSettings {
    pub fn from_integration(integration: &Integration) -> ConnectorResult<Self> {
        let settings: Self =
            serde_json::from_value(integration.config.clone()).map_err(|e| {
                ConnectorError::Settings {
                    integration_id: integration.id,
                    message: e.to_string(),
                }
            })?;

        if !(settings.base_url.starts_with("http://") || settings.base_url.starts_with("https://"))
        {
            return Err(ConnectorError::Settings {
                integration_id: integration.id,
                message: format!("base_url must be an http(s) URL, got '{}'", settings.base_url),
            });
        }
        if settings.page_size == 0 {
            return Err(ConnectorError::Settings {
                integration_id: integration.id,
                message: "page_size must be positive".to_string(),
            });
        }
        Ok(settings)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
