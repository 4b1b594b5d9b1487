//! JSON-over-HTTP connector.
//!
//! Every external system is reached through the same small REST contract:
//!
//! ```text
//! GET  {base_url}/ping                          handshake
//! GET  {base_url}/{entity}?limit=N&cursor=C     -> { records, next_cursor }
//! POST {base_url}/{entity}/batch { records }    -> { accepted, rejected }
//! ```
//!
//! Authentication is a bearer token from the integration settings.

use async_trait::async_trait;
use serde_json::Value;
use syncbridge_core::entity::EntityKind;
use syncbridge_core::types::DbId;

use crate::connector::{Connector, FetchPage, PushOutcome};
use crate::error::{ConnectorError, ConnectorResult};
use crate::settings::ConnectionSettings;

pub struct RestConnector {
    integration_id: DbId,
    system: String,
    settings: ConnectionSettings,
    client: reqwest::Client,
}

impl RestConnector {
    /// Create a connector reusing an existing [`reqwest::Client`] so the
    /// connection pool is shared across integrations.
    pub fn with_client(
        client: reqwest::Client,
        integration_id: DbId,
        system: impl Into<String>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            integration_id,
            system: system.into(),
            settings,
            client,
        }
    }

    pub fn integration_id(&self) -> DbId {
        self.integration_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.settings.base_url())
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.settings.timeout());
        match &self.settings.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ---- private helpers ----

    async fn ensure_success(&self, response: reqwest::Response) -> ConnectorResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ConnectorError::Api {
                system: self.system.clone(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ConnectorResult<T> {
        let response = self.ensure_success(response).await?;
        let body: Value = response.json().await?;
        serde_json::from_value(body)
            .map_err(|e| ConnectorError::Protocol(format!("Unexpected {} response: {e}", self.system)))
    }
}

#[async_trait]
impl Connector for RestConnector {
    fn system(&self) -> &str {
        &self.system
    }

    async fn test_connection(&self) -> ConnectorResult<()> {
        let response = self.request(self.client.get(self.url("ping"))).send().await?;
        self.ensure_success(response).await?;
        tracing::debug!(
            integration_id = self.integration_id,
            system = %self.system,
            "Connector handshake succeeded",
        );
        Ok(())
    }

    async fn fetch_entities(
        &self,
        entity: EntityKind,
        cursor: Option<&str>,
    ) -> ConnectorResult<FetchPage> {
        let mut query = vec![("limit", self.settings.page_size.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let response = self
            .request(self.client.get(self.url(entity.as_str())))
            .query(&query)
            .send()
            .await?;
        let page: FetchPage = self.parse_response(response).await?;

        tracing::debug!(
            integration_id = self.integration_id,
            entity = %entity,
            records = page.records.len(),
            has_more = page.next_cursor.is_some(),
            "Fetched page",
        );
        Ok(page)
    }

    async fn push_entities(&self, entity: EntityKind, batch: &[Value]) -> ConnectorResult<PushOutcome> {
        let body = serde_json::json!({ "records": batch });
        let response = self
            .request(self.client.post(self.url(&format!("{}/batch", entity.as_str()))))
            .json(&body)
            .send()
            .await?;
        let outcome: PushOutcome = self.parse_response(response).await?;

        if outcome.accepted + outcome.rejected.len() != batch.len() {
            tracing::warn!(
                integration_id = self.integration_id,
                entity = %entity,
                sent = batch.len(),
                accepted = outcome.accepted,
                rejected = outcome.rejected.len(),
                "Push outcome does not account for every record",
            );
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn connector(base_url: &str) -> RestConnector {
        RestConnector::with_client(
            reqwest::Client::new(),
            3,
            "shopify",
            ConnectionSettings {
                base_url: base_url.to_string(),
                api_token: None,
                page_size: 50,
                timeout_secs: 5,
                field_renames: HashMap::new(),
            },
        )
    }

    #[test]
    fn urls_join_without_double_slash() {
        let c = connector("https://shop.test/api/");
        assert_eq!(c.url("products"), "https://shop.test/api/products");
        assert_eq!(c.url("ping"), "https://shop.test/api/ping");
    }

    #[test]
    fn fetch_page_tolerates_missing_cursor() {
        let page: FetchPage = serde_json::from_value(serde_json::json!({
            "records": [{"id": 1}]
        }))
        .unwrap();
        assert_eq!(page.records.len(), 1);
        assert!(page.next_cursor.is_none());
    }
}
