//! API Gateway connection-management transport (`PostToConnection`).

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_apigatewaymanagement::Client;
use aws_sdk_apigatewaymanagement::error::DisplayErrorContext;
use aws_sdk_apigatewaymanagement::operation::post_to_connection::PostToConnectionError;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Connection, DeliveryChannel, DeliveryError};

/// Pushes payloads to WebSocket clients through the management API.
///
/// With a fixed endpoint one client is built up front. Otherwise clients are
/// built from the endpoint carried by the inbound event and kept per endpoint,
/// so every push after the first reuses the same connection pool.
#[derive(Debug)]
pub struct ApiGatewayChannel {
    sdk_config: aws_config::SdkConfig,
    fixed: Option<Client>,
    by_endpoint: RwLock<HashMap<String, Client>>,
}

impl ApiGatewayChannel {
    pub fn new(sdk_config: aws_config::SdkConfig, endpoint: Option<&str>) -> Self {
        let fixed = endpoint.map(|url| build_client(&sdk_config, url));
        if let Some(url) = endpoint {
            debug!(endpoint = %url, "API Gateway channel using fixed endpoint");
        }
        Self {
            sdk_config,
            fixed,
            by_endpoint: RwLock::new(HashMap::new()),
        }
    }

    async fn client_for(&self, connection: &Connection) -> Result<Client, DeliveryError> {
        if let Some(client) = &self.fixed {
            return Ok(client.clone());
        }
        let endpoint = connection.endpoint.as_deref().ok_or_else(|| {
            DeliveryError::Malformed(
                "no delivery endpoint configured and the event carried none".into(),
            )
        })?;

        if let Some(client) = self.by_endpoint.read().await.get(endpoint) {
            return Ok(client.clone());
        }
        let mut clients = self.by_endpoint.write().await;
        let client = clients
            .entry(endpoint.to_string())
            .or_insert_with(|| {
                debug!(endpoint, "Building API Gateway client for event endpoint");
                build_client(&self.sdk_config, endpoint)
            })
            .clone();
        Ok(client)
    }

    #[cfg(test)]
    async fn cached_endpoints(&self) -> usize {
        self.by_endpoint.read().await.len()
    }
}

fn build_client(sdk_config: &aws_config::SdkConfig, endpoint: &str) -> Client {
    let config = aws_sdk_apigatewaymanagement::config::Builder::from(sdk_config)
        .endpoint_url(endpoint)
        .build();
    Client::from_conf(config)
}

/// Map a `PostToConnection` failure onto the relay's delivery taxonomy.
fn classify(
    service_error: Option<&PostToConnectionError>,
    construction_failed: bool,
    detail: String,
) -> DeliveryError {
    match service_error {
        Some(e) if e.is_gone_exception() => DeliveryError::Gone(detail),
        Some(e) if e.is_payload_too_large_exception() || e.is_forbidden_exception() => {
            DeliveryError::Malformed(detail)
        }
        Some(_) => DeliveryError::Other(detail),
        None if construction_failed => DeliveryError::Malformed(detail),
        None => DeliveryError::Other(detail),
    }
}

#[async_trait]
impl DeliveryChannel for ApiGatewayChannel {
    async fn post(&self, connection: &Connection, payload: &[u8]) -> Result<(), DeliveryError> {
        let client = self.client_for(connection).await?;
        client
            .post_to_connection()
            .connection_id(&connection.connection_id)
            .data(Blob::new(payload.to_vec()))
            .send()
            .await
            .map(|_| ())
            .map_err(|err| {
                let construction_failed = matches!(
                    err,
                    aws_sdk_apigatewaymanagement::error::SdkError::ConstructionFailure(_)
                );
                let service_error = err.as_service_error();
                classify(
                    service_error,
                    construction_failed,
                    DisplayErrorContext(&err).to_string(),
                )
            })
    }

    fn name(&self) -> &str {
        "api-gateway"
    }
}
