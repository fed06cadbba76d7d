use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::providers::{BatchResponse, MulticastMessage, PushFailure, PushService, SendOutcome};

/// Push delivery through an HTTP gateway.
///
/// The gateway takes the multicast message as JSON and answers with one
/// result per token:
/// `{"responses": [{"success": true}, {"success": false, "error": {"code": "..."}}]}`.
pub struct HttpPushService {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    responses: Vec<GatewayResult>,
}

#[derive(Debug, Deserialize)]
struct GatewayResult {
    success: bool,
    #[serde(default)]
    error: Option<GatewayError>,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    code: String,
}

impl HttpPushService {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl PushService for HttpPushService {
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<BatchResponse> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response: GatewayResponse = request.send().await?.error_for_status()?.json().await?;
        debug!("Push gateway answered for {} tokens", response.responses.len());
        to_batch(response, message.tokens.len())
    }
}

fn to_batch(response: GatewayResponse, token_count: usize) -> Result<BatchResponse> {
    if response.responses.len() != token_count {
        bail!(
            "Push gateway returned {} results for {} tokens",
            response.responses.len(),
            token_count
        );
    }

    let outcomes = response
        .responses
        .into_iter()
        .map(|result| match (result.success, result.error) {
            (true, _) => SendOutcome::Delivered,
            (false, Some(error)) => SendOutcome::Failed(PushFailure::from_code(&error.code)),
            (false, None) => SendOutcome::Failed(PushFailure::Other("unknown".to_string())),
        })
        .collect();

    Ok(BatchResponse { outcomes })
}
