//! External Agent Client (C8, §4.8): JSON-RPC 2.0 egress to external agents,
//! plus `.well-known/agent.json` discovery cached for 10 minutes.

use aegis_core::A2aError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

const DISCOVERY_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: String,
    params: Value,
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// `<endpoint>/.well-known/agent.json` response (§6 A2A egress).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub runner_type: String,
    pub capabilities: Vec<String>,
    pub transport_types: Vec<String>,
    pub io_schema: Value,
}

struct CachedCard {
    card: AgentCard,
    fetched_at: Instant,
}

pub struct A2aClient {
    http: reqwest::Client,
    discovery: RwLock<HashMap<String, CachedCard>>,
}

impl Default for A2aClient {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl A2aClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            discovery: RwLock::new(HashMap::new()),
        }
    }

    /// `method` is `"<mode>.<action>"` (§4.8); `params` carries the capsule
    /// verbatim plus the mode-specific payload — callers build it, this
    /// client only frames and decodes.
    pub async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<Value, A2aError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: method.to_string(),
            params,
            id: uuid::Uuid::new_v4().to_string(),
        };

        let response = self
            .http
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|err| A2aError::Transport {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            })?;

        let parsed: JsonRpcResponse = response.json().await.map_err(|err| A2aError::Transport {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;

        if let Some(error) = parsed.error {
            return Err(A2aError::from_code(error.code, error.message));
        }
        parsed
            .result
            .ok_or_else(|| A2aError::Internal("JSON-RPC response carried neither result nor error".to_string()))
    }

    /// Discovers `endpoint`'s agent card, serving a cached copy for up to
    /// 10 minutes.
    pub async fn discover(&self, endpoint: &str) -> Result<AgentCard, A2aError> {
        if let Some(cached) = self.discovery.read().await.get(endpoint) {
            if cached.fetched_at.elapsed() < DISCOVERY_TTL {
                return Ok(cached.card.clone());
            }
        }

        let url = format!("{endpoint}/.well-known/agent.json");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| A2aError::DiscoveryFailed {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            })?;
        let card: AgentCard = response.json().await.map_err(|err| A2aError::DiscoveryFailed {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;

        self.discovery.write().await.insert(
            endpoint.to_string(),
            CachedCard {
                card: card.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(card)
    }
}
