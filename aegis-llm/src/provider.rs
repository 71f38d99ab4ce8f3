//! Provider adapter trait (§4.4): a uniform `generate` call shape that every
//! concrete LLM backend implements, so the gateway never special-cases a
//! vendor.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token accounting for a single provider call, broken out the way the
/// price table in [`crate::cost`] expects to consume it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt: u64,
    pub completion: u64,
    pub cached_input: u64,
    pub thinking: u64,
}

/// Options accompanying a generate call (temperature, max tokens, etc.) are
/// passed through to the adapter verbatim; the gateway never interprets them.
pub type GenerateOptions = HashMap<String, serde_json::Value>;

/// Request shape handed to a [`LlmProviderAdapter`] after pseudonymization.
#[derive(Debug, Clone)]
pub struct ProviderGenerateRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub options: GenerateOptions,
}

/// Response shape returned by a [`LlmProviderAdapter`] before de-pseudonymization.
#[derive(Debug, Clone)]
pub struct ProviderGenerateResponse {
    pub text: String,
    pub usage: TokenUsage,
}

/// A single LLM backend. Implementations own their own HTTP client, auth,
/// and wire format; the gateway only ever sees this trait.
#[async_trait]
pub trait LlmProviderAdapter: Send + Sync {
    /// Stable identifier used as the registry key and on usage/events, e.g.
    /// `"openai"` or `"anthropic"`.
    fn provider_id(&self) -> &str;

    async fn generate(
        &self,
        request: ProviderGenerateRequest,
    ) -> Result<ProviderGenerateResponse, crate::LlmError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Scriptable adapter for gateway tests: returns canned responses/errors
    /// in sequence and counts invocations.
    pub struct ScriptedAdapter {
        pub id: String,
        pub calls: Arc<AtomicU32>,
        pub responses: std::sync::Mutex<Vec<Result<ProviderGenerateResponse, crate::LlmError>>>,
    }

    impl ScriptedAdapter {
        pub fn new(id: &str, responses: Vec<Result<ProviderGenerateResponse, crate::LlmError>>) -> Self {
            Self {
                id: id.to_string(),
                calls: Arc::new(AtomicU32::new(0)),
                responses: std::sync::Mutex::new(responses),
            }
        }

        pub fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProviderAdapter for ScriptedAdapter {
        fn provider_id(&self) -> &str {
            &self.id
        }

        async fn generate(
            &self,
            _request: ProviderGenerateRequest,
        ) -> Result<ProviderGenerateResponse, crate::LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("ScriptedAdapter exhausted its scripted responses");
            }
            responses.remove(0)
        }
    }
}
