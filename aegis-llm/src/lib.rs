//! LLM Gateway (C4): pseudonymize-in, call-provider-with-timeout-and-retry,
//! reverse-out, meter. Every runner and the Dispatcher call through
//! [`gateway::LlmGateway`] rather than touching a provider directly.

mod circuit_breaker;
mod config;
mod cost;
mod gateway;
mod provider;
mod registry;
mod retry;

pub use aegis_core::LlmError;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
pub use config::LlmGatewayConfig;
pub use cost::{CostTable, PriceTable};
pub use gateway::{default_registry, EventSink, GenerateRequest, LlmGateway, NullEventSink, NullUsageSink, UsageSink};
pub use provider::{GenerateOptions, LlmProviderAdapter, ProviderGenerateRequest, ProviderGenerateResponse, TokenUsage};
pub use registry::ProviderRegistry;
pub use retry::{retry_with_backoff, RetryConfig};
