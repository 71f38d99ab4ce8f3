//! Observability Bus (C5): ring buffer + live fan-out + username
//! enrichment + durable append, fed by the Dispatcher and every runner and
//! read by the HTTP observability routes.

mod bus;
mod config;
mod enrichment;
mod filter;
mod sink;

pub use bus::ObservabilityBus;
pub use config::ObservabilityBusConfig;
pub use enrichment::{EnrichmentCache, NullUserDirectory, UserDirectory};
pub use filter::SubscriptionFilter;
pub use sink::{DurableSink, InMemoryDurableSink, SinkError};
