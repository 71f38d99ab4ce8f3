//! Shared application state for Axum routers: where every subsystem crate
//! gets wired into one concrete process — the stores, the bus, the
//! gateway, the registry and the dispatcher built on top of it, per
//! `§10.3`'s `*Config::from_env()` idiom for each piece.

use std::sync::Arc;
use std::time::Instant;

use aegis_events::{EnrichmentCache, InMemoryDurableSink, ObservabilityBus, ObservabilityBusConfig};
use aegis_llm::{default_registry, LlmGateway, LlmGatewayConfig};
use aegis_pii::{PiiConfig, PiiTransformer};
use aegis_runtime::{
    ApiRunner, ContextRunner, Dispatcher, DispatcherConfig, ExternalRunner, MediaRunner,
    OrchestratorRunner, RagRunner, RetrievalStore, RetrievedPassage, RunnerRegistry,
};
use aegis_storage::{ConversationStore, DeliverableStore, PlanStore, TaskStore};
use async_trait::async_trait;

use crate::agent_directory::InMemoryAgentDirectory;
use crate::config::ApiConfig;
use crate::middleware::auth::RateLimitState;
use crate::sinks::{BatchingUsageSink, BusEventSink};

/// Retrieval is out of scope (§2 Non-goals: "embedding implementations");
/// the `rag` runner is wired with this until a real vector store is
/// plugged in, so it degrades to an un-augmented `context`-style call.
struct NullRetrievalStore;

#[async_trait]
impl RetrievalStore for NullRetrievalStore {
    async fn search(&self, _agent_slug: &str, _query: &str, _top_k: usize) -> Vec<RetrievedPassage> {
        Vec::new()
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub plans: Arc<PlanStore>,
    pub deliverables: Arc<DeliverableStore>,
    pub conversations: Arc<ConversationStore>,
    pub tasks: Arc<TaskStore>,
    pub bus: ObservabilityBus,
    pub llm: Arc<LlmGateway>,
    pub runners: Arc<RunnerRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub agents: Arc<InMemoryAgentDirectory>,
    pub pii: PiiTransformer,
    pub config: Arc<ApiConfig>,
    pub rate_limiter: Arc<RateLimitState>,
    pub start_time: Instant,
}

impl AppState {
    /// Assembles every subsystem from its own `from_env()`/defaults,
    /// registers all six runner types (§4.6), and builds the Dispatcher on
    /// top. This is the one place the crates in this workspace are wired
    /// together into a process.
    pub async fn bootstrap(config: ApiConfig) -> Self {
        let http = reqwest::Client::new();

        let bus = ObservabilityBus::new(
            ObservabilityBusConfig::from_env(),
            Arc::new(EnrichmentCache::with_null_directory(10_000, std::time::Duration::from_secs(30 * 60))),
            Arc::new(InMemoryDurableSink::new()),
        );
        let event_sink = Arc::new(BusEventSink::new(bus.clone(), "aegis-runtime"));

        let plans = Arc::new(PlanStore::new(event_sink.clone()));
        let deliverables = Arc::new(DeliverableStore::new(event_sink.clone()));
        let conversations = Arc::new(ConversationStore::new());
        let tasks = Arc::new(TaskStore::new());

        let llm = Arc::new(LlmGateway::new(
            default_registry(),
            PiiTransformer::new(PiiConfig::with_defaults()),
            aegis_llm::CostTable::seed_defaults(),
            LlmGatewayConfig::from_env(),
            event_sink.clone(),
            BatchingUsageSink::new(),
        ));

        let agents = Arc::new(InMemoryAgentDirectory::new());

        let runners = Arc::new(RunnerRegistry::new());
        let a2a = Arc::new(aegis_runtime::A2aClient::new(http.clone()));
        runners
            .register(Arc::new(ContextRunner::new(llm.clone(), plans.clone(), deliverables.clone())))
            .await;
        runners.register(Arc::new(ExternalRunner::new(a2a.clone()))).await;
        runners.register(Arc::new(ApiRunner::new(http.clone()))).await;
        runners
            .register(Arc::new(OrchestratorRunner::new(agents.clone(), runners.clone())))
            .await;
        runners.register(Arc::new(RagRunner::new(llm.clone(), Arc::new(NullRetrievalStore)))).await;
        runners.register(Arc::new(MediaRunner::new(http.clone(), deliverables.clone()))).await;

        let dispatcher = Arc::new(Dispatcher::new(
            agents.clone(),
            runners.clone(),
            conversations.clone(),
            tasks.clone(),
            event_sink,
            DispatcherConfig::from_env(),
        ));

        let config = Arc::new(config);
        let rate_limiter = Arc::new(RateLimitState::new(config.clone()));

        Self {
            plans,
            deliverables,
            conversations,
            tasks,
            bus,
            llm,
            runners,
            dispatcher,
            agents,
            pii: PiiTransformer::new(PiiConfig::with_defaults()),
            config,
            rate_limiter,
            start_time: Instant::now(),
        }
    }
}
