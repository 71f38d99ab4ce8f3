//! Runner Registry, Base Runner, Dispatcher, and External Agent Client
//! (C6/C7/C8): the pluggable execution layer a request passes through
//! between the HTTP edge and an agent's concrete backend.

mod a2a;
mod api_runner;
mod config;
mod context_runner;
mod dispatcher;
mod external_runner;
mod media_runner;
mod orchestrator_runner;
mod rag_runner;
mod registry;
mod runner;

pub use a2a::{A2aClient, AgentCard};
pub use api_runner::ApiRunner;
pub use config::DispatcherConfig;
pub use context_runner::ContextRunner;
pub use dispatcher::{AgentDirectory, Dispatcher, TaskRequest, TaskResponse};
pub use external_runner::ExternalRunner;
pub use media_runner::MediaRunner;
pub use orchestrator_runner::{OrchestratorRunner, SubAgentDirectory};
pub use rag_runner::{RagRunner, RetrievalStore, RetrievedPassage};
pub use registry::RunnerRegistry;
pub use runner::{map_llm_error, map_storage_error, Runner, RunnerOutput, RunnerRequest};
