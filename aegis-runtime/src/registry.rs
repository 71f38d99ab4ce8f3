//! Runner Registry (§4.6): `register`/`resolve` keyed by [`RunnerType`].

use crate::runner::Runner;
use aegis_core::{RunnerError, RunnerType};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct RunnerRegistry {
    runners: RwLock<HashMap<RunnerType, Arc<dyn Runner>>>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, runner: Arc<dyn Runner>) {
        self.runners.write().await.insert(runner.runner_type(), runner);
    }

    pub async fn resolve(&self, runner_type: RunnerType) -> Result<Arc<dyn Runner>, RunnerError> {
        self.runners
            .read()
            .await
            .get(&runner_type)
            .cloned()
            .ok_or_else(|| RunnerError::UnknownRunnerType(format!("{runner_type:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{RunnerOutput, RunnerRequest};
    use aegis_core::{Agent, IdentityCapsule};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct StubRunner;

    #[async_trait]
    impl Runner for StubRunner {
        fn runner_type(&self) -> RunnerType {
            RunnerType::Context
        }

        async fn handle_converse(
            &self,
            _agent: &Agent,
            _request: &RunnerRequest,
            _capsule: &IdentityCapsule,
            _cancellation: &CancellationToken,
        ) -> Result<RunnerOutput, RunnerError> {
            Ok(RunnerOutput::text("stub"))
        }
    }

    #[tokio::test]
    async fn resolve_unknown_runner_type_fails() {
        let registry = RunnerRegistry::new();
        let err = registry.resolve(RunnerType::Media).await.unwrap_err();
        assert!(matches!(err, RunnerError::UnknownRunnerType(_)));
        assert_eq!(aegis_core::HasErrorKind::kind(&err), aegis_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn register_then_resolve_succeeds() {
        let registry = RunnerRegistry::new();
        registry.register(Arc::new(StubRunner)).await;
        assert!(registry.resolve(RunnerType::Context).await.is_ok());
    }
}
