//! Agent lookup (§4.7 step 3). Agents are registered out of band (there is
//! no `agents` CRUD surface in scope, per spec §1) — this is an in-memory
//! directory an operator populates at startup, the simplest thing that
//! satisfies [`aegis_runtime::AgentDirectory`] and [`SubAgentDirectory`].

use aegis_core::Agent;
use aegis_runtime::{AgentDirectory, SubAgentDirectory};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct InMemoryAgentDirectory {
    agents: RwLock<HashMap<(String, String), Agent>>,
}

impl InMemoryAgentDirectory {
    pub fn new() -> Self {
        Self { agents: RwLock::new(HashMap::new()) }
    }

    pub async fn register(&self, agent: Agent) {
        let mut agents = self.agents.write().await;
        for org_slug in &agent.org_slugs {
            agents.insert((org_slug.clone(), agent.slug.clone()), agent.clone());
        }
        if agent.global {
            agents.insert(("*".to_string(), agent.slug.clone()), agent);
        }
    }
}

impl Default for InMemoryAgentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn find(&self, org_slug: &str, agent_slug: &str) -> Option<Agent> {
        let agents = self.agents.read().await;
        if let Some(agent) = agents.get(&(org_slug.to_string(), agent_slug.to_string())) {
            return Some(agent.clone());
        }
        agents.get(&("*".to_string(), agent_slug.to_string())).cloned()
    }
}

#[async_trait]
impl SubAgentDirectory for InMemoryAgentDirectory {
    async fn find(&self, org_slug: &str, agent_slug: &str) -> Option<Agent> {
        AgentDirectory::find(self, org_slug, agent_slug).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::{EntityIdType, RegisteredAgentId, RunnerType};

    fn agent(slug: &str, org: &str, global: bool) -> Agent {
        Agent {
            id: RegisteredAgentId::now_v7(),
            slug: slug.into(),
            org_slugs: vec![org.into()],
            global,
            runner_type: RunnerType::Context,
            endpoint: None,
            llm_config: None,
            io_schema: serde_json::json!({}),
            context: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn finds_agent_scoped_to_org() {
        let directory = InMemoryAgentDirectory::new();
        directory.register(agent("writer", "acme", false)).await;
        assert!(AgentDirectory::find(&directory, "acme", "writer").await.is_some());
        assert!(AgentDirectory::find(&directory, "other", "writer").await.is_none());
    }

    #[tokio::test]
    async fn global_agent_is_visible_to_every_org() {
        let directory = InMemoryAgentDirectory::new();
        directory.register(agent("helper", "acme", true)).await;
        assert!(AgentDirectory::find(&directory, "some-other-org", "helper").await.is_some());
    }
}
