//! Shared test infrastructure for the aegis workspace:
//! - proptest strategies for the entity types in `aegis-core`
//! - fixtures for common capsule/agent/plan/deliverable scenarios
//! - custom assertions for error-kind checks

pub use aegis_core::{
    Agent, AgentEndpoint, AgentLlmConfig, CallerType, Conversation, CreatedBy, Deliverable,
    DeliverableVersion, EntityIdType, ErrorKind, HasErrorKind, IdentityCapsule, ObservabilityEvent,
    Plan, PlanVersion, RawCapsule, RunnerMode, RunnerType, Task, TaskStatus, UsageRecord,
};

use chrono::Utc;

pub mod generators {
    //! Proptest strategies for generating aegis-core entity types.

    use super::*;
    use aegis_core::{
        ConversationId, DeliverableId, DeliverableVersionId, PlanId, PlanVersionId,
        RegisteredAgentId, TaskId,
    };
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UUID (for generic ID generation).
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a slug-shaped identifier (`orgSlug`/`agentSlug`).
    pub fn arb_slug() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{2,24}".prop_map(|s| s)
    }

    pub fn arb_runner_mode() -> impl Strategy<Value = RunnerMode> {
        prop_oneof![
            Just(RunnerMode::Converse),
            Just(RunnerMode::Plan),
            Just(RunnerMode::Build),
            Just(RunnerMode::Hitl),
        ]
    }

    pub fn arb_runner_type() -> impl Strategy<Value = RunnerType> {
        prop_oneof![
            Just(RunnerType::Context),
            Just(RunnerType::Api),
            Just(RunnerType::External),
            Just(RunnerType::Orchestrator),
            Just(RunnerType::Rag),
            Just(RunnerType::Media),
        ]
    }

    pub fn arb_task_status() -> impl Strategy<Value = TaskStatus> {
        prop_oneof![
            Just(TaskStatus::Pending),
            Just(TaskStatus::Running),
            Just(TaskStatus::Succeeded),
            Just(TaskStatus::Failed),
            Just(TaskStatus::Cancelled),
        ]
    }

    pub fn arb_created_by() -> impl Strategy<Value = CreatedBy> {
        prop_oneof![Just(CreatedBy::Llm), Just(CreatedBy::User)]
    }

    /// Generate a valid, fully-populated [`IdentityCapsule`] with no
    /// task/plan/deliverable id assigned yet.
    pub fn arb_capsule() -> impl Strategy<Value = IdentityCapsule> {
        (
            arb_slug(),
            "[a-z0-9]{6,16}".prop_map(|s| s),
            arb_uuid(),
            arb_slug(),
            "[a-z]{3,12}".prop_map(|s| s),
            prop_oneof![Just("openai"), Just("anthropic"), Just("azure")],
            "[a-z0-9.-]{3,20}".prop_map(|s| s),
        )
            .prop_map(
                |(org_slug, user_id, conversation_id, agent_slug, agent_type, provider, model)| {
                    IdentityCapsule {
                        org_slug,
                        user_id,
                        conversation_id: conversation_id.to_string(),
                        agent_slug,
                        agent_type,
                        provider: provider.to_string(),
                        model,
                        task_id: None,
                        plan_id: None,
                        deliverable_id: None,
                    }
                },
            )
    }

    pub fn arb_agent() -> impl Strategy<Value = Agent> {
        (
            arb_slug(),
            prop::collection::vec(arb_slug(), 0..3),
            any::<bool>(),
            arb_runner_type(),
        )
            .prop_map(|(slug, org_slugs, global, runner_type)| Agent {
                id: RegisteredAgentId::new(Uuid::now_v7()),
                slug,
                org_slugs,
                global,
                runner_type,
                endpoint: None,
                llm_config: None,
                io_schema: serde_json::json!({}),
                context: serde_json::json!({}),
            })
    }

    pub fn arb_conversation() -> impl Strategy<Value = Conversation> {
        (arb_slug(), arb_slug()).prop_map(|(user_id, agent_slug)| {
            let now = Utc::now();
            Conversation {
                id: ConversationId::new(Uuid::now_v7()),
                user_id,
                agent_slug,
                started_at: now,
                last_active_at: now,
            }
        })
    }

    pub fn arb_task(conversation_id: ConversationId) -> impl Strategy<Value = Task> {
        (arb_runner_mode(), arb_task_status()).prop_map(move |(mode, status)| Task {
            id: TaskId::new(Uuid::now_v7()),
            conversation_id,
            mode,
            status,
            started_at: Utc::now(),
            completed_at: None,
        })
    }

    pub fn arb_plan_version(plan_id: PlanId, version_number: i64) -> impl Strategy<Value = PlanVersion> {
        ("[a-zA-Z0-9 .,\n]{1,500}".prop_map(|s| s), arb_created_by()).prop_map(
            move |(content, created_by)| PlanVersion {
                id: PlanVersionId::new(Uuid::now_v7()),
                plan_id,
                version_number,
                content,
                format: "markdown".to_string(),
                created_by,
                provider_model: Some("openai/gpt-5".to_string()),
                created_at: Utc::now(),
            },
        )
    }

    pub fn arb_deliverable_version(
        deliverable_id: DeliverableId,
        version_number: i64,
    ) -> impl Strategy<Value = DeliverableVersion> {
        ("[a-zA-Z0-9 .,\n]{1,500}".prop_map(|s| s), arb_created_by()).prop_map(
            move |(content, created_by)| DeliverableVersion {
                id: DeliverableVersionId::new(Uuid::now_v7()),
                deliverable_id,
                version_number,
                content,
                format: "markdown".to_string(),
                deliverable_type: "document".to_string(),
                created_by,
                provider_model: Some("openai/gpt-5".to_string()),
                created_at: Utc::now(),
            },
        )
    }
}

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use aegis_core::{ConversationId, EntityIdType};

    /// A capsule for org `acme`, user `u1`, agent `writer`, with no task
    /// assigned yet — the shape a fresh request into the Dispatcher has.
    pub fn capsule() -> IdentityCapsule {
        IdentityCapsule {
            org_slug: "acme".into(),
            user_id: "u1".into(),
            conversation_id: ConversationId::now_v7().to_string(),
            agent_slug: "writer".into(),
            agent_type: "context".into(),
            provider: "openai".into(),
            model: "gpt-5".into(),
            task_id: None,
            plan_id: None,
            deliverable_id: None,
        }
    }

    /// The matching raw wire form of [`capsule`], as a caller would submit
    /// it before `IdentityCapsule::accept` validates it.
    pub fn raw_capsule() -> RawCapsule {
        let c = capsule();
        RawCapsule {
            org_slug: Some(c.org_slug),
            user_id: Some(c.user_id),
            conversation_id: Some(c.conversation_id),
            agent_slug: Some(c.agent_slug),
            agent_type: Some(c.agent_type),
            provider: Some(c.provider),
            model: Some(c.model),
            task_id: None,
            plan_id: None,
            deliverable_id: None,
        }
    }

    /// A `context`-runner agent scoped to `acme`, matching [`capsule`].
    pub fn context_agent() -> Agent {
        Agent {
            id: aegis_core::RegisteredAgentId::now_v7(),
            slug: "writer".into(),
            org_slugs: vec!["acme".into()],
            global: false,
            runner_type: RunnerType::Context,
            endpoint: None,
            llm_config: Some(AgentLlmConfig {
                provider: "openai".into(),
                model: "gpt-5".into(),
                system_prompt_template: "You are a helpful writer.\n\n{{context}}".into(),
                temperature: Some(0.7),
                max_tokens: Some(2048),
            }),
            io_schema: serde_json::json!({}),
            context: serde_json::json!({"persona": "concise technical writer"}),
        }
    }
}

pub mod assertions {
    //! Custom assertion helpers for error-kind validation across subsystems.

    use super::*;

    /// Assert that an error raised by any subsystem carries the expected
    /// [`ErrorKind`], regardless of which concrete error enum produced it.
    #[track_caller]
    pub fn assert_error_kind<E: HasErrorKind + std::fmt::Debug>(err: &E, expected: ErrorKind) {
        assert_eq!(
            err.kind(),
            expected,
            "expected {:?} to map to {:?}, got {:?}",
            err,
            expected,
            err.kind()
        );
    }

    /// Assert that a task's status is terminal (§3: write-once).
    #[track_caller]
    pub fn assert_terminal(status: TaskStatus) {
        assert!(status.is_terminal(), "expected {:?} to be terminal", status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn capsule_fixture_accepts_under_its_own_user_id() {
        let raw = fixtures::raw_capsule();
        let accepted = IdentityCapsule::accept(raw, "u1").unwrap();
        assert_eq!(accepted.org_slug, "acme");
        assert!(accepted.task_id.is_none());
    }

    #[test]
    fn context_agent_fixture_serves_its_org() {
        let agent = fixtures::context_agent();
        assert!(agent.serves_org("acme"));
        assert!(!agent.serves_org("other-co"));
    }

    #[test]
    fn assert_error_kind_matches_storage_not_found() {
        let err = aegis_core::StorageError::VersionNotFound("v1".to_string());
        assertions::assert_error_kind(&err, ErrorKind::NotFound);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_capsule_round_trips_through_json(capsule in generators::arb_capsule()) {
            let json = serde_json::to_value(&capsule).unwrap();
            let parsed: IdentityCapsule = serde_json::from_value(json).unwrap();
            prop_assert_eq!(parsed, capsule);
        }

        #[test]
        fn prop_generated_agent_has_valid_slug(agent in generators::arb_agent()) {
            prop_assert!(!agent.slug.is_empty());
        }

        #[test]
        fn prop_generated_task_status_terminal_matches_enum(status in generators::arb_task_status()) {
            let is_terminal = matches!(
                status,
                TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
            );
            prop_assert_eq!(status.is_terminal(), is_terminal);
        }
    }
}
