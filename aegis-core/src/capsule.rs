//! The identity capsule (C1): immutable per-request identity, with three
//! narrow, rule-bound mutation points.

use crate::error::CapsuleError;
use crate::identity::{DeliverableId, PlanId, TaskId};
use serde::{Deserialize, Serialize};

/// Fields that are fixed for the lifetime of one request. Every downstream
/// decision (tenant isolation, routing, accounting, pseudonym scope, event
/// attribution) keys off these seven values together — never a subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct IdentityCapsule {
    pub org_slug: String,
    pub user_id: String,
    pub conversation_id: String,
    pub agent_slug: String,
    pub agent_type: String,
    pub provider: String,
    pub model: String,

    /// `NIL` on the wire until the runner that creates the task assigns it.
    #[serde(with = "nil_sentinel")]
    pub task_id: Option<TaskId>,
    /// `NIL` on the wire until the runner that creates the plan assigns it.
    #[serde(with = "nil_sentinel")]
    pub plan_id: Option<PlanId>,
    /// `NIL` on the wire until the runner that creates the deliverable assigns it.
    #[serde(with = "nil_sentinel")]
    pub deliverable_id: Option<DeliverableId>,
}

/// Raw, unvalidated capsule fields as received over the wire, before
/// `accept` has checked them against the authenticated subject.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RawCapsule {
    pub org_slug: Option<String>,
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
    pub agent_slug: Option<String>,
    pub agent_type: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    #[serde(default, with = "nil_sentinel")]
    pub task_id: Option<TaskId>,
    #[serde(default, with = "nil_sentinel")]
    pub plan_id: Option<PlanId>,
    #[serde(default, with = "nil_sentinel")]
    pub deliverable_id: Option<DeliverableId>,
}

impl IdentityCapsule {
    /// Validate a raw capsule against the seven immutable fields and the
    /// authenticated subject. Rejects if any immutable field is absent, or
    /// if `raw.user_id != authenticated_user_id` (spec §4.1).
    pub fn accept(raw: RawCapsule, authenticated_user_id: &str) -> Result<Self, CapsuleError> {
        let org_slug = raw.org_slug.ok_or(CapsuleError::Missing("orgSlug"))?;
        let user_id = raw.user_id.ok_or(CapsuleError::Missing("userId"))?;
        let conversation_id = raw
            .conversation_id
            .ok_or(CapsuleError::Missing("conversationId"))?;
        let agent_slug = raw.agent_slug.ok_or(CapsuleError::Missing("agentSlug"))?;
        let agent_type = raw.agent_type.ok_or(CapsuleError::Missing("agentType"))?;
        let provider = raw.provider.ok_or(CapsuleError::Missing("provider"))?;
        let model = raw.model.ok_or(CapsuleError::Missing("model"))?;

        if user_id != authenticated_user_id {
            return Err(CapsuleError::AuthMismatch);
        }

        Ok(Self {
            org_slug,
            user_id,
            conversation_id,
            agent_slug,
            agent_type,
            provider,
            model,
            task_id: raw.task_id,
            plan_id: raw.plan_id,
            deliverable_id: raw.deliverable_id,
        })
    }

    /// Assign `taskId`, succeeding only when it is currently `NIL`.
    pub fn try_assign_task_id(&mut self, id: TaskId) -> Result<(), CapsuleError> {
        if self.task_id.is_some() {
            return Err(CapsuleError::Immutable { field: "taskId" });
        }
        self.task_id = Some(id);
        Ok(())
    }

    /// Assign `planId`, succeeding only when it is currently `NIL`.
    pub fn try_assign_plan_id(&mut self, id: PlanId) -> Result<(), CapsuleError> {
        if self.plan_id.is_some() {
            return Err(CapsuleError::Immutable { field: "planId" });
        }
        self.plan_id = Some(id);
        Ok(())
    }

    /// Assign `deliverableId`, succeeding only when it is currently `NIL`.
    pub fn try_assign_deliverable_id(&mut self, id: DeliverableId) -> Result<(), CapsuleError> {
        if self.deliverable_id.is_some() {
            return Err(CapsuleError::Immutable {
                field: "deliverableId",
            });
        }
        self.deliverable_id = Some(id);
        Ok(())
    }
}

/// Serializes `Option<T>` as the literal string `"NIL"` when absent, and as
/// `T`'s normal representation otherwise — the capsule's opaque-string
/// NIL-sentinel contract (spec §3).
mod nil_sentinel {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: std::fmt::Display,
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_str("NIL"),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw == "NIL" {
            return Ok(None);
        }
        T::from_str(&raw).map(Some).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(user_id: &str) -> RawCapsule {
        RawCapsule {
            org_slug: Some("acme".into()),
            user_id: Some(user_id.into()),
            conversation_id: Some("conv-1".into()),
            agent_slug: Some("writer".into()),
            agent_type: Some("context".into()),
            provider: Some("openai".into()),
            model: Some("gpt-5".into()),
            task_id: None,
            plan_id: None,
            deliverable_id: None,
        }
    }

    #[test]
    fn accept_rejects_missing_field() {
        let mut r = raw("u1");
        r.provider = None;
        let err = IdentityCapsule::accept(r, "u1").unwrap_err();
        assert_eq!(err, CapsuleError::Missing("provider"));
    }

    #[test]
    fn accept_rejects_subject_mismatch() {
        let err = IdentityCapsule::accept(raw("u1"), "u2").unwrap_err();
        assert_eq!(err, CapsuleError::AuthMismatch);
    }

    #[test]
    fn try_assign_task_id_succeeds_once() {
        let mut capsule = IdentityCapsule::accept(raw("u1"), "u1").unwrap();
        assert!(capsule.task_id.is_none());
        capsule.try_assign_task_id(TaskId::now_v7()).unwrap();
        assert!(capsule.task_id.is_some());
        let err = capsule.try_assign_task_id(TaskId::now_v7()).unwrap_err();
        assert_eq!(err, CapsuleError::Immutable { field: "taskId" });
    }

    #[test]
    fn nil_sentinel_round_trips() {
        use crate::identity::EntityIdType;
        let capsule = IdentityCapsule::accept(raw("u1"), "u1").unwrap();
        let json = serde_json::to_value(&capsule).unwrap();
        assert_eq!(json["taskId"], serde_json::json!("NIL"));

        let mut with_task = capsule.clone();
        with_task.try_assign_task_id(TaskId::nil()).unwrap();
        let json = serde_json::to_value(&with_task).unwrap();
        assert_eq!(
            json["taskId"],
            serde_json::json!("00000000-0000-0000-0000-000000000000")
        );

        let round_tripped: IdentityCapsule = serde_json::from_value(json).unwrap();
        assert_eq!(round_tripped.task_id, Some(TaskId::nil()));
    }
}
