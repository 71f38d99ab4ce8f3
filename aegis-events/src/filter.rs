//! Subscription filter (§4.5): any subset of `{userId, conversationId,
//! agentSlug, taskId}`. An absent field matches anything; every present
//! field must match the event's capsule.

use aegis_core::ObservabilityEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub user_id: Option<String>,
    pub conversation_id: Option<String>,
    pub agent_slug: Option<String>,
    pub task_id: Option<String>,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &ObservabilityEvent) -> bool {
        if let Some(user_id) = &self.user_id {
            if &event.capsule.user_id != user_id {
                return false;
            }
        }
        if let Some(conversation_id) = &self.conversation_id {
            if &event.capsule.conversation_id != conversation_id {
                return false;
            }
        }
        if let Some(agent_slug) = &self.agent_slug {
            if &event.capsule.agent_slug != agent_slug {
                return false;
            }
        }
        if let Some(task_id) = &self.task_id {
            match &event.capsule.task_id {
                Some(id) if &id.to_string() == task_id => {}
                _ => return false,
            }
        }
        true
    }
}
