//! Policy engagement.
//!
//! Before ensuring or executing anything, the handler describes the incoming
//! request as an [`Action`] and asks the [`PolicyEngine`] for a decision.
//! `Pending` decisions may be resolved synchronously by an [`ApprovalHook`]
//! (e.g. a chat prompt to an operator); otherwise they park the task in
//! `input-required` behind an approval record.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Message, METADATA_AGENT, METADATA_CALLER, METADATA_TENANT};

/// What a policy decision allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Proceed with execution.
    Allow,
    /// Refuse; the task is rejected.
    Deny,
    /// Defer to a human decision.
    Pending,
}

/// The outcome of a policy evaluation.
#[derive(Debug, Clone)]
pub struct Decision {
    /// What to do.
    pub effect: Effect,

    /// Why, in operator-readable form.
    pub reason: String,
}

impl Decision {
    /// An allow decision with a reason.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            effect: Effect::Allow,
            reason: reason.into(),
        }
    }

    /// A deny decision with a reason.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            effect: Effect::Deny,
            reason: reason.into(),
        }
    }

    /// A pending decision with a reason.
    pub fn pending(reason: impl Into<String>) -> Self {
        Self {
            effect: Effect::Pending,
            reason: reason.into(),
        }
    }
}

/// A typed description of the action being gated.
#[derive(Debug, Clone)]
pub struct Action {
    /// Action type; always `"agent"` for handler-driven actions.
    pub action_type: String,

    /// The acting agent's name (agent card name, or `"a2a-handler"` when no
    /// card is configured).
    pub name: String,

    /// Request attributes: `message_id`, `context_id`, `task_id`, plus any
    /// of `caller` / `agent` / `tenant` lifted from the message metadata.
    pub metadata: HashMap<String, String>,
}

impl Action {
    /// Describe a message send as a policy action.
    pub fn for_message(agent_name: &str, message: &Message) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert("message_id".to_string(), message.message_id.clone());
        if let Some(context_id) = &message.context_id {
            metadata.insert("context_id".to_string(), context_id.clone());
        }
        if let Some(task_id) = &message.task_id {
            metadata.insert("task_id".to_string(), task_id.clone());
        }
        for key in [METADATA_CALLER, METADATA_AGENT, METADATA_TENANT] {
            if let Some(value) = message.metadata_str(key) {
                metadata.insert(key.to_string(), value.to_string());
            }
        }
        Self {
            action_type: "agent".to_string(),
            name: agent_name.to_string(),
            metadata,
        }
    }
}

/// Yields allow / deny / pending decisions over typed actions.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Evaluate an action.
    async fn evaluate(&self, action: &Action) -> Result<Decision>;
}

/// Synchronous request/response resolution of a pending decision.
#[async_trait]
pub trait ApprovalHook: Send + Sync {
    /// Ask for an immediate resolution of a pending decision.
    ///
    /// `Some(Effect::Allow)` / `Some(Effect::Deny)` resolve the decision in
    /// place; `None` leaves it pending for the approval store.
    async fn resolve(&self, action: &Action, decision: &Decision) -> Result<Option<Effect>>;
}
