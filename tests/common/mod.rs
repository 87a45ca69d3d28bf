//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use kairos_a2a::clock::ManualClock;
use kairos_a2a::error::{KairosError, Result};
use kairos_a2a::executor::{ExecutionContext, Executor, ExecutorOutput};
use kairos_a2a::policy::{Action, Decision, PolicyEngine};
use kairos_a2a::types::{Artifact, Message, Part, SendMessageConfiguration, SendMessageParams};

/// A clock frozen at a fixed instant so timestamps are deterministic.
pub fn manual_clock() -> Arc<ManualClock> {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    Arc::new(ManualClock::starting_at(start))
}

/// Executor that replies with a fixed text (and optional artifacts) and
/// counts invocations.
pub struct EchoExecutor {
    reply: String,
    artifacts: Vec<Artifact>,
    calls: AtomicUsize,
}

impl EchoExecutor {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            artifacts: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Executor for EchoExecutor {
    async fn run(&self, _ctx: ExecutionContext, _message: Message) -> Result<ExecutorOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutorOutput::text(self.reply.clone()).with_artifacts(self.artifacts.clone()))
    }
}

/// Executor that always fails.
pub struct FailingExecutor;

#[async_trait]
impl Executor for FailingExecutor {
    async fn run(&self, _ctx: ExecutionContext, _message: Message) -> Result<ExecutorOutput> {
        Err(KairosError::internal("model exploded"))
    }
}

/// Policy engine that always returns the same decision.
pub struct StaticPolicy {
    decision: Decision,
}

impl StaticPolicy {
    pub fn allowing() -> Self {
        Self {
            decision: Decision::allow("allowed by test policy"),
        }
    }

    pub fn denying(reason: &str) -> Self {
        Self {
            decision: Decision::deny(reason),
        }
    }

    pub fn pending(reason: &str) -> Self {
        Self {
            decision: Decision::pending(reason),
        }
    }
}

#[async_trait]
impl PolicyEngine for StaticPolicy {
    async fn evaluate(&self, _action: &Action) -> Result<Decision> {
        Ok(self.decision.clone())
    }
}

/// A user message with a single text part.
pub fn user_message(message_id: &str, text: &str) -> Message {
    Message::user(message_id, text)
}

/// Send params with no configuration.
pub fn send_params(message: Message) -> SendMessageParams {
    SendMessageParams {
        message,
        configuration: None,
        metadata: None,
    }
}

/// Send params with `blocking = true`.
pub fn blocking_params(message: Message) -> SendMessageParams {
    SendMessageParams {
        message,
        configuration: Some(SendMessageConfiguration {
            blocking: Some(true),
            history_length: None,
        }),
        metadata: None,
    }
}

/// A one-part text artifact.
pub fn text_artifact(id: &str, name: &str, text: &str) -> Artifact {
    Artifact {
        artifact_id: id.to_string(),
        name: Some(name.to_string()),
        description: None,
        parts: vec![Part::text(text)],
    }
}

/// Fresh cancellation token.
pub fn token() -> CancellationToken {
    CancellationToken::new()
}
