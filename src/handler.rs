//! The A2A request handler — state machine, policy gate, approvals.
//!
//! [`Handler`] composes a [`TaskStore`], an [`Executor`], and the optional
//! collaborators (policy engine, approval hook, approval store, push config
//! store, agent card) into the full request surface: send (blocking,
//! non-blocking, streaming), task reads, cancellation, subscribe, push
//! config CRUD, and the approval surface.
//!
//! The handler is stateless beyond its injected collaborators and safe for
//! concurrent invocation; it is `Clone` and cheap to share. Transport types
//! never appear here — streaming operations return an `mpsc` receiver of
//! typed frames that each binding adapts to its own wire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::approval::{ApprovalFilter, ApprovalStore};
use crate::clock::{Clock, SystemClock};
use crate::error::{Category, KairosError, Result};
use crate::executor::{ExecutionContext, Executor};
use crate::naming;
use crate::policy::{Action, ApprovalHook, Decision, Effect, PolicyEngine};
use crate::push::PushConfigStore;
use crate::store::{validate_message, TaskFilter, TaskStore};
use crate::types::{
    AgentCard, AgentEvent, ApprovalRecord, ApprovalStatus, Artifact, EventType,
    ListPushConfigsResponse, ListTasksParams, Message, PushNotificationConfig,
    SendMessageParams, SendMessageResponse, StreamFrame, Task, TaskArtifactUpdateEvent, TaskPage,
    TaskPushNotificationConfig, TaskState, TaskStatus, TaskStatusUpdateEvent,
    METADATA_APPROVAL_EXPIRES_AT, METADATA_APPROVAL_ID,
};

/// Buffered frames per stream before the producer awaits the consumer.
const FRAME_BUFFER: usize = 32;

/// Default cadence of the subscribe poll loop.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Name used in policy actions when no agent card is configured.
const DEFAULT_AGENT_NAME: &str = "a2a-handler";

/// What one completed execution step produced.
struct StepOutcome {
    response: Message,
    artifacts: Vec<Artifact>,
    task: Task,
}

/// The central orchestrator behind every wire binding.
#[derive(Clone)]
pub struct Handler {
    tasks: Arc<dyn TaskStore>,
    executor: Arc<dyn Executor>,
    policy: Option<Arc<dyn PolicyEngine>>,
    approval_hook: Option<Arc<dyn ApprovalHook>>,
    approvals: Option<Arc<dyn ApprovalStore>>,
    push_configs: Option<Arc<dyn PushConfigStore>>,
    agent_card: Option<AgentCard>,
    approval_timeout: chrono::Duration,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

/// Builder for [`Handler`].
pub struct HandlerBuilder {
    tasks: Arc<dyn TaskStore>,
    executor: Arc<dyn Executor>,
    policy: Option<Arc<dyn PolicyEngine>>,
    approval_hook: Option<Arc<dyn ApprovalHook>>,
    approvals: Option<Arc<dyn ApprovalStore>>,
    push_configs: Option<Arc<dyn PushConfigStore>>,
    agent_card: Option<AgentCard>,
    approval_timeout: chrono::Duration,
    poll_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl HandlerBuilder {
    /// Start a builder with the two mandatory collaborators.
    pub fn new(tasks: Arc<dyn TaskStore>, executor: Arc<dyn Executor>) -> Self {
        Self {
            tasks,
            executor,
            policy: None,
            approval_hook: None,
            approvals: None,
            push_configs: None,
            agent_card: None,
            approval_timeout: chrono::Duration::zero(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            clock: Arc::new(SystemClock),
        }
    }

    /// Gate sends through a policy engine.
    pub fn policy(mut self, policy: Arc<dyn PolicyEngine>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Resolve pending decisions synchronously through a hook.
    pub fn approval_hook(mut self, hook: Arc<dyn ApprovalHook>) -> Self {
        self.approval_hook = Some(hook);
        self
    }

    /// Persist pending decisions in an approval store.
    pub fn approval_store(mut self, store: Arc<dyn ApprovalStore>) -> Self {
        self.approvals = Some(store);
        self
    }

    /// Enable the push config surface.
    pub fn push_config_store(mut self, store: Arc<dyn PushConfigStore>) -> Self {
        self.push_configs = Some(store);
        self
    }

    /// Attach agent card metadata (policy action name, capability checks,
    /// extended card responses).
    pub fn agent_card(mut self, card: AgentCard) -> Self {
        self.agent_card = Some(card);
        self
    }

    /// How long a pending approval stays resolvable. Zero disables expiry.
    pub fn approval_timeout(mut self, timeout: chrono::Duration) -> Self {
        self.approval_timeout = timeout;
        self
    }

    /// Cadence of the subscribe poll loop.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Inject a time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Finish the handler.
    pub fn build(self) -> Handler {
        Handler {
            tasks: self.tasks,
            executor: self.executor,
            policy: self.policy,
            approval_hook: self.approval_hook,
            approvals: self.approvals,
            push_configs: self.push_configs,
            agent_card: self.agent_card,
            approval_timeout: self.approval_timeout,
            poll_interval: self.poll_interval,
            clock: self.clock,
        }
    }
}

impl Handler {
    /// Start building a handler.
    pub fn builder(tasks: Arc<dyn TaskStore>, executor: Arc<dyn Executor>) -> HandlerBuilder {
        HandlerBuilder::new(tasks, executor)
    }

    /// The configured agent card, if any.
    pub fn agent_card(&self) -> Option<&AgentCard> {
        self.agent_card.as_ref()
    }

    fn agent_name(&self) -> &str {
        self.agent_card
            .as_ref()
            .map(|card| card.name.as_str())
            .unwrap_or(DEFAULT_AGENT_NAME)
    }

    fn guard(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(KairosError::context_lost("request cancelled"));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Policy
    // -----------------------------------------------------------------------

    async fn evaluate(&self, message: &Message) -> Result<(Decision, Effect)> {
        let Some(policy) = &self.policy else {
            let decision = Decision::allow("no policy engine configured");
            return Ok((decision, Effect::Allow));
        };

        let action = Action::for_message(self.agent_name(), message);
        let decision = policy.evaluate(&action).await?;
        let mut effect = decision.effect;

        // A pending decision may be short-circuited by a synchronous hook.
        if effect == Effect::Pending {
            if let Some(hook) = &self.approval_hook {
                if let Some(resolved) = hook.resolve(&action, &decision).await? {
                    debug!(effect = ?resolved, "pending decision resolved by hook");
                    effect = resolved;
                }
            }
        }
        Ok((decision, effect))
    }

    // -----------------------------------------------------------------------
    // Task resolution
    // -----------------------------------------------------------------------

    /// Look up a continuation target or create a fresh task.
    async fn ensure_task(&self, message: &Message) -> Result<Task> {
        if let Some(task_id) = &message.task_id {
            let task = self.tasks.get_task(task_id, 0, true).await?;
            if task.status.state.is_terminal() {
                return Err(KairosError::failed_precondition(format!(
                    "task {} is in terminal state {}",
                    task_id, task.status.state
                ))
                .with_context("task_id", task_id.clone()));
            }
            return self.tasks.append_history(task_id, message.clone()).await;
        }
        self.tasks.create_task(message.clone()).await
    }

    fn bound_message(&self, message: &Message, task: &Task) -> Message {
        let mut bound = message.clone();
        bound.task_id = Some(task.id.clone());
        bound.context_id = Some(task.context_id.clone());
        bound
    }

    fn agent_message(&self, task: &Task, text: impl Into<String>) -> Message {
        let mut message = Message::agent(Uuid::new_v4().to_string(), text);
        message.task_id = Some(task.id.clone());
        message.context_id = Some(task.context_id.clone());
        message
    }

    fn annotate(&self, message: &mut Message, event_type: EventType) {
        let event = AgentEvent::new(
            event_type,
            self.agent_name(),
            message.task_id.clone().unwrap_or_default(),
            self.clock.now(),
        );
        let encoded = event.to_metadata();
        if let Some(map) = encoded.as_object() {
            message.merge_metadata(map.clone().into_iter().collect());
        }
    }

    // -----------------------------------------------------------------------
    // Policy outcome transitions
    // -----------------------------------------------------------------------

    /// Park the task in `input-required`, recording an approval if a store
    /// is configured.
    async fn park_for_approval(
        &self,
        task: &Task,
        message: &Message,
        decision: &Decision,
    ) -> Result<Task> {
        let record = match &self.approvals {
            Some(store) => {
                let expires_at = if self.approval_timeout == chrono::Duration::zero() {
                    None
                } else {
                    Some(self.clock.now() + self.approval_timeout)
                };
                let record = ApprovalRecord {
                    id: String::new(),
                    task_id: task.id.clone(),
                    context_id: task.context_id.clone(),
                    status: ApprovalStatus::Pending,
                    reason: decision.reason.clone(),
                    created_at: chrono::DateTime::UNIX_EPOCH,
                    updated_at: chrono::DateTime::UNIX_EPOCH,
                    expires_at,
                    message: self.bound_message(message, task),
                };
                Some(store.create(record).await?)
            }
            None => None,
        };

        let mut status_message = self.agent_message(task, decision.reason.clone());
        if let Some(record) = &record {
            let mut entries = HashMap::new();
            entries.insert(
                METADATA_APPROVAL_ID.to_string(),
                serde_json::Value::String(record.id.clone()),
            );
            if let Some(expires_at) = record.expires_at {
                entries.insert(
                    METADATA_APPROVAL_EXPIRES_AT.to_string(),
                    serde_json::Value::String(expires_at.to_rfc3339()),
                );
            }
            status_message.merge_metadata(entries);
        }

        self.tasks
            .append_history(&task.id, status_message.clone())
            .await?;
        self.tasks
            .update_status(
                &task.id,
                TaskStatus::with_message(TaskState::InputRequired, status_message),
            )
            .await
    }

    /// Reject the task outright on a policy denial.
    async fn reject_for_policy(&self, task: &Task, decision: &Decision) -> Result<Task> {
        let status_message = self.agent_message(task, decision.reason.clone());
        self.tasks
            .append_history(&task.id, status_message.clone())
            .await?;
        self.tasks
            .update_status(
                &task.id,
                TaskStatus::with_message(TaskState::Rejected, status_message),
            )
            .await
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Run one executor step under the canonical status choreography:
    /// `working` before, `completed` / `failed` after.
    async fn execute_step(
        &self,
        task: &Task,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<StepOutcome> {
        let mut working_message = self.agent_message(task, "processing request");
        self.annotate(&mut working_message, EventType::TaskStarted);
        self.tasks
            .update_status(
                &task.id,
                TaskStatus::with_message(TaskState::Working, working_message),
            )
            .await?;

        let ctx = ExecutionContext {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            cancel: cancel.clone(),
        };

        match self.executor.run(ctx, message).await {
            Ok(output) => {
                let (response, artifacts) = output.into_response(&task.id, &task.context_id);
                self.tasks.append_history(&task.id, response.clone()).await?;
                if !artifacts.is_empty() {
                    self.tasks
                        .add_artifacts(&task.id, artifacts.clone())
                        .await?;
                }
                let mut completed_message = response.clone();
                self.annotate(&mut completed_message, EventType::TaskCompleted);
                let updated = self
                    .tasks
                    .update_status(
                        &task.id,
                        TaskStatus::with_message(TaskState::Completed, completed_message),
                    )
                    .await?;
                Ok(StepOutcome {
                    response,
                    artifacts,
                    task: updated,
                })
            }
            Err(err) => {
                if cancel.is_cancelled() {
                    // The transport went away; the task stays as-is so a
                    // later request can resume it.
                    return Err(KairosError::context_lost("execution cancelled")
                        .with_context("task_id", task.id.clone()));
                }
                let mut failure_message =
                    self.agent_message(task, format!("execution failed: {}", err));
                self.annotate(&mut failure_message, EventType::Error);
                self.tasks
                    .update_status(
                        &task.id,
                        TaskStatus::with_message(TaskState::Failed, failure_message),
                    )
                    .await?;
                Err(KairosError::internal(format!("executor failed: {}", err))
                    .with_context("task_id", task.id.clone())
                    .with_source(err))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Wire operations
    // -----------------------------------------------------------------------

    /// Handle a non-streaming send.
    pub async fn send_message(
        &self,
        params: SendMessageParams,
        cancel: CancellationToken,
    ) -> Result<SendMessageResponse> {
        self.guard(&cancel)?;
        validate_message(&params.message)?;

        let (decision, effect) = self.evaluate(&params.message).await?;
        let task = self.ensure_task(&params.message).await?;

        match effect {
            Effect::Deny => {
                let rejected = self.reject_for_policy(&task, &decision).await?;
                Ok(SendMessageResponse::Task(rejected))
            }
            Effect::Pending => {
                let parked = self.park_for_approval(&task, &params.message, &decision).await?;
                Ok(SendMessageResponse::Task(parked))
            }
            Effect::Allow => {
                let blocking = params
                    .configuration
                    .as_ref()
                    .and_then(|config| config.blocking)
                    .unwrap_or(false);
                let exec_message = self.bound_message(&params.message, &task);

                if blocking {
                    let outcome = self.execute_step(&task, exec_message, &cancel).await?;
                    Ok(SendMessageResponse::Message(outcome.response))
                } else {
                    let handler = self.clone();
                    let spawned_task = task.clone();
                    tokio::spawn(async move {
                        let detached = CancellationToken::new();
                        if let Err(err) = handler
                            .execute_step(&spawned_task, exec_message, &detached)
                            .await
                        {
                            warn!(task_id = %spawned_task.id, error = %err, "async execution failed");
                        }
                    });
                    Ok(SendMessageResponse::Task(task))
                }
            }
        }
    }

    /// Handle a streaming send. Frames arrive in the canonical order:
    /// `Task`, then on success `Message`, `ArtifactUpdate*`, and a final
    /// `StatusUpdate`; on policy denial/pending or executor failure the
    /// `Task` frame is followed directly by the final `StatusUpdate`.
    pub async fn send_streaming_message(
        &self,
        params: SendMessageParams,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamFrame>> {
        self.guard(&cancel)?;
        validate_message(&params.message)?;

        let (decision, effect) = self.evaluate(&params.message).await?;
        let task = self.ensure_task(&params.message).await?;

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let _ = tx.send(StreamFrame::Task(task.clone())).await;

        match effect {
            Effect::Deny => {
                let rejected = self.reject_for_policy(&task, &decision).await?;
                let _ = tx.send(Self::status_frame(&rejected, true)).await;
            }
            Effect::Pending => {
                let parked = self.park_for_approval(&task, &params.message, &decision).await?;
                let _ = tx.send(Self::status_frame(&parked, true)).await;
            }
            Effect::Allow => {
                let handler = self.clone();
                let exec_message = self.bound_message(&params.message, &task);
                let stream_cancel = cancel.child_token();
                tokio::spawn(async move {
                    handler
                        .stream_execute(task, exec_message, tx, stream_cancel)
                        .await;
                });
            }
        }
        Ok(rx)
    }

    async fn stream_execute(
        &self,
        task: Task,
        message: Message,
        tx: mpsc::Sender<StreamFrame>,
        cancel: CancellationToken,
    ) {
        match self.execute_step(&task, message, &cancel).await {
            Ok(outcome) => {
                let _ = tx.send(StreamFrame::Message(outcome.response)).await;
                for artifact in outcome.artifacts {
                    let frame = StreamFrame::ArtifactUpdate(TaskArtifactUpdateEvent {
                        task_id: task.id.clone(),
                        context_id: task.context_id.clone(),
                        kind: "artifact-update".to_string(),
                        artifact,
                        append: Some(true),
                        last_chunk: None,
                    });
                    let _ = tx.send(frame).await;
                }
                let _ = tx.send(Self::status_frame(&outcome.task, true)).await;
            }
            Err(err) => {
                if err.category() == Category::ContextLost {
                    // Stream consumer is gone; nothing left to emit.
                    return;
                }
                if let Ok(failed) = self.tasks.get_task(&task.id, 0, false).await {
                    let _ = tx.send(Self::status_frame(&failed, true)).await;
                }
            }
        }
    }

    /// Fetch a task by resource name. Artifacts are not included on this
    /// path; use `ListTasks` with `includeArtifacts` for them.
    pub async fn get_task(
        &self,
        name: &str,
        history_length: i32,
        cancel: CancellationToken,
    ) -> Result<Task> {
        self.guard(&cancel)?;
        if history_length < 0 {
            return Err(KairosError::invalid_input("historyLength must be >= 0"));
        }
        let task_id = naming::parse_task_ref(name)?;
        self.tasks
            .get_task(&task_id, history_length as u32, false)
            .await
    }

    /// List tasks with filtering and stable pagination.
    pub async fn list_tasks(
        &self,
        params: ListTasksParams,
        cancel: CancellationToken,
    ) -> Result<TaskPage> {
        self.guard(&cancel)?;
        if params.page_size.is_some_and(|size| size < 0) {
            return Err(KairosError::invalid_input("pageSize must be >= 0"));
        }
        if params.history_length.is_some_and(|length| length < 0) {
            return Err(KairosError::invalid_input("historyLength must be >= 0"));
        }

        let filter = TaskFilter {
            context_id: params.context_id,
            status: params.status,
            last_updated_after: params.last_updated_after,
            page_size: params.page_size.unwrap_or(0) as usize,
            page_token: params.page_token,
            history_length: params.history_length.unwrap_or(0) as u32,
            include_artifacts: params.include_artifacts.unwrap_or(false),
        };
        self.tasks.list_tasks(&filter).await
    }

    /// Cancel a task. Idempotent on already-terminal tasks.
    pub async fn cancel_task(&self, name: &str, cancel: CancellationToken) -> Result<Task> {
        self.guard(&cancel)?;
        let task_id = naming::parse_task_name(name)?;
        self.tasks.cancel_task(&task_id).await
    }

    /// Delete a task and everything it owns (push configs included).
    pub async fn delete_task(&self, name: &str, cancel: CancellationToken) -> Result<()> {
        self.guard(&cancel)?;
        let task_id = naming::parse_task_name(name)?;
        self.tasks.delete_task(&task_id).await?;
        if let Some(push_configs) = &self.push_configs {
            push_configs.delete_for_task(&task_id).await?;
        }
        Ok(())
    }

    /// Subscribe to a task's lifecycle. Emits the current status up front
    /// (final when terminal), then polls the store, emitting status diffs
    /// and newly appended artifacts until the task terminates or the caller
    /// cancels.
    pub async fn subscribe_to_task(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamFrame>> {
        self.guard(&cancel)?;
        let task_id = naming::parse_task_ref(name)?;
        let task = self.tasks.get_task(&task_id, 0, true).await?;

        let (tx, rx) = mpsc::channel(FRAME_BUFFER);
        let terminal = task.status.state.is_terminal();
        let _ = tx.send(Self::status_frame(&task, terminal)).await;
        if terminal {
            return Ok(rx);
        }

        let handler = self.clone();
        tokio::spawn(async move {
            handler.poll_task(task, tx, cancel).await;
        });
        Ok(rx)
    }

    async fn poll_task(&self, initial: Task, tx: mpsc::Sender<StreamFrame>, cancel: CancellationToken) {
        let mut last_status =
            serde_json::to_value(&initial.status).unwrap_or(serde_json::Value::Null);
        let mut seen_artifacts = initial.artifacts.as_ref().map_or(0, |a| a.len());

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tx.closed() => return,
                _ = ticker.tick() => {}
            }

            let task = match self.tasks.get_task(&initial.id, 0, true).await {
                Ok(task) => task,
                Err(err) => {
                    warn!(task_id = %initial.id, error = %err, "subscribe poll failed");
                    return;
                }
            };

            // New artifacts first so the final status update stays last.
            if let Some(artifacts) = &task.artifacts {
                for artifact in artifacts.iter().skip(seen_artifacts) {
                    let frame = StreamFrame::ArtifactUpdate(TaskArtifactUpdateEvent {
                        task_id: task.id.clone(),
                        context_id: task.context_id.clone(),
                        kind: "artifact-update".to_string(),
                        artifact: artifact.clone(),
                        append: None,
                        last_chunk: None,
                    });
                    if tx.send(frame).await.is_err() {
                        return;
                    }
                }
                seen_artifacts = artifacts.len();
            }

            let status_value =
                serde_json::to_value(&task.status).unwrap_or(serde_json::Value::Null);
            let terminal = task.status.state.is_terminal();
            if status_value != last_status {
                if tx.send(Self::status_frame(&task, terminal)).await.is_err() {
                    return;
                }
                last_status = status_value;
            }
            if terminal {
                return;
            }
        }
    }

    fn status_frame(task: &Task, r#final: bool) -> StreamFrame {
        StreamFrame::StatusUpdate(TaskStatusUpdateEvent {
            task_id: task.id.clone(),
            context_id: task.context_id.clone(),
            kind: "status-update".to_string(),
            status: task.status.clone(),
            r#final,
            metadata: None,
        })
    }

    // -----------------------------------------------------------------------
    // Push configs
    // -----------------------------------------------------------------------

    fn require_push_store(&self) -> Result<&Arc<dyn PushConfigStore>> {
        match &self.push_configs {
            Some(store) => Ok(store),
            None => {
                let advertised = self
                    .agent_card
                    .as_ref()
                    .and_then(|card| card.capabilities.push_notifications)
                    .unwrap_or(false);
                if advertised {
                    Err(KairosError::failed_precondition(
                        "push notifications advertised but no push config store configured",
                    ))
                } else {
                    Err(KairosError::unimplemented(
                        "push notifications are not supported",
                    ))
                }
            }
        }
    }

    /// Create or replace a push config for an existing task.
    pub async fn set_push_config(
        &self,
        task_name: &str,
        mut config: PushNotificationConfig,
        cancel: CancellationToken,
    ) -> Result<TaskPushNotificationConfig> {
        self.guard(&cancel)?;
        let store = self.require_push_store()?;
        let task_id = naming::parse_task_name(task_name)?;
        let task = self.tasks.get_task(&task_id, 0, false).await?;

        let config_id = config
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        config.id = Some(config_id.clone());

        store
            .set(TaskPushNotificationConfig {
                name: naming::push_config_name(&task.id, &config_id),
                task_id: task.id.clone(),
                push_notification_config: config,
            })
            .await
    }

    /// Fetch a push config by resource name.
    pub async fn get_push_config(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<TaskPushNotificationConfig> {
        self.guard(&cancel)?;
        let store = self.require_push_store()?;
        let (task_id, config_id) = naming::parse_push_config_name(name)?;
        store.get(&task_id, &config_id).await
    }

    /// List a task's push configs.
    pub async fn list_push_configs(
        &self,
        task_name: &str,
        page_size: i32,
        cancel: CancellationToken,
    ) -> Result<ListPushConfigsResponse> {
        self.guard(&cancel)?;
        let store = self.require_push_store()?;
        if page_size < 0 {
            return Err(KairosError::invalid_input("pageSize must be >= 0"));
        }
        let task_id = naming::parse_task_ref(task_name)?;
        let configs = store.list(&task_id, page_size as usize).await?;
        Ok(ListPushConfigsResponse { configs })
    }

    /// Delete a push config by resource name.
    pub async fn delete_push_config(&self, name: &str, cancel: CancellationToken) -> Result<()> {
        self.guard(&cancel)?;
        let store = self.require_push_store()?;
        let (task_id, config_id) = naming::parse_push_config_name(name)?;
        store.delete(&task_id, &config_id).await
    }

    // -----------------------------------------------------------------------
    // Agent card
    // -----------------------------------------------------------------------

    /// Return the extended agent card.
    pub fn get_extended_agent_card(&self) -> Result<AgentCard> {
        self.agent_card
            .clone()
            .ok_or_else(|| KairosError::unimplemented("extended agent card is not configured"))
    }

    // -----------------------------------------------------------------------
    // Approvals
    // -----------------------------------------------------------------------

    fn require_approval_store(&self) -> Result<&Arc<dyn ApprovalStore>> {
        self.approvals
            .as_ref()
            .ok_or_else(|| KairosError::unimplemented("approvals are not supported"))
    }

    /// List approval records.
    pub async fn list_approvals(
        &self,
        filter: ApprovalFilter,
        cancel: CancellationToken,
    ) -> Result<Vec<ApprovalRecord>> {
        self.guard(&cancel)?;
        let store = self.require_approval_store()?;
        store.list(&filter).await
    }

    /// Fetch an approval record. Expiry is honored on read: an expired
    /// pending record is surfaced as rejected even before the sweeper has
    /// persisted the rejection.
    pub async fn get_approval(
        &self,
        approval_id: &str,
        cancel: CancellationToken,
    ) -> Result<ApprovalRecord> {
        self.guard(&cancel)?;
        let store = self.require_approval_store()?;
        let mut record = store.get(approval_id).await?;
        if record.is_expired(self.clock.now()) {
            record.status = ApprovalStatus::Rejected;
            record.reason = "approval expired".to_string();
        }
        Ok(record)
    }

    /// Approve a pending record and execute the captured message.
    ///
    /// Idempotent on resolved records (returns the task's current state
    /// without re-invoking the executor); an expired record is rejected
    /// instead.
    pub async fn approve(
        &self,
        approval_id: &str,
        reason: &str,
        cancel: CancellationToken,
    ) -> Result<Task> {
        self.guard(&cancel)?;
        let store = self.require_approval_store()?;
        let record = store.get(approval_id).await?;

        if record.status != ApprovalStatus::Pending {
            return self.tasks.get_task(&record.task_id, 0, false).await;
        }
        if record.is_expired(self.clock.now()) {
            return self.reject_record(&record, "approval expired").await;
        }

        store
            .update_status(approval_id, ApprovalStatus::Approved, reason)
            .await?;
        debug!(approval_id = %approval_id, task_id = %record.task_id, "approval granted");

        let task = self.tasks.get_task(&record.task_id, 0, true).await?;
        let outcome = self
            .execute_step(&task, record.message.clone(), &cancel)
            .await?;
        Ok(outcome.task)
    }

    /// Reject a pending record and transition its task to `rejected`.
    ///
    /// Idempotent on resolved records.
    pub async fn reject(
        &self,
        approval_id: &str,
        reason: &str,
        cancel: CancellationToken,
    ) -> Result<Task> {
        self.guard(&cancel)?;
        let store = self.require_approval_store()?;
        let record = store.get(approval_id).await?;

        if record.status != ApprovalStatus::Pending {
            return self.tasks.get_task(&record.task_id, 0, false).await;
        }
        self.reject_record(&record, reason).await
    }

    async fn reject_record(&self, record: &ApprovalRecord, reason: &str) -> Result<Task> {
        let store = self.require_approval_store()?;
        store
            .update_status(&record.id, ApprovalStatus::Rejected, reason)
            .await?;
        debug!(approval_id = %record.id, task_id = %record.task_id, reason = %reason, "approval rejected");

        let task = self.tasks.get_task(&record.task_id, 0, false).await?;
        let mut status_message = self.agent_message(&task, reason);
        status_message.merge_metadata(HashMap::from([(
            METADATA_APPROVAL_ID.to_string(),
            serde_json::Value::String(record.id.clone()),
        )]));

        match self
            .tasks
            .append_history(&record.task_id, status_message.clone())
            .await
        {
            Ok(_) => {}
            // The task reached a terminal state through another path (e.g.
            // cancellation); the record is resolved, the task stays put.
            Err(err) if err.category() == Category::FailedPrecondition => {
                return self.tasks.get_task(&record.task_id, 0, false).await;
            }
            Err(err) => return Err(err),
        }

        self.tasks
            .update_status(
                &record.task_id,
                TaskStatus::with_message(TaskState::Rejected, status_message),
            )
            .await
    }

    /// Reject every pending approval whose expiry has passed. Returns how
    /// many records were expired.
    pub async fn expire_approvals(&self, cancel: CancellationToken) -> Result<usize> {
        let Some(store) = &self.approvals else {
            return Ok(0);
        };

        let filter = ApprovalFilter {
            status: Some(ApprovalStatus::Pending),
            expiring_before: Some(self.clock.now()),
            ..Default::default()
        };
        let records = store.list(&filter).await?;

        let mut expired = 0;
        for record in records {
            if cancel.is_cancelled() {
                break;
            }
            match self.reject_record(&record, "approval expired").await {
                Ok(_) => expired += 1,
                Err(err) => {
                    warn!(approval_id = %record.id, error = %err, "failed to expire approval");
                }
            }
        }
        Ok(expired)
    }
}
