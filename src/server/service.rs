//! Native service shim.
//!
//! [`A2aService`] is the surface a binary RPC layer mounts on: every wire
//! method maps 1:1 onto a handler operation, wrapped in a tracing span and
//! checked against the agent card's advertised capabilities. Streaming
//! methods return the typed frame receiver natively; no transport types
//! appear on either side of the boundary.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::approval::ApprovalFilter;
use crate::error::{KairosError, Result};
use crate::handler::Handler;
use crate::types::{
    AgentCard, ApprovalRecord, ListPushConfigsResponse, ListTasksParams, PushNotificationConfig,
    SendMessageParams, SendMessageResponse, StreamFrame, Task, TaskPage,
    TaskPushNotificationConfig,
};

/// The native A2A service surface.
pub struct A2aService {
    handler: Arc<Handler>,
}

impl A2aService {
    /// Wrap a handler.
    pub fn new(handler: Arc<Handler>) -> Self {
        Self { handler }
    }

    /// The wrapped handler.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    /// Reject streaming calls when the card says streaming is not offered.
    fn check_streaming(&self) -> Result<()> {
        if let Some(card) = self.handler.agent_card() {
            if !card.capabilities.streaming.unwrap_or(false) {
                return Err(KairosError::unimplemented(
                    "streaming is not advertised by this agent",
                ));
            }
        }
        Ok(())
    }

    /// Reject push config calls when the card says push is not offered.
    fn check_push(&self) -> Result<()> {
        if let Some(card) = self.handler.agent_card() {
            if !card.capabilities.push_notifications.unwrap_or(false) {
                return Err(KairosError::unimplemented(
                    "push notifications are not advertised by this agent",
                ));
            }
        }
        Ok(())
    }

    /// `SendMessage`.
    #[instrument(name = "a2a.SendMessage", skip_all)]
    pub async fn send_message(
        &self,
        params: SendMessageParams,
        cancel: CancellationToken,
    ) -> Result<SendMessageResponse> {
        self.handler.send_message(params, cancel).await
    }

    /// `SendStreamingMessage`.
    #[instrument(name = "a2a.SendStreamingMessage", skip_all)]
    pub async fn send_streaming_message(
        &self,
        params: SendMessageParams,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamFrame>> {
        self.check_streaming()?;
        self.handler.send_streaming_message(params, cancel).await
    }

    /// `GetTask`.
    #[instrument(name = "a2a.GetTask", skip_all, fields(name = %name))]
    pub async fn get_task(
        &self,
        name: &str,
        history_length: i32,
        cancel: CancellationToken,
    ) -> Result<Task> {
        self.handler.get_task(name, history_length, cancel).await
    }

    /// `ListTasks`.
    #[instrument(name = "a2a.ListTasks", skip_all)]
    pub async fn list_tasks(
        &self,
        params: ListTasksParams,
        cancel: CancellationToken,
    ) -> Result<TaskPage> {
        self.handler.list_tasks(params, cancel).await
    }

    /// `CancelTask`.
    #[instrument(name = "a2a.CancelTask", skip_all, fields(name = %name))]
    pub async fn cancel_task(&self, name: &str, cancel: CancellationToken) -> Result<Task> {
        self.handler.cancel_task(name, cancel).await
    }

    /// `SubscribeToTask`.
    #[instrument(name = "a2a.SubscribeToTask", skip_all, fields(name = %name))]
    pub async fn subscribe_to_task(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamFrame>> {
        self.check_streaming()?;
        self.handler.subscribe_to_task(name, cancel).await
    }

    /// `SetTaskPushNotificationConfig`.
    #[instrument(name = "a2a.SetTaskPushNotificationConfig", skip_all)]
    pub async fn set_push_config(
        &self,
        task_name: &str,
        config: PushNotificationConfig,
        cancel: CancellationToken,
    ) -> Result<TaskPushNotificationConfig> {
        self.check_push()?;
        self.handler.set_push_config(task_name, config, cancel).await
    }

    /// `GetTaskPushNotificationConfig`.
    #[instrument(name = "a2a.GetTaskPushNotificationConfig", skip_all, fields(name = %name))]
    pub async fn get_push_config(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<TaskPushNotificationConfig> {
        self.check_push()?;
        self.handler.get_push_config(name, cancel).await
    }

    /// `ListTaskPushNotificationConfig`.
    #[instrument(name = "a2a.ListTaskPushNotificationConfig", skip_all)]
    pub async fn list_push_configs(
        &self,
        task_name: &str,
        page_size: i32,
        cancel: CancellationToken,
    ) -> Result<ListPushConfigsResponse> {
        self.check_push()?;
        self.handler
            .list_push_configs(task_name, page_size, cancel)
            .await
    }

    /// `DeleteTaskPushNotificationConfig`.
    #[instrument(name = "a2a.DeleteTaskPushNotificationConfig", skip_all, fields(name = %name))]
    pub async fn delete_push_config(
        &self,
        name: &str,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.check_push()?;
        self.handler.delete_push_config(name, cancel).await
    }

    /// `GetExtendedAgentCard`.
    #[instrument(name = "a2a.GetExtendedAgentCard", skip_all)]
    pub fn get_extended_agent_card(&self) -> Result<AgentCard> {
        self.handler.get_extended_agent_card()
    }

    /// `ListApprovals`.
    #[instrument(name = "a2a.ListApprovals", skip_all)]
    pub async fn list_approvals(
        &self,
        filter: ApprovalFilter,
        cancel: CancellationToken,
    ) -> Result<Vec<ApprovalRecord>> {
        self.handler.list_approvals(filter, cancel).await
    }

    /// `GetApproval`.
    #[instrument(name = "a2a.GetApproval", skip_all, fields(approval_id = %approval_id))]
    pub async fn get_approval(
        &self,
        approval_id: &str,
        cancel: CancellationToken,
    ) -> Result<ApprovalRecord> {
        self.handler.get_approval(approval_id, cancel).await
    }

    /// `ApproveApproval`.
    #[instrument(name = "a2a.ApproveApproval", skip_all, fields(approval_id = %approval_id))]
    pub async fn approve_approval(
        &self,
        approval_id: &str,
        reason: &str,
        cancel: CancellationToken,
    ) -> Result<Task> {
        self.handler.approve(approval_id, reason, cancel).await
    }

    /// `RejectApproval`.
    #[instrument(name = "a2a.RejectApproval", skip_all, fields(approval_id = %approval_id))]
    pub async fn reject_approval(
        &self,
        approval_id: &str,
        reason: &str,
        cancel: CancellationToken,
    ) -> Result<Task> {
        self.handler.reject(approval_id, reason, cancel).await
    }
}
