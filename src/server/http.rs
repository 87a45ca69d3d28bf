//! HTTP/JSON binding.
//!
//! One endpoint per wire method; request and response bodies are the
//! canonical camelCase JSON shapes with unknown fields discarded. Streaming
//! methods are exposed as Server-Sent Events where each event's `data:`
//! field is one JSON frame. Missing collaborator support surfaces as
//! `501 Not Implemented` through the unimplemented error category.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::types::{ListTasksParams, SendMessageParams, StreamFrame};

use super::auth::{require_auth, AuthConfig};
use super::{
    error_response, ApprovalIdBody, GetTaskBody, ListApprovalsBody, ListPushConfigsBody,
    ResolveApprovalBody, SetPushConfigBody, TaskNameBody, A2aService,
};

#[derive(Clone)]
struct HttpState {
    service: Arc<A2aService>,
}

/// Build the HTTP/JSON router.
pub fn http_router(service: Arc<A2aService>, auth: AuthConfig) -> Router {
    let state = HttpState { service };
    Router::new()
        .route("/v1/message/send", post(message_send))
        .route("/v1/message/stream", post(message_stream))
        .route("/v1/tasks/get", post(tasks_get))
        .route("/v1/tasks/list", post(tasks_list))
        .route("/v1/tasks/cancel", post(tasks_cancel))
        .route("/v1/tasks/subscribe", post(tasks_subscribe))
        .route("/v1/pushNotificationConfigs/set", post(push_config_set))
        .route("/v1/pushNotificationConfigs/get", post(push_config_get))
        .route("/v1/pushNotificationConfigs/list", post(push_config_list))
        .route(
            "/v1/pushNotificationConfigs/delete",
            post(push_config_delete),
        )
        .route("/v1/card", get(extended_card))
        .route("/v1/approvals/list", post(approvals_list))
        .route("/v1/approvals/get", post(approvals_get))
        .route("/v1/approvals/approve", post(approvals_approve))
        .route("/v1/approvals/reject", post(approvals_reject))
        .layer(middleware::from_fn_with_state(auth, require_auth))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Wrap a frame receiver as an SSE response: one `data: <json>` block per
/// frame.
fn sse_response(rx: mpsc::Receiver<StreamFrame>) -> Response {
    let stream = ReceiverStream::new(rx).map(|frame| {
        let data = match serde_json::to_string(&frame) {
            Ok(data) => data,
            Err(err) => {
                error!(error = %err, "failed to serialize stream frame");
                "{}".to_string()
            }
        };
        Ok::<_, Infallible>(Event::default().data(data))
    });
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

fn json_or_error<T: serde::Serialize>(result: crate::error::Result<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn message_send(
    State(state): State<HttpState>,
    Json(params): Json<SendMessageParams>,
) -> Response {
    json_or_error(
        state
            .service
            .send_message(params, CancellationToken::new())
            .await,
    )
}

async fn message_stream(
    State(state): State<HttpState>,
    Json(params): Json<SendMessageParams>,
) -> Response {
    match state
        .service
        .send_streaming_message(params, CancellationToken::new())
        .await
    {
        Ok(rx) => sse_response(rx),
        Err(err) => error_response(&err),
    }
}

async fn tasks_get(State(state): State<HttpState>, Json(body): Json<GetTaskBody>) -> Response {
    json_or_error(
        state
            .service
            .get_task(
                &body.name,
                body.history_length.unwrap_or(0),
                CancellationToken::new(),
            )
            .await,
    )
}

async fn tasks_list(
    State(state): State<HttpState>,
    Json(params): Json<ListTasksParams>,
) -> Response {
    json_or_error(
        state
            .service
            .list_tasks(params, CancellationToken::new())
            .await,
    )
}

async fn tasks_cancel(State(state): State<HttpState>, Json(body): Json<TaskNameBody>) -> Response {
    json_or_error(
        state
            .service
            .cancel_task(&body.name, CancellationToken::new())
            .await,
    )
}

async fn tasks_subscribe(
    State(state): State<HttpState>,
    Json(body): Json<TaskNameBody>,
) -> Response {
    match state
        .service
        .subscribe_to_task(&body.name, CancellationToken::new())
        .await
    {
        Ok(rx) => sse_response(rx),
        Err(err) => error_response(&err),
    }
}

async fn push_config_set(
    State(state): State<HttpState>,
    Json(body): Json<SetPushConfigBody>,
) -> Response {
    json_or_error(
        state
            .service
            .set_push_config(&body.parent, body.config, CancellationToken::new())
            .await,
    )
}

async fn push_config_get(
    State(state): State<HttpState>,
    Json(body): Json<TaskNameBody>,
) -> Response {
    json_or_error(
        state
            .service
            .get_push_config(&body.name, CancellationToken::new())
            .await,
    )
}

async fn push_config_list(
    State(state): State<HttpState>,
    Json(body): Json<ListPushConfigsBody>,
) -> Response {
    json_or_error(
        state
            .service
            .list_push_configs(
                &body.parent,
                body.page_size.unwrap_or(0),
                CancellationToken::new(),
            )
            .await,
    )
}

async fn push_config_delete(
    State(state): State<HttpState>,
    Json(body): Json<TaskNameBody>,
) -> Response {
    match state
        .service
        .delete_push_config(&body.name, CancellationToken::new())
        .await
    {
        Ok(()) => Json(serde_json::json!({})).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn extended_card(State(state): State<HttpState>) -> Response {
    json_or_error(state.service.get_extended_agent_card())
}

async fn approvals_list(
    State(state): State<HttpState>,
    Json(body): Json<ListApprovalsBody>,
) -> Response {
    json_or_error(
        state
            .service
            .list_approvals(body.into(), CancellationToken::new())
            .await,
    )
}

async fn approvals_get(
    State(state): State<HttpState>,
    Json(body): Json<ApprovalIdBody>,
) -> Response {
    json_or_error(
        state
            .service
            .get_approval(&body.approval_id, CancellationToken::new())
            .await,
    )
}

async fn approvals_approve(
    State(state): State<HttpState>,
    Json(body): Json<ResolveApprovalBody>,
) -> Response {
    json_or_error(
        state
            .service
            .approve_approval(
                &body.approval_id,
                body.reason.as_deref().unwrap_or("approved by operator"),
                CancellationToken::new(),
            )
            .await,
    )
}

async fn approvals_reject(
    State(state): State<HttpState>,
    Json(body): Json<ResolveApprovalBody>,
) -> Response {
    json_or_error(
        state
            .service
            .reject_approval(
                &body.approval_id,
                body.reason.as_deref().unwrap_or("rejected by operator"),
                CancellationToken::new(),
            )
            .await,
    )
}
