//! JSON-RPC 2.0 binding.
//!
//! A single endpoint dispatches on string method names. Unary methods
//! return a JSON-RPC response envelope; streaming methods return SSE where
//! each event's payload is a JSON-RPC success envelope wrapping one frame.
//!
//! # Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | `message/send` | Send a message, get a task or message back |
//! | `message/stream` | Send a message with SSE frame streaming |
//! | `tasks/get` | Retrieve a task |
//! | `tasks/list` | List tasks with filtering and pagination |
//! | `tasks/cancel` | Cancel a task |
//! | `tasks/subscribe` | Subscribe to task updates (SSE) |
//! | `tasks/pushNotificationConfig/set` | Upsert a push config |
//! | `tasks/pushNotificationConfig/get` | Fetch a push config |
//! | `tasks/pushNotificationConfig/list` | List a task's push configs |
//! | `tasks/pushNotificationConfig/delete` | Delete a push config |
//! | `agent/getExtendedCard` | Fetch the extended agent card |
//! | `approvals/list` | List approval records |
//! | `approvals/get` | Fetch an approval record |
//! | `approvals/approve` | Approve a pending record and run the task |
//! | `approvals/reject` | Reject a pending record |

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::middleware;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::KairosError;
use crate::types::{ListTasksParams, SendMessageParams, StreamFrame};

use super::auth::{require_auth, AuthConfig};
use super::{
    ApprovalIdBody, GetTaskBody, ListApprovalsBody, ListPushConfigsBody, ResolveApprovalBody,
    SetPushConfigBody, TaskNameBody, A2aService,
};

const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcErrorObject>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl JsonRpcResponse {
    fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i64, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code,
                message,
                data: None,
            }),
        }
    }

    fn from_kairos_error(id: Option<Value>, err: &KairosError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(JsonRpcErrorObject {
                code: err.category().jsonrpc_code(),
                message: err.to_string(),
                data: Some(serde_json::json!({
                    "category": err.category().as_str(),
                    "code": err.category().rpc_code(),
                })),
            }),
        }
    }
}

const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_REQUEST: i64 = -32600;
const INVALID_PARAMS: i64 = -32602;
const INTERNAL_ERROR: i64 = -32603;

#[derive(Clone)]
struct JsonRpcState {
    service: Arc<A2aService>,
}

/// Build the JSON-RPC router with a single `/a2a` endpoint.
pub fn jsonrpc_router(service: Arc<A2aService>, auth: AuthConfig) -> Router {
    let state = JsonRpcState { service };
    Router::new()
        .route("/a2a", post(dispatch))
        .layer(middleware::from_fn_with_state(auth, require_auth))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn dispatch(
    State(state): State<JsonRpcState>,
    Json(request): Json<JsonRpcRequest>,
) -> Response {
    if request.jsonrpc != JSONRPC_VERSION {
        return Json(JsonRpcResponse::error(
            request.id,
            INVALID_REQUEST,
            "invalid JSON-RPC version, must be \"2.0\"".to_string(),
        ))
        .into_response();
    }

    debug!(method = %request.method, "JSON-RPC request");
    let JsonRpcRequest {
        id, method, params, ..
    } = request;

    match method.as_str() {
        "message/send" => {
            with_params(id, params, |params: SendMessageParams, id| async move {
                unary(id, state.service.send_message(params, token()).await)
            })
            .await
        }
        "message/stream" => {
            with_params(id, params, |params: SendMessageParams, id| async move {
                match state.service.send_streaming_message(params, token()).await {
                    Ok(rx) => sse_envelope_response(id, rx),
                    Err(err) => Json(JsonRpcResponse::from_kairos_error(id, &err)).into_response(),
                }
            })
            .await
        }
        "tasks/get" => {
            with_params(id, params, |body: GetTaskBody, id| async move {
                unary(
                    id,
                    state
                        .service
                        .get_task(&body.name, body.history_length.unwrap_or(0), token())
                        .await,
                )
            })
            .await
        }
        "tasks/list" => {
            with_params(id, params, |params: ListTasksParams, id| async move {
                unary(id, state.service.list_tasks(params, token()).await)
            })
            .await
        }
        "tasks/cancel" => {
            with_params(id, params, |body: TaskNameBody, id| async move {
                unary(id, state.service.cancel_task(&body.name, token()).await)
            })
            .await
        }
        "tasks/subscribe" => {
            with_params(id, params, |body: TaskNameBody, id| async move {
                match state.service.subscribe_to_task(&body.name, token()).await {
                    Ok(rx) => sse_envelope_response(id, rx),
                    Err(err) => Json(JsonRpcResponse::from_kairos_error(id, &err)).into_response(),
                }
            })
            .await
        }
        "tasks/pushNotificationConfig/set" => {
            with_params(id, params, |body: SetPushConfigBody, id| async move {
                unary(
                    id,
                    state
                        .service
                        .set_push_config(&body.parent, body.config, token())
                        .await,
                )
            })
            .await
        }
        "tasks/pushNotificationConfig/get" => {
            with_params(id, params, |body: TaskNameBody, id| async move {
                unary(id, state.service.get_push_config(&body.name, token()).await)
            })
            .await
        }
        "tasks/pushNotificationConfig/list" => {
            with_params(id, params, |body: ListPushConfigsBody, id| async move {
                unary(
                    id,
                    state
                        .service
                        .list_push_configs(&body.parent, body.page_size.unwrap_or(0), token())
                        .await,
                )
            })
            .await
        }
        "tasks/pushNotificationConfig/delete" => {
            with_params(id, params, |body: TaskNameBody, id| async move {
                match state.service.delete_push_config(&body.name, token()).await {
                    Ok(()) => {
                        Json(JsonRpcResponse::success(id, Value::Null)).into_response()
                    }
                    Err(err) => Json(JsonRpcResponse::from_kairos_error(id, &err)).into_response(),
                }
            })
            .await
        }
        "agent/getExtendedCard" => unary(id, state.service.get_extended_agent_card()),
        "approvals/list" => {
            with_params(id, params, |body: ListApprovalsBody, id| async move {
                unary(id, state.service.list_approvals(body.into(), token()).await)
            })
            .await
        }
        "approvals/get" => {
            with_params(id, params, |body: ApprovalIdBody, id| async move {
                unary(
                    id,
                    state.service.get_approval(&body.approval_id, token()).await,
                )
            })
            .await
        }
        "approvals/approve" => {
            with_params(id, params, |body: ResolveApprovalBody, id| async move {
                unary(
                    id,
                    state
                        .service
                        .approve_approval(
                            &body.approval_id,
                            body.reason.as_deref().unwrap_or("approved by operator"),
                            token(),
                        )
                        .await,
                )
            })
            .await
        }
        "approvals/reject" => {
            with_params(id, params, |body: ResolveApprovalBody, id| async move {
                unary(
                    id,
                    state
                        .service
                        .reject_approval(
                            &body.approval_id,
                            body.reason.as_deref().unwrap_or("rejected by operator"),
                            token(),
                        )
                        .await,
                )
            })
            .await
        }
        method => {
            warn!(method = %method, "unknown JSON-RPC method");
            Json(JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("method not found: {}", method),
            ))
            .into_response()
        }
    }
}

fn token() -> CancellationToken {
    CancellationToken::new()
}

/// Deserialize params and run the method, or answer with invalid-params.
async fn with_params<P, F, Fut>(id: Option<Value>, params: Value, run: F) -> Response
where
    P: serde::de::DeserializeOwned,
    F: FnOnce(P, Option<Value>) -> Fut,
    Fut: std::future::Future<Output = Response>,
{
    match serde_json::from_value::<P>(params) {
        Ok(parsed) => run(parsed, id).await,
        Err(err) => Json(JsonRpcResponse::error(
            id,
            INVALID_PARAMS,
            format!("invalid params: {}", err),
        ))
        .into_response(),
    }
}

/// Render a unary result as a JSON-RPC envelope.
fn unary<T: Serialize>(id: Option<Value>, result: crate::error::Result<T>) -> Response {
    match result {
        Ok(value) => match serde_json::to_value(&value) {
            Ok(value) => Json(JsonRpcResponse::success(id, value)).into_response(),
            Err(err) => Json(JsonRpcResponse::error(
                id,
                INTERNAL_ERROR,
                format!("failed to serialize response: {}", err),
            ))
            .into_response(),
        },
        Err(err) => Json(JsonRpcResponse::from_kairos_error(id, &err)).into_response(),
    }
}

/// Wrap a frame stream as SSE; each event's payload is a JSON-RPC success
/// envelope around one frame.
fn sse_envelope_response(id: Option<Value>, rx: mpsc::Receiver<StreamFrame>) -> Response {
    let stream = ReceiverStream::new(rx).map(move |frame| {
        let envelope = match serde_json::to_value(&frame) {
            Ok(value) => JsonRpcResponse::success(id.clone(), value),
            Err(err) => JsonRpcResponse::error(
                id.clone(),
                INTERNAL_ERROR,
                format!("failed to serialize frame: {}", err),
            ),
        };
        let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
        Ok::<_, Infallible>(Event::default().data(data))
    });
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}
