//! Wire bindings.
//!
//! One [`Handler`](crate::handler::Handler) powers three transports with
//! identical validation, error mapping, ordering guarantees, and resource
//! naming:
//!
//! - [`A2aService`] — the native service shim. Methods map 1:1 onto the
//!   handler, each wrapped in a tracing span and checked against the agent
//!   card's advertised capabilities. Streaming methods hand back the frame
//!   receiver directly; a binary RPC layer mounts on this.
//! - [`http_router`] — HTTP/JSON: one endpoint per method, canonical JSON
//!   bodies, streaming as Server-Sent Events.
//! - [`jsonrpc_router`] — JSON-RPC 2.0 over a single endpoint with string
//!   method names; streaming frames arrive as SSE events wrapping each
//!   frame in a JSON-RPC response envelope.
//!
//! The [`auth`] middleware applies the same presence-only check to both
//! HTTP routers.

pub mod auth;
pub mod http;
pub mod jsonrpc;
pub mod service;

pub use auth::{require_auth, AuthConfig, PeerVerified};
pub use http::http_router;
pub use jsonrpc::jsonrpc_router;
pub use service::A2aService;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use crate::error::KairosError;
use crate::types::{ApprovalStatus, PushNotificationConfig};

/// Render an error with the canonical HTTP mapping and JSON body shared by
/// both HTTP bindings.
pub(crate) fn error_response(err: &KairosError) -> Response {
    let status = StatusCode::from_u16(err.category().http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = Json(serde_json::json!({
        "error": {
            "category": err.category().as_str(),
            "code": err.category().rpc_code(),
            "message": err.message(),
        }
    }));
    (status, body).into_response()
}

// ---------------------------------------------------------------------------
// Shared request bodies
//
// Unknown fields are discarded by serde's default behavior, per the wire
// contract.
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GetTaskBody {
    pub name: String,
    #[serde(default)]
    pub history_length: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskNameBody {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SetPushConfigBody {
    /// Parent task resource name, `tasks/{id}`.
    pub parent: String,
    pub config: PushNotificationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListPushConfigsBody {
    /// Parent task resource name or bare id.
    pub parent: String,
    #[serde(default)]
    pub page_size: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListApprovalsBody {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
    #[serde(default)]
    pub status: Option<ApprovalStatus>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApprovalIdBody {
    pub approval_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ResolveApprovalBody {
    pub approval_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl From<ListApprovalsBody> for crate::approval::ApprovalFilter {
    fn from(body: ListApprovalsBody) -> Self {
        crate::approval::ApprovalFilter {
            task_id: body.task_id,
            context_id: body.context_id,
            status: body.status,
            limit: body.limit,
            expiring_before: None,
        }
    }
}
