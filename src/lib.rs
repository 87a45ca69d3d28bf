//! # kairos-a2a — the Kairos agent-to-agent execution substrate
//!
//! This crate is the hard center of a Kairos deployment: the request
//! handler behind the A2A wire contract, its task lifecycle state machine,
//! the policy-gated human-in-the-loop approval flow, the pluggable
//! task / push-config / approval persistence layer, and the streaming
//! discipline connecting them.
//!
//! ## Architecture
//!
//! - [`handler::Handler`] orchestrates everything: it validates requests,
//!   consults the [`policy::PolicyEngine`], persists through the stores,
//!   invokes the [`executor::Executor`], and advances each task's status
//!   machine (`submitted → working → completed/failed`, with
//!   `input-required` / `rejected` on the approval paths and `cancelled`
//!   from the client).
//! - [`store::TaskStore`], [`approval::ApprovalStore`], and
//!   [`push::PushConfigStore`] each come in two flavors: in-memory for
//!   development and tests, SQLite for durable deployments.
//! - [`server`] adapts the one handler to three transports — a native
//!   service shim, HTTP/JSON with SSE, and JSON-RPC with SSE — sharing
//!   validation, error mapping, and frame ordering.
//! - [`approval::ApprovalExpirer`] sweeps expired pending approvals in the
//!   background and rejects them.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kairos_a2a::executor::{ExecutionContext, Executor, ExecutorOutput};
//! use kairos_a2a::handler::Handler;
//! use kairos_a2a::server::{http_router, A2aService, AuthConfig};
//! use kairos_a2a::store::InMemoryTaskStore;
//! use kairos_a2a::types::Message;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Executor for Echo {
//!     async fn run(
//!         &self,
//!         _ctx: ExecutionContext,
//!         message: Message,
//!     ) -> kairos_a2a::Result<ExecutorOutput> {
//!         Ok(ExecutorOutput::text(message.text_content()))
//!     }
//! }
//!
//! let handler = Handler::builder(Arc::new(InMemoryTaskStore::new()), Arc::new(Echo)).build();
//! let app = http_router(Arc::new(A2aService::new(Arc::new(handler))), AuthConfig::default());
//! // axum::serve(listener, app).await
//! ```

pub mod approval;
pub mod clock;
pub mod error;
pub mod executor;
pub mod handler;
pub mod naming;
pub mod policy;
pub mod push;
pub mod server;
pub mod store;
pub mod types;

pub use error::{Category, KairosError, Result};
pub use handler::{Handler, HandlerBuilder};
