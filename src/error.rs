//! Error taxonomy for the Kairos A2A substrate.
//!
//! Every fallible operation in the crate returns [`KairosError`], a single
//! typed error carrying a [`Category`], a human-readable message, an optional
//! cause chain, a context map (task id, operation, ...), and a `recoverable`
//! flag. The category drives the per-transport code mapping: HTTP status for
//! the HTTP/JSON binding, canonical RPC code names for the native service
//! shim, and JSON-RPC numeric codes for the JSON-RPC binding.

use std::collections::BTreeMap;
use std::fmt;

/// Typed error categories.
///
/// These are wire-stable identifiers: the kebab-case form returned by
/// [`Category::as_str`] appears in error payloads on every binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Malformed request: missing fields, bad resource names, negative sizes,
    /// unknown page tokens.
    InvalidInput,
    /// The referenced task / approval / push config does not exist.
    NotFound,
    /// The auth middleware rejected the request.
    Unauthorized,
    /// An operation exceeded its deadline.
    Timeout,
    /// The caller is being throttled.
    RateLimit,
    /// The operation is valid but the entity is in the wrong state
    /// (terminal-task mutation, unresolvable approval, missing collaborator).
    FailedPrecondition,
    /// The model provider failed while the executor was running.
    LlmError,
    /// A persistence backend failed.
    MemoryError,
    /// The request context was cancelled before the operation finished.
    ContextLost,
    /// A downstream collaborator is temporarily unreachable.
    Unavailable,
    /// The feature is not offered by this deployment.
    Unimplemented,
    /// Anything else.
    Internal,
}

impl Category {
    /// Stable kebab-case identifier used in wire payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::InvalidInput => "invalid-input",
            Category::NotFound => "not-found",
            Category::Unauthorized => "unauthorized",
            Category::Timeout => "timeout",
            Category::RateLimit => "rate-limit",
            Category::FailedPrecondition => "failed-precondition",
            Category::LlmError => "llm-error",
            Category::MemoryError => "memory-error",
            Category::ContextLost => "context-lost",
            Category::Unavailable => "unavailable",
            Category::Unimplemented => "unimplemented",
            Category::Internal => "internal",
        }
    }

    /// Canonical RPC code name for the native service shim.
    pub fn rpc_code(&self) -> &'static str {
        match self {
            Category::InvalidInput => "INVALID_ARGUMENT",
            Category::NotFound => "NOT_FOUND",
            Category::Unauthorized => "UNAUTHENTICATED",
            Category::Timeout => "DEADLINE_EXCEEDED",
            Category::RateLimit => "RESOURCE_EXHAUSTED",
            Category::FailedPrecondition => "FAILED_PRECONDITION",
            Category::LlmError => "UNAVAILABLE",
            Category::MemoryError => "DATA_LOSS",
            Category::ContextLost => "CANCELED",
            Category::Unavailable => "UNAVAILABLE",
            Category::Unimplemented => "UNIMPLEMENTED",
            Category::Internal => "INTERNAL",
        }
    }

    /// HTTP status for the HTTP/JSON binding.
    pub fn http_status(&self) -> u16 {
        match self {
            Category::InvalidInput => 400,
            Category::NotFound => 404,
            Category::Unauthorized => 401,
            Category::Timeout => 504,
            Category::RateLimit => 429,
            Category::FailedPrecondition => 412,
            Category::LlmError => 503,
            Category::MemoryError => 500,
            Category::ContextLost => 499,
            Category::Unavailable => 503,
            Category::Unimplemented => 501,
            Category::Internal => 500,
        }
    }

    /// JSON-RPC numeric code for the JSON-RPC binding.
    ///
    /// Validation failures map onto the standard `-32602` invalid-params
    /// code; the remaining categories use the A2A-reserved `-32xxx` range.
    pub fn jsonrpc_code(&self) -> i64 {
        match self {
            Category::InvalidInput => -32602,
            Category::NotFound => -32001,
            Category::FailedPrecondition => -32002,
            Category::Unimplemented => -32004,
            _ => -32603,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for the substrate.
#[derive(Debug, thiserror::Error)]
#[error("{category}: {message}")]
pub struct KairosError {
    category: Category,
    message: String,
    context: BTreeMap<&'static str, String>,
    recoverable: bool,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, KairosError>;

impl KairosError {
    /// Create an error with the given category and message.
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            context: BTreeMap::new(),
            recoverable: false,
            source: None,
        }
    }

    /// Malformed request input; touches no state.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(Category::InvalidInput, message)
    }

    /// The referenced entity does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(Category::NotFound, message)
    }

    /// Request rejected by the auth middleware.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(Category::Unauthorized, message)
    }

    /// Entity is in a state that forbids the operation.
    pub fn failed_precondition(message: impl Into<String>) -> Self {
        Self::new(Category::FailedPrecondition, message)
    }

    /// Feature not offered by this deployment.
    pub fn unimplemented(message: impl Into<String>) -> Self {
        Self::new(Category::Unimplemented, message)
    }

    /// Request context cancelled before the operation finished.
    pub fn context_lost(message: impl Into<String>) -> Self {
        Self::new(Category::ContextLost, message)
    }

    /// Catch-all internal failure.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Category::Internal, message)
    }

    /// Wrap a persistence-backend failure with `{operation, task_id}` context.
    ///
    /// Store errors are always marked recoverable: the entity may still be
    /// read back and the write retried by the caller.
    pub fn storage(
        operation: &'static str,
        task_id: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(Category::MemoryError, format!("{} failed", operation))
            .with_context("operation", operation)
            .with_context("task_id", task_id)
            .with_source(source)
            .recoverable()
    }

    /// Attach a context entry (e.g. `task_id`, `operation`).
    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.insert(key, value.into());
        self
    }

    /// Attach a cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Mark the error as recoverable (safe to retry).
    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }

    /// The error's category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// The human-readable message, without category prefix or context.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the operation may be retried.
    pub fn is_recoverable(&self) -> bool {
        self.recoverable
    }

    /// Context entries attached to this error.
    pub fn context(&self) -> &BTreeMap<&'static str, String> {
        &self.context
    }
}

impl From<serde_json::Error> for KairosError {
    fn from(err: serde_json::Error) -> Self {
        KairosError::invalid_input(format!("invalid JSON: {}", err)).with_source(err)
    }
}

impl From<sqlx::Error> for KairosError {
    fn from(err: sqlx::Error) -> Self {
        KairosError::new(Category::MemoryError, "database operation failed")
            .with_source(err)
            .recoverable()
    }
}
