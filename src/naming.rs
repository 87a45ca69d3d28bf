//! Resource-name grammar.
//!
//! Tasks are addressed as `tasks/{id}` and push notification configs as
//! `tasks/{id}/pushNotificationConfigs/{config_id}`. Parsing rejects
//! malformed names with an invalid-input error; bare task ids (no prefix)
//! are accepted as a legacy convenience on read paths only, via
//! [`parse_task_ref`].

use crate::error::{KairosError, Result};

const TASKS_PREFIX: &str = "tasks/";
const PUSH_SEGMENT: &str = "/pushNotificationConfigs/";

/// Format a task resource name.
pub fn task_name(task_id: &str) -> String {
    format!("{}{}", TASKS_PREFIX, task_id)
}

/// Format a push-config resource name.
pub fn push_config_name(task_id: &str, config_id: &str) -> String {
    format!("{}{}{}{}", TASKS_PREFIX, task_id, PUSH_SEGMENT, config_id)
}

/// Parse a strict `tasks/{id}` name. Rejects bare ids.
pub fn parse_task_name(name: &str) -> Result<String> {
    let id = name
        .strip_prefix(TASKS_PREFIX)
        .ok_or_else(|| malformed(name))?;
    if id.is_empty() || id.contains('/') {
        return Err(malformed(name));
    }
    Ok(id.to_string())
}

/// Parse a task reference on a read path: `tasks/{id}` or a bare id.
pub fn parse_task_ref(name: &str) -> Result<String> {
    if let Some(id) = name.strip_prefix(TASKS_PREFIX) {
        if id.is_empty() || id.contains('/') {
            return Err(malformed(name));
        }
        return Ok(id.to_string());
    }
    if name.is_empty() || name.contains('/') {
        return Err(malformed(name));
    }
    Ok(name.to_string())
}

/// Parse `tasks/{id}/pushNotificationConfigs/{config_id}` into
/// `(task_id, config_id)`.
pub fn parse_push_config_name(name: &str) -> Result<(String, String)> {
    let rest = name
        .strip_prefix(TASKS_PREFIX)
        .ok_or_else(|| malformed(name))?;
    let (task_id, config_id) = rest.split_once(PUSH_SEGMENT).ok_or_else(|| malformed(name))?;
    if task_id.is_empty()
        || task_id.contains('/')
        || config_id.is_empty()
        || config_id.contains('/')
    {
        return Err(malformed(name));
    }
    Ok((task_id.to_string(), config_id.to_string()))
}

fn malformed(name: &str) -> KairosError {
    KairosError::invalid_input(format!("malformed resource name: {:?}", name))
}
