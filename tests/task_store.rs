//! Contract tests for the in-memory task store: lifecycle invariants,
//! filtering, stable pagination, and the cloning discipline.

mod common;

use std::sync::Arc;

use kairos_a2a::clock::Clock;
use kairos_a2a::error::Category;
use kairos_a2a::store::{InMemoryTaskStore, TaskFilter, TaskStore};
use kairos_a2a::types::{Message, TaskState, TaskStatus};

use common::{manual_clock, text_artifact, user_message};

fn store_with_clock() -> (Arc<InMemoryTaskStore>, Arc<kairos_a2a::clock::ManualClock>) {
    let clock = manual_clock();
    (Arc::new(InMemoryTaskStore::with_clock(clock.clone())), clock)
}

// ---- Creation ----

#[tokio::test]
async fn create_starts_submitted_with_message_in_history() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "hello")).await.unwrap();

    assert_eq!(task.status.state, TaskState::Submitted);
    assert!(task.status.timestamp.is_some());
    let history = task.history.as_ref().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message_id, "m1");
    assert_eq!(history[0].task_id.as_deref(), Some(task.id.as_str()));
    assert_eq!(history[0].context_id.as_deref(), Some(task.context_id.as_str()));
}

#[tokio::test]
async fn create_adopts_message_context_id() {
    let (store, _clock) = store_with_clock();
    let mut message = user_message("m1", "hello");
    message.context_id = Some("ctx-42".to_string());

    let task = store.create_task(message).await.unwrap();
    assert_eq!(task.context_id, "ctx-42");
}

#[tokio::test]
async fn create_rejects_invalid_messages() {
    let (store, _clock) = store_with_clock();

    let mut no_id = user_message("", "hello");
    no_id.message_id = String::new();
    let err = store.create_task(no_id).await.unwrap_err();
    assert_eq!(err.category(), Category::InvalidInput);

    let mut no_parts = user_message("m1", "hello");
    no_parts.parts.clear();
    let err = store.create_task(no_parts).await.unwrap_err();
    assert_eq!(err.category(), Category::InvalidInput);
}

// ---- History ----

#[tokio::test]
async fn append_history_preserves_order_and_fills_ids() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "one")).await.unwrap();

    store.append_history(&task.id, user_message("m2", "two")).await.unwrap();
    let updated = store.append_history(&task.id, user_message("m3", "three")).await.unwrap();

    let history = updated.history.unwrap();
    let ids: Vec<&str> = history.iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, ["m1", "m2", "m3"]);
    assert!(history.iter().all(|m| m.context_id.as_deref() == Some(updated.context_id.as_str())));
}

#[tokio::test]
async fn append_history_rejects_duplicate_message_id() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "one")).await.unwrap();

    let err = store
        .append_history(&task.id, user_message("m1", "again"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), Category::InvalidInput);
}

#[tokio::test]
async fn append_history_rejects_foreign_context() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "one")).await.unwrap();

    let mut foreign = user_message("m2", "two");
    foreign.context_id = Some("some-other-context".to_string());
    let err = store.append_history(&task.id, foreign).await.unwrap_err();
    assert_eq!(err.category(), Category::InvalidInput);
}

#[tokio::test]
async fn history_trimming_returns_most_recent() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "one")).await.unwrap();
    store.append_history(&task.id, user_message("m2", "two")).await.unwrap();
    store.append_history(&task.id, user_message("m3", "three")).await.unwrap();

    let trimmed = store.get_task(&task.id, 2, true).await.unwrap();
    let history = trimmed.history.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].message_id, "m2");
    assert_eq!(history[1].message_id, "m3");

    let full = store.get_task(&task.id, 0, true).await.unwrap();
    assert_eq!(full.history.unwrap().len(), 3);
}

// ---- Status machine ----

#[tokio::test]
async fn status_update_stamps_timestamp_and_updated_at() {
    let (store, clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    let created_at = task.updated_at;

    clock.advance(chrono::Duration::seconds(5));
    let updated = store
        .update_status(&task.id, TaskStatus::new(TaskState::Working))
        .await
        .unwrap();

    assert_eq!(updated.status.state, TaskState::Working);
    assert!(updated.status.timestamp.is_some());
    assert!(updated.updated_at > created_at);
}

#[tokio::test]
async fn terminal_tasks_are_immutable() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    store
        .update_status(&task.id, TaskStatus::new(TaskState::Completed))
        .await
        .unwrap();

    let err = store
        .update_status(&task.id, TaskStatus::new(TaskState::Working))
        .await
        .unwrap_err();
    assert_eq!(err.category(), Category::FailedPrecondition);

    let err = store
        .append_history(&task.id, user_message("m2", "more"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), Category::FailedPrecondition);

    let err = store
        .add_artifacts(&task.id, vec![text_artifact("a1", "out", "x")])
        .await
        .unwrap_err();
    assert_eq!(err.category(), Category::FailedPrecondition);

    // The task is observably unchanged after every failed write.
    let read_back = store.get_task(&task.id, 0, true).await.unwrap();
    assert_eq!(read_back.status.state, TaskState::Completed);
    assert_eq!(read_back.history.unwrap().len(), 1);
    assert!(read_back.artifacts.is_none());
}

#[tokio::test]
async fn cancelled_to_cancelled_is_a_noop() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    let cancelled = store.cancel_task(&task.id).await.unwrap();

    let again = store
        .update_status(&task.id, TaskStatus::new(TaskState::Cancelled))
        .await
        .unwrap();
    assert_eq!(again.status.timestamp, cancelled.status.timestamp);
    assert_eq!(again.updated_at, cancelled.updated_at);
}

// ---- Cancellation ----

#[tokio::test]
async fn cancel_twice_returns_structurally_equal_tasks() {
    let (store, clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();

    let first = store.cancel_task(&task.id).await.unwrap();
    clock.advance(chrono::Duration::seconds(10));
    let second = store.cancel_task(&task.id).await.unwrap();

    assert_eq!(first.status.state, TaskState::Cancelled);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn cancel_preserves_current_status_message() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    let note = Message::agent("status-1", "halfway there");
    store
        .update_status(&task.id, TaskStatus::with_message(TaskState::Working, note))
        .await
        .unwrap();

    let cancelled = store.cancel_task(&task.id).await.unwrap();
    assert_eq!(cancelled.status.state, TaskState::Cancelled);
    assert_eq!(
        cancelled.status.message.unwrap().message_id,
        "status-1"
    );
}

#[tokio::test]
async fn cancel_on_completed_task_returns_it_unchanged() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    let completed = store
        .update_status(&task.id, TaskStatus::new(TaskState::Completed))
        .await
        .unwrap();

    let result = store.cancel_task(&task.id).await.unwrap();
    assert_eq!(result.status.state, TaskState::Completed);
    assert_eq!(result.updated_at, completed.updated_at);
}

// ---- Cloning discipline ----

#[tokio::test]
async fn returned_tasks_are_deep_clones() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();

    let mut stolen = store.get_task(&task.id, 0, true).await.unwrap();
    stolen
        .history
        .get_or_insert_with(Vec::new)
        .push(user_message("mx", "tampered"));
    stolen.status.state = TaskState::Failed;

    let read_back = store.get_task(&task.id, 0, true).await.unwrap();
    assert_eq!(read_back.status.state, TaskState::Submitted);
    assert_eq!(read_back.history.unwrap().len(), 1);
}

#[tokio::test]
async fn artifacts_stripped_unless_requested() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    store
        .add_artifacts(&task.id, vec![text_artifact("a1", "out", "x")])
        .await
        .unwrap();

    let without = store.get_task(&task.id, 0, false).await.unwrap();
    assert!(without.artifacts.is_none());

    let with = store.get_task(&task.id, 0, true).await.unwrap();
    assert_eq!(with.artifacts.unwrap().len(), 1);
}

// ---- Listing & pagination ----

#[tokio::test]
async fn list_pages_are_stable_and_complete() {
    let (store, clock) = store_with_clock();
    let mut ids = Vec::new();
    for i in 1..=7 {
        let task = store
            .create_task(user_message(&format!("m{}", i), "x"))
            .await
            .unwrap();
        ids.push(task.id);
        clock.advance(chrono::Duration::seconds(1));
    }

    let mut filter = TaskFilter {
        page_size: 3,
        ..Default::default()
    };

    let page1 = store.list_tasks(&filter).await.unwrap();
    assert_eq!(page1.total_size, 7);
    assert_eq!(page1.page_size, 3);
    let page1_ids: Vec<&str> = page1.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(page1_ids, [ids[6].as_str(), ids[5].as_str(), ids[4].as_str()]);
    let token1 = page1.next_page_token.expect("more pages");

    filter.page_token = Some(token1);
    let page2 = store.list_tasks(&filter).await.unwrap();
    assert_eq!(page2.total_size, 7);
    let page2_ids: Vec<&str> = page2.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(page2_ids, [ids[3].as_str(), ids[2].as_str(), ids[1].as_str()]);
    let token2 = page2.next_page_token.expect("one more page");

    filter.page_token = Some(token2);
    let page3 = store.list_tasks(&filter).await.unwrap();
    assert_eq!(page3.total_size, 7);
    let page3_ids: Vec<&str> = page3.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(page3_ids, [ids[0].as_str()]);
    assert!(page3.next_page_token.is_none());
}

#[tokio::test]
async fn list_ties_break_by_id_ascending() {
    let (store, _clock) = store_with_clock();
    // Clock never advances, so every task shares one updated_at.
    for i in 0..4 {
        store
            .create_task(user_message(&format!("m{}", i), "x"))
            .await
            .unwrap();
    }

    let page = store.list_tasks(&TaskFilter::default()).await.unwrap();
    let listed: Vec<&str> = page.tasks.iter().map(|t| t.id.as_str()).collect();
    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted);
}

#[tokio::test]
async fn list_filters_by_context_status_and_update_time() {
    let (store, clock) = store_with_clock();

    let mut in_ctx = user_message("m1", "x");
    in_ctx.context_id = Some("ctx-a".to_string());
    let task_a = store.create_task(in_ctx).await.unwrap();

    clock.advance(chrono::Duration::seconds(10));
    let cutoff = clock.now();
    clock.advance(chrono::Duration::seconds(10));

    let mut other_ctx = user_message("m2", "y");
    other_ctx.context_id = Some("ctx-b".to_string());
    let task_b = store.create_task(other_ctx).await.unwrap();
    store
        .update_status(&task_b.id, TaskStatus::new(TaskState::Working))
        .await
        .unwrap();

    let by_context = store
        .list_tasks(&TaskFilter {
            context_id: Some("ctx-a".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_context.tasks.len(), 1);
    assert_eq!(by_context.tasks[0].id, task_a.id);

    let by_status = store
        .list_tasks(&TaskFilter {
            status: Some(TaskState::Working),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_status.tasks.len(), 1);
    assert_eq!(by_status.tasks[0].id, task_b.id);

    let by_time = store
        .list_tasks(&TaskFilter {
            last_updated_after: Some(cutoff),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_time.tasks.len(), 1);
    assert_eq!(by_time.tasks[0].id, task_b.id);
}

#[tokio::test]
async fn list_rejects_unknown_page_tokens() {
    let (store, _clock) = store_with_clock();
    let err = store
        .list_tasks(&TaskFilter {
            page_token: Some("definitely-not-a-token".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.category(), Category::InvalidInput);
}

// ---- Deletion ----

#[tokio::test]
async fn delete_removes_task_and_is_idempotent() {
    let (store, _clock) = store_with_clock();
    let task = store.create_task(user_message("m1", "x")).await.unwrap();

    store.delete_task(&task.id).await.unwrap();
    let err = store.get_task(&task.id, 0, true).await.unwrap_err();
    assert_eq!(err.category(), Category::NotFound);

    store.delete_task(&task.id).await.unwrap();
}
