//! The durable backend honors the same store contract as the in-memory one.

mod common;

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use kairos_a2a::clock::ManualClock;
use kairos_a2a::error::Category;
use kairos_a2a::store::{SqliteTaskStore, TaskFilter, TaskStore};
use kairos_a2a::types::{TaskState, TaskStatus};

use common::{manual_clock, text_artifact, user_message};

async fn memory_store(clock: Arc<ManualClock>) -> SqliteTaskStore {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    // One connection: an in-memory database exists per connection.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    SqliteTaskStore::with_pool(pool, clock).await.unwrap()
}

#[tokio::test]
async fn schema_creation_is_idempotent() {
    let clock = manual_clock();
    let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    let _first = SqliteTaskStore::with_pool(pool.clone(), clock.clone()).await.unwrap();
    let second = SqliteTaskStore::with_pool(pool, clock).await.unwrap();
    second.create_task(user_message("m1", "x")).await.unwrap();
}

#[tokio::test]
async fn create_get_round_trip_preserves_task() {
    let clock = manual_clock();
    let store = memory_store(clock).await;

    let task = store.create_task(user_message("m1", "hello")).await.unwrap();
    let fetched = store.get_task(&task.id, 0, true).await.unwrap();

    assert_eq!(
        serde_json::to_value(&task).unwrap(),
        serde_json::to_value(&fetched).unwrap()
    );
    assert_eq!(fetched.status.state, TaskState::Submitted);
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let store = memory_store(manual_clock()).await;
    let err = store.get_task("nope", 0, true).await.unwrap_err();
    assert_eq!(err.category(), Category::NotFound);
}

#[tokio::test]
async fn lifecycle_writes_survive_reload() {
    let clock = manual_clock();
    let store = memory_store(clock.clone()).await;

    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    store.append_history(&task.id, user_message("m2", "more")).await.unwrap();
    store
        .add_artifacts(&task.id, vec![text_artifact("a1", "out", "x")])
        .await
        .unwrap();
    clock.advance(chrono::Duration::seconds(1));
    store
        .update_status(&task.id, TaskStatus::new(TaskState::Working))
        .await
        .unwrap();

    let fetched = store.get_task(&task.id, 0, true).await.unwrap();
    assert_eq!(fetched.status.state, TaskState::Working);
    assert_eq!(fetched.history.unwrap().len(), 2);
    assert_eq!(fetched.artifacts.unwrap().len(), 1);
    assert!(fetched.updated_at > task.updated_at);
}

#[tokio::test]
async fn terminal_tasks_reject_writes() {
    let store = memory_store(manual_clock()).await;
    let task = store.create_task(user_message("m1", "go")).await.unwrap();
    store
        .update_status(&task.id, TaskStatus::new(TaskState::Failed))
        .await
        .unwrap();

    let err = store
        .append_history(&task.id, user_message("m2", "late"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), Category::FailedPrecondition);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let clock = manual_clock();
    let store = memory_store(clock.clone()).await;
    let task = store.create_task(user_message("m1", "go")).await.unwrap();

    let first = store.cancel_task(&task.id).await.unwrap();
    clock.advance(chrono::Duration::seconds(5));
    let second = store.cancel_task(&task.id).await.unwrap();

    assert_eq!(first.status.state, TaskState::Cancelled);
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[tokio::test]
async fn pagination_matches_declared_order() {
    let clock = manual_clock();
    let store = memory_store(clock.clone()).await;

    let mut ids = Vec::new();
    for i in 1..=5 {
        let task = store
            .create_task(user_message(&format!("m{}", i), "x"))
            .await
            .unwrap();
        ids.push(task.id);
        clock.advance(chrono::Duration::seconds(1));
    }

    let mut filter = TaskFilter {
        page_size: 2,
        ..Default::default()
    };

    let page1 = store.list_tasks(&filter).await.unwrap();
    assert_eq!(page1.total_size, 5);
    let listed: Vec<&str> = page1.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(listed, [ids[4].as_str(), ids[3].as_str()]);

    filter.page_token = page1.next_page_token;
    let page2 = store.list_tasks(&filter).await.unwrap();
    let listed: Vec<&str> = page2.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(listed, [ids[2].as_str(), ids[1].as_str()]);

    filter.page_token = page2.next_page_token;
    let page3 = store.list_tasks(&filter).await.unwrap();
    let listed: Vec<&str> = page3.tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(listed, [ids[0].as_str()]);
    assert!(page3.next_page_token.is_none());
}

#[tokio::test]
async fn filters_translate_to_sql() {
    let clock = manual_clock();
    let store = memory_store(clock.clone()).await;

    let mut message = user_message("m1", "x");
    message.context_id = Some("ctx-a".to_string());
    let task_a = store.create_task(message).await.unwrap();

    clock.advance(chrono::Duration::seconds(2));
    let task_b = store.create_task(user_message("m2", "y")).await.unwrap();
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
}

#[tokio::test]
async fn delete_removes_row() {
    let store = memory_store(manual_clock()).await;
    let task = store.create_task(user_message("m1", "x")).await.unwrap();

    store.delete_task(&task.id).await.unwrap();
    let err = store.get_task(&task.id, 0, true).await.unwrap_err();
    assert_eq!(err.category(), Category::NotFound);
}
