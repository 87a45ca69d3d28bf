//! Human-in-the-loop approval tests: pending → approve, pending → expire,
//! reject, idempotency, and the background sweeper.

mod common;

use kairos_a2a::clock::Clock;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use kairos_a2a::approval::{
    ApprovalExpirer, ApprovalFilter, ApprovalStore, ExpirerConfig, InMemoryApprovalStore,
};
use kairos_a2a::clock::ManualClock;
use kairos_a2a::error::Category;
use kairos_a2a::handler::Handler;
use kairos_a2a::store::{InMemoryTaskStore, TaskStore};
use kairos_a2a::types::{
    ApprovalStatus, SendMessageResponse, Task, TaskState, METADATA_APPROVAL_EXPIRES_AT,
    METADATA_APPROVAL_ID,
};

use common::{manual_clock, send_params, token, user_message, EchoExecutor, StaticPolicy};

struct Fixture {
    handler: Handler,
    store: Arc<InMemoryTaskStore>,
    approvals: Arc<InMemoryApprovalStore>,
    executor: Arc<EchoExecutor>,
    clock: Arc<ManualClock>,
}

fn fixture(timeout: chrono::Duration) -> Fixture {
    let clock = manual_clock();
    let store = Arc::new(InMemoryTaskStore::with_clock(clock.clone()));
    let approvals = Arc::new(InMemoryApprovalStore::with_clock(clock.clone()));
    let executor = Arc::new(EchoExecutor::replying("pong"));
    let handler = Handler::builder(store.clone(), executor.clone())
        .policy(Arc::new(StaticPolicy::pending("requires approval")))
        .approval_store(approvals.clone())
        .approval_timeout(timeout)
        .clock(clock.clone())
        .build();
    Fixture {
        handler,
        store,
        approvals,
        executor,
        clock,
    }
}

/// Send a message through the pending-policy fixture, returning the parked
/// task and its approval id.
async fn park(fixture: &Fixture, message_id: &str) -> (Task, String) {
    let response = fixture
        .handler
        .send_message(send_params(user_message(message_id, "act")), token())
        .await
        .unwrap();
    let SendMessageResponse::Task(task) = response else {
        panic!("pending policy must return the task");
    };
    let status_message = task.status.message.as_ref().unwrap();
    let approval_id = status_message
        .metadata_str(METADATA_APPROVAL_ID)
        .expect("approval_id metadata")
        .to_string();
    (task, approval_id)
}

// ---- Pending → approve ----

#[tokio::test]
async fn pending_send_parks_task_with_approval_metadata() {
    let fixture = fixture(chrono::Duration::seconds(300));
    let (task, approval_id) = park(&fixture, "m2").await;

    assert_eq!(task.status.state, TaskState::InputRequired);
    assert_eq!(fixture.executor.calls(), 0);

    let status_message = task.status.message.as_ref().unwrap();
    assert_eq!(status_message.text_content(), "requires approval");

    // approval_expires_at is RFC3339, five minutes out.
    let expires_at: DateTime<Utc> = status_message
        .metadata_str(METADATA_APPROVAL_EXPIRES_AT)
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(expires_at, fixture.clock.now() + chrono::Duration::seconds(300));

    let record = fixture.approvals.get(&approval_id).await.unwrap();
    assert_eq!(record.status, ApprovalStatus::Pending);
    assert_eq!(record.task_id, task.id);
    assert_eq!(record.message.message_id, "m2");
}

#[tokio::test]
async fn approve_executes_captured_message_once() {
    let fixture = fixture(chrono::Duration::seconds(300));
    let (parked, approval_id) = park(&fixture, "m2").await;

    let task = fixture
        .handler
        .approve(&approval_id, "ok", token())
        .await
        .unwrap();

    assert_eq!(task.status.state, TaskState::Completed);
    assert_eq!(fixture.executor.calls(), 1);

    // History: original message, pending status message, agent response.
    let stored = fixture.store.get_task(&parked.id, 0, true).await.unwrap();
    let history = stored.history.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].message_id, "m2");
    assert!(history[1].metadata_str(METADATA_APPROVAL_ID).is_some());
    assert_eq!(history[2].text_content(), "pong");

    // A second approve is idempotent: no second execution.
    let again = fixture
        .handler
        .approve(&approval_id, "ok again", token())
        .await
        .unwrap();
    assert_eq!(again.status.state, TaskState::Completed);
    assert_eq!(fixture.executor.calls(), 1);
}

// ---- Pending → reject ----

#[tokio::test]
async fn reject_transitions_task_with_approval_metadata() {
    let fixture = fixture(chrono::Duration::seconds(300));
    let (parked, approval_id) = park(&fixture, "m2").await;

    let task = fixture
        .handler
        .reject(&approval_id, "not today", token())
        .await
        .unwrap();

    assert_eq!(task.status.state, TaskState::Rejected);
    assert_eq!(fixture.executor.calls(), 0);

    let status_message = task.status.message.as_ref().unwrap();
    assert_eq!(status_message.text_content(), "not today");
    assert_eq!(
        status_message.metadata_str(METADATA_APPROVAL_ID),
        Some(approval_id.as_str())
    );

    let record = fixture.approvals.get(&approval_id).await.unwrap();
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(record.reason, "not today");

    let stored = fixture.store.get_task(&parked.id, 0, true).await.unwrap();
    assert_eq!(stored.status.state, TaskState::Rejected);
}

// ---- Pending → expire ----

#[tokio::test]
async fn retroactive_timeout_expires_immediately() {
    // A negative timeout dates the expiry in the past.
    let fixture = fixture(chrono::Duration::seconds(-1));
    let (parked, approval_id) = park(&fixture, "m2").await;

    let expired = fixture.handler.expire_approvals(token()).await.unwrap();
    assert_eq!(expired, 1);

    let task = fixture.store.get_task(&parked.id, 0, true).await.unwrap();
    assert_eq!(task.status.state, TaskState::Rejected);
    assert_eq!(
        task.status.message.as_ref().unwrap().text_content(),
        "approval expired"
    );

    let record = fixture.approvals.get(&approval_id).await.unwrap();
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(record.reason, "approval expired");

    // Approving after expiry does not run the executor.
    let task = fixture
        .handler
        .approve(&approval_id, "too late", token())
        .await
        .unwrap();
    assert_eq!(task.status.state, TaskState::Rejected);
    assert_eq!(fixture.executor.calls(), 0);

    // Nothing left to expire.
    assert_eq!(fixture.handler.expire_approvals(token()).await.unwrap(), 0);
}

#[tokio::test]
async fn expiry_honored_on_approve_before_sweeper_runs() {
    let fixture = fixture(chrono::Duration::seconds(60));
    let (parked, approval_id) = park(&fixture, "m2").await;

    fixture.clock.advance(chrono::Duration::seconds(120));

    let task = fixture
        .handler
        .approve(&approval_id, "late", token())
        .await
        .unwrap();
    assert_eq!(task.status.state, TaskState::Rejected);
    assert_eq!(fixture.executor.calls(), 0);

    let stored = fixture.store.get_task(&parked.id, 0, false).await.unwrap();
    assert_eq!(stored.status.state, TaskState::Rejected);
}

#[tokio::test]
async fn get_approval_surfaces_expiry_on_read() {
    let fixture = fixture(chrono::Duration::seconds(60));
    let (_parked, approval_id) = park(&fixture, "m2").await;

    fixture.clock.advance(chrono::Duration::seconds(120));

    // The sweeper has not run; the read still reports the effective state.
    let record = fixture
        .handler
        .get_approval(&approval_id, token())
        .await
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(record.reason, "approval expired");

    // The stored record is untouched until the sweeper persists it.
    let raw = fixture.approvals.get(&approval_id).await.unwrap();
    assert_eq!(raw.status, ApprovalStatus::Pending);
}

#[tokio::test]
async fn zero_timeout_disables_expiry() {
    let fixture = fixture(chrono::Duration::zero());
    let (parked, approval_id) = park(&fixture, "m2").await;

    let record = fixture.approvals.get(&approval_id).await.unwrap();
    assert!(record.expires_at.is_none());
    // The parked status message carries the approval id but no expiry.
    let status_message = parked.status.message.as_ref().unwrap();
    assert!(status_message.metadata_str(METADATA_APPROVAL_ID).is_some());
    assert!(status_message
        .metadata_str(METADATA_APPROVAL_EXPIRES_AT)
        .is_none());

    fixture.clock.advance(chrono::Duration::days(365));
    assert_eq!(fixture.handler.expire_approvals(token()).await.unwrap(), 0);
}

// ---- Store filters ----

#[tokio::test]
async fn expiring_before_selects_only_dated_pending_records() {
    let fixture = fixture(chrono::Duration::seconds(60));
    let (_task_a, approval_a) = park(&fixture, "m-a").await;

    // A second pending record with no expiry must never be selected.
    fixture
        .approvals
        .create(kairos_a2a::types::ApprovalRecord {
            id: "no-expiry".to_string(),
            task_id: "t-x".to_string(),
            context_id: "c-x".to_string(),
            status: ApprovalStatus::Pending,
            reason: "requires approval".to_string(),
            created_at: fixture.clock.now(),
            updated_at: fixture.clock.now(),
            expires_at: None,
            message: user_message("m-x", "act"),
        })
        .await
        .unwrap();

    fixture.clock.advance(chrono::Duration::seconds(120));
    let due = fixture
        .approvals
        .list(&ApprovalFilter {
            status: Some(ApprovalStatus::Pending),
            expiring_before: Some(fixture.clock.now()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, approval_a);
}

// ---- Sweeper loop ----

#[tokio::test]
async fn expirer_sweeps_in_the_background() {
    let fixture = fixture(chrono::Duration::seconds(-1));
    let (parked, _approval_id) = park(&fixture, "m2").await;

    let expirer = ApprovalExpirer::new(
        fixture.handler.clone(),
        ExpirerConfig {
            interval: Duration::from_millis(20),
            sweep_timeout: Duration::from_secs(1),
        },
    );
    let handle = expirer.spawn();
    let stats = handle.stats();

    // Give the loop a few ticks.
    for _ in 0..50 {
        if stats.expired() >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(stats.sweeps() >= 1);
    assert_eq!(stats.expired(), 1);
    assert_eq!(stats.errors(), 0);

    let task = fixture.store.get_task(&parked.id, 0, false).await.unwrap();
    assert_eq!(task.status.state, TaskState::Rejected);

    handle.shutdown().await;
}

// ---- Missing collaborator ----

#[tokio::test]
async fn approval_surface_requires_a_store() {
    let clock = manual_clock();
    let store = Arc::new(InMemoryTaskStore::with_clock(clock.clone()));
    let handler = Handler::builder(store, Arc::new(EchoExecutor::replying("pong")))
        .clock(clock)
        .build();

    let err = handler.approve("a-1", "ok", token()).await.unwrap_err();
    assert_eq!(err.category(), Category::Unimplemented);

    let err = handler
        .list_approvals(ApprovalFilter::default(), token())
        .await
        .unwrap_err();
    assert_eq!(err.category(), Category::Unimplemented);

    // No store configured: the sweep is a no-op, not an error.
    assert_eq!(handler.expire_approvals(token()).await.unwrap(), 0);
}
