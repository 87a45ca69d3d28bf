//! JSON round-trip and wire-shape tests for the canonical types.

mod common;

use chrono::{TimeZone, Utc};

use kairos_a2a::types::{
    Artifact, Message, Part, Role, SendMessageResponse, StreamFrame, Task,
    TaskArtifactUpdateEvent, TaskState, TaskStatus,
};

use common::{text_artifact, user_message};

fn sample_task() -> Task {
    let mut message = user_message("m1", "hello");
    message.context_id = Some("c-1".to_string());
    message.task_id = Some("t-1".to_string());
    Task {
        id: "t-1".to_string(),
        context_id: "c-1".to_string(),
        kind: "task".to_string(),
        status: TaskStatus {
            state: TaskState::Working,
            message: Some(Message::agent("s-1", "crunching")),
            timestamp: Some("2025-06-01T12:00:00+00:00".to_string()),
        },
        artifacts: Some(vec![text_artifact("a-1", "out", "x")]),
        history: Some(vec![message]),
        updated_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
        metadata: Some(serde_json::json!({"tenant": "acme"})),
    }
}

#[test]
fn task_round_trip_preserves_all_fields() {
    let task = sample_task();
    let json = serde_json::to_value(&task).unwrap();
    let back: Task = serde_json::from_value(json.clone()).unwrap();
    assert_eq!(json, serde_json::to_value(&back).unwrap());
}

#[test]
fn task_wire_shape_is_camel_case() {
    let json = serde_json::to_value(sample_task()).unwrap();
    assert_eq!(json["contextId"], "c-1");
    assert_eq!(json["kind"], "task");
    assert_eq!(json["status"]["state"], "working");
    assert!(json["updatedAt"].is_string());
    assert_eq!(json["history"][0]["messageId"], "m1");
    assert_eq!(json["artifacts"][0]["artifactId"], "a-1");
}

#[test]
fn task_state_wire_values() {
    let values: Vec<String> = [
        TaskState::Submitted,
        TaskState::Working,
        TaskState::InputRequired,
        TaskState::Completed,
        TaskState::Failed,
        TaskState::Cancelled,
        TaskState::Rejected,
    ]
    .iter()
    .map(|state| serde_json::to_value(state).unwrap().as_str().unwrap().to_string())
    .collect();
    assert_eq!(
        values,
        [
            "submitted",
            "working",
            "input-required",
            "completed",
            "failed",
            "cancelled",
            "rejected"
        ]
    );
}

#[test]
fn message_round_trip_preserves_parts_and_metadata() {
    let mut message = Message::user("m-1", "hello");
    message.parts.push(Part::data(serde_json::json!({"k": 1})));
    message.metadata = Some(serde_json::json!({"caller": "cli"}));

    let json = serde_json::to_value(&message).unwrap();
    assert_eq!(json["parts"][0]["kind"], "text");
    assert_eq!(json["parts"][1]["kind"], "data");

    let back: Message = serde_json::from_value(json).unwrap();
    assert_eq!(back.message_id, "m-1");
    assert_eq!(back.role, Role::User);
    assert_eq!(back.parts.len(), 2);
    assert_eq!(back.metadata_str("caller"), Some("cli"));
}

#[test]
fn artifact_round_trip() {
    let artifact = Artifact {
        artifact_id: "a-1".to_string(),
        name: Some("out".to_string()),
        description: Some("primary output".to_string()),
        parts: vec![Part::text("x"), Part::data(serde_json::json!([1, 2]))],
    };
    let json = serde_json::to_value(&artifact).unwrap();
    let back: Artifact = serde_json::from_value(json.clone()).unwrap();
    assert_eq!(json, serde_json::to_value(&back).unwrap());
}

#[test]
fn stream_frames_discriminate_by_kind() {
    let frames = vec![
        StreamFrame::Task(sample_task()),
        StreamFrame::Message(Message::agent("m-2", "pong")),
        StreamFrame::ArtifactUpdate(TaskArtifactUpdateEvent {
            task_id: "t-1".to_string(),
            context_id: "c-1".to_string(),
            kind: "artifact-update".to_string(),
            artifact: text_artifact("a-1", "out", "x"),
            append: Some(true),
            last_chunk: None,
        }),
    ];

    let kinds: Vec<String> = frames
        .iter()
        .map(|frame| {
            serde_json::to_value(frame).unwrap()["kind"]
                .as_str()
                .unwrap()
                .to_string()
        })
        .collect();
    assert_eq!(kinds, ["task", "message", "artifact-update"]);

    for frame in frames {
        let json = serde_json::to_value(&frame).unwrap();
        let back: StreamFrame = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(json, serde_json::to_value(&back).unwrap());
    }
}

#[test]
fn status_update_serializes_final_flag() {
    let frame = StreamFrame::StatusUpdate(kairos_a2a::types::TaskStatusUpdateEvent {
        task_id: "t-1".to_string(),
        context_id: "c-1".to_string(),
        kind: "status-update".to_string(),
        status: TaskStatus::new(TaskState::Completed),
        r#final: true,
        metadata: None,
    });
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["kind"], "status-update");
    assert_eq!(json["final"], true);
}

#[test]
fn send_message_response_discriminates_by_kind() {
    let task_json = serde_json::to_value(SendMessageResponse::Task(sample_task())).unwrap();
    let back: SendMessageResponse = serde_json::from_value(task_json).unwrap();
    assert!(matches!(back, SendMessageResponse::Task(_)));

    let message_json =
        serde_json::to_value(SendMessageResponse::Message(Message::agent("m", "hi"))).unwrap();
    let back: SendMessageResponse = serde_json::from_value(message_json).unwrap();
    assert!(matches!(back, SendMessageResponse::Message(_)));

    let err = serde_json::from_value::<SendMessageResponse>(serde_json::json!({"kind": "nope"}));
    assert!(err.is_err());
}

#[test]
fn unknown_fields_are_discarded() {
    let json = serde_json::json!({
        "messageId": "m-1",
        "role": "user",
        "kind": "message",
        "parts": [{"kind": "text", "text": "hi"}],
        "somethingNew": {"the": "future"},
    });
    let message: Message = serde_json::from_value(json).unwrap();
    assert_eq!(message.message_id, "m-1");
}
