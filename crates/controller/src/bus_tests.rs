// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use drover_core::{OutputStream, Task};

fn output(task: &str, index: usize, content: &str) -> Event {
    Event::TaskOutput {
        task_id: TaskId::new(task),
        command_index: index,
        stream: OutputStream::Stdout,
        content: content.to_string(),
    }
}

fn updated(task: &Task) -> Event {
    Event::TaskUpdated { task: Box::new(task.clone()) }
}

#[tokio::test]
async fn events_arrive_in_publish_order() {
    let bus = Arc::new(EventBus::new());
    let mut stream = bus.subscribe();

    bus.publish(Event::AgentDisconnected { agent_id: "a".into() });
    bus.publish(Event::AgentDisconnected { agent_id: "b".into() });

    match stream.recv().await {
        Some(Event::AgentDisconnected { agent_id }) => assert_eq!(agent_id, "a"),
        other => panic!("unexpected {other:?}"),
    }
    match stream.recv().await {
        Some(Event::AgentDisconnected { agent_id }) => assert_eq!(agent_id, "b"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn subscribers_only_see_events_after_subscribe() {
    let bus = Arc::new(EventBus::new());
    bus.publish(Event::AgentDisconnected { agent_id: "early".into() });

    let mut stream = bus.subscribe();
    bus.publish(Event::AgentDisconnected { agent_id: "late".into() });

    match stream.recv().await {
        Some(Event::AgentDisconnected { agent_id }) => assert_eq!(agent_id, "late"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn dropping_a_stream_unsubscribes() {
    let bus = Arc::new(EventBus::new());
    let stream = bus.subscribe();
    assert_eq!(bus.subscriber_count(), 1);
    drop(stream);
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn newer_task_version_supersedes_queued_older() {
    let bus = Arc::new(EventBus::new());
    let mut stream = bus.subscribe();

    let mut task = Task::new("x", 0);
    bus.publish(updated(&task));
    task.version = 5;
    bus.publish(updated(&task));

    match stream.try_recv() {
        Some(Event::TaskUpdated { task }) => assert_eq!(task.version, 5),
        other => panic!("unexpected {other:?}"),
    }
    assert!(stream.try_recv().is_none(), "older version must be coalesced away");
}

#[test]
fn older_task_version_never_replaces_newer() {
    let bus = Arc::new(EventBus::new());
    let mut stream = bus.subscribe();

    let mut task = Task::new("x", 0);
    task.version = 7;
    bus.publish(updated(&task));
    task.version = 3;
    bus.publish(updated(&task));

    match stream.try_recv() {
        Some(Event::TaskUpdated { task }) => assert_eq!(task.version, 7),
        other => panic!("unexpected {other:?}"),
    }
    assert!(stream.try_recv().is_none());
}

#[test]
fn distinct_tasks_keep_distinct_updates() {
    let bus = Arc::new(EventBus::new());
    let mut stream = bus.subscribe();

    bus.publish(updated(&Task::new("a", 0)));
    bus.publish(updated(&Task::new("b", 0)));

    assert!(matches!(stream.try_recv(), Some(Event::TaskUpdated { .. })));
    assert!(matches!(stream.try_recv(), Some(Event::TaskUpdated { .. })));
}

#[test]
fn full_queue_drops_oldest_output_and_leaves_sentinel() {
    let bus = Arc::new(EventBus::with_capacity(2));
    let mut stream = bus.subscribe();

    // Distinct (task, command) pairs so batching cannot merge them.
    bus.publish(output("t", 0, "one"));
    bus.publish(output("t", 1, "two"));
    bus.publish(output("t", 2, "three"));
    bus.publish(output("t", 3, "four"));

    match stream.try_recv() {
        Some(Event::TaskOutputTruncated { task_id, dropped }) => {
            assert_eq!(task_id, TaskId::new("t"));
            assert_eq!(dropped, 2, "sentinel coalesces repeated drops");
        }
        other => panic!("expected truncation sentinel, got {other:?}"),
    }
    match stream.try_recv() {
        Some(Event::TaskOutput { content, .. }) => assert_eq!(content, "three"),
        other => panic!("unexpected {other:?}"),
    }
    match stream.try_recv() {
        Some(Event::TaskOutput { content, .. }) => assert_eq!(content, "four"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn task_updated_survives_a_full_queue() {
    let bus = Arc::new(EventBus::with_capacity(1));
    let mut stream = bus.subscribe();

    bus.publish(output("t", 0, "chunk"));
    bus.publish(updated(&Task::new("u", 0)));

    // Both present: the update is never dropped.
    assert!(matches!(stream.try_recv(), Some(Event::TaskOutput { .. })));
    assert!(matches!(stream.try_recv(), Some(Event::TaskUpdated { .. })));
}

#[test]
fn consecutive_chunks_for_same_stream_are_merged() {
    let bus = Arc::new(EventBus::new());
    let mut stream = bus.subscribe();

    bus.publish(output("t", 0, "hello "));
    bus.publish(output("t", 0, "world"));

    match stream.try_recv() {
        Some(Event::TaskOutput { content, .. }) => assert_eq!(content, "hello world"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(stream.try_recv().is_none());
}

#[test]
fn chunks_for_different_commands_are_not_merged() {
    let bus = Arc::new(EventBus::new());
    let mut stream = bus.subscribe();

    bus.publish(output("t", 0, "a"));
    bus.publish(output("t", 1, "b"));

    assert!(matches!(stream.try_recv(), Some(Event::TaskOutput { command_index: 0, .. })));
    assert!(matches!(stream.try_recv(), Some(Event::TaskOutput { command_index: 1, .. })));
}

#[test]
fn stderr_and_stdout_chunks_stay_separate() {
    let bus = Arc::new(EventBus::new());
    let mut stream = bus.subscribe();

    bus.publish(output("t", 0, "out"));
    bus.publish(Event::TaskOutput {
        task_id: TaskId::new("t"),
        command_index: 0,
        stream: OutputStream::Stderr,
        content: "err".to_string(),
    });

    assert!(
        matches!(stream.try_recv(), Some(Event::TaskOutput { stream: OutputStream::Stdout, .. }))
    );
    assert!(
        matches!(stream.try_recv(), Some(Event::TaskOutput { stream: OutputStream::Stderr, .. }))
    );
}

#[tokio::test]
async fn every_subscriber_gets_every_event() {
    let bus = Arc::new(EventBus::new());
    let mut one = bus.subscribe();
    let mut two = bus.subscribe();

    bus.publish(Event::AgentDisconnected { agent_id: "a".into() });

    assert!(matches!(one.recv().await, Some(Event::AgentDisconnected { .. })));
    assert!(matches!(two.recv().await, Some(Event::AgentDisconnected { .. })));
}
