// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
use super::*;
use interlat::{
    ClockHandle, FakeClock, Interaction, InteractionClient, InteractionEvent, Looper,
    NoopTraceSink, SimulatedFrameScheduler,
};
use rstest::rstest;
use std::rc::Rc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug)]
struct Search;
impl Interaction for Search {}

#[derive(Debug)]
enum Query {
    Typed(u32),
    Results,
    Cleared,
}
impl InteractionEvent for Query {}

/// A client on a fake clock at 1000ms recording into `log`
struct Session {
    clock: FakeClock,
    looper: Looper,
    frames: Rc<SimulatedFrameScheduler>,
    client: InteractionClient,
}

impl Session {
    fn new(log: &UpdateLog) -> Self {
        let clock = FakeClock::at_millis(1000);
        let looper = Looper::new(ClockHandle::from(clock.clone()));
        let frames = SimulatedFrameScheduler::manual(looper.clone());
        let client = InteractionClient::builder(looper.clone(), frames.clone())
            .trace_sink(Rc::new(NoopTraceSink))
            .listener(log.clone())
            .build()
            .unwrap();
        client.add_interaction_rule(|rule| {
            rule.name("search").on_event::<Query>(|scope, event| match event {
                Query::Typed(_) => match scope.running_interactions().first() {
                    Some(running) => {
                        scope.record_event(running);
                    }
                    None => {
                        scope.start_interaction(Search);
                    }
                },
                Query::Results => {
                    for running in scope.running_interactions() {
                        scope.finish(&running);
                    }
                }
                Query::Cleared => {
                    scope.cancel_running_interactions("cleared");
                }
            });
        });
        Self {
            clock,
            looper,
            frames,
            client,
        }
    }

    fn render(&self) {
        self.frames.render_frame();
        self.looper.run_pending();
    }
}

fn kinds(updates: &[CapturedUpdate]) -> Vec<UpdateKind> {
    updates.iter().map(|u| u.kind).collect()
}

#[test]
fn test_records_lifecycle_in_order() {
    let log = UpdateLog::new();
    let session = Session::new(&log);

    session.client.send_event(Query::Typed(1));
    session.clock.advance_ms(30);
    session.client.send_event(Query::Typed(2));
    session.clock.advance_ms(20);
    session.client.send_event(Query::Results);
    session.clock.advance_ms(16);
    session.render();

    let updates = log.updates();
    assert_eq!(
        kinds(&updates),
        vec![
            UpdateKind::Start,
            UpdateKind::RecordEvent,
            UpdateKind::Finish,
            UpdateKind::Rendered
        ]
    );
    assert_eq!(
        updates.iter().map(|u| u.seq).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    let rendered = &updates[3];
    assert_eq!(rendered.interaction, "Search");
    assert_eq!(rendered.frame_uptime, Some(Duration::from_millis(1066)));
    assert_eq!(rendered.display_duration, Some(Duration::from_millis(66)));
    assert_eq!(rendered.events_recorded, 2);
    assert_eq!(rendered.event, None);
    assert_eq!(updates[1].event.as_deref(), Some("Typed(2)"));
    assert_eq!(updates[1].event_uptime, Some(Duration::from_millis(1030)));
}

#[test]
fn test_cancel_reason_is_captured() {
    let log = UpdateLog::new();
    let session = Session::new(&log);

    session.client.send_event(Query::Typed(1));
    session.client.send_event(Query::Cleared);

    let canceled = log.canceled();
    assert_eq!(canceled.len(), 1);
    assert_eq!(canceled[0].kind, UpdateKind::CancelOnEvent);
    assert_eq!(canceled[0].reason.as_deref(), Some("cleared"));
    assert!(log.rendered().is_empty());
}

#[test]
fn test_timeout_is_captured() {
    let log = UpdateLog::new();
    let session = Session::new(&log);

    session.client.send_event(Query::Typed(1));
    session.looper.advance_by(Duration::from_secs(60));

    let last = log.last(1);
    assert_eq!(last[0].kind, UpdateKind::CancelOnTimeout);
    assert_eq!(last[0].timeout, Some(Duration::from_secs(60)));
}

#[test]
fn test_for_interaction_filters_by_id() {
    let log = UpdateLog::new();
    let session = Session::new(&log);

    session.client.send_event(Query::Typed(1));
    session.client.send_event(Query::Cleared);
    session.client.send_event(Query::Typed(2));

    let first = log.updates()[0].interaction_id;
    let second = log.updates()[2].interaction_id;
    assert_ne!(first, second);
    assert_eq!(
        kinds(&log.for_interaction(first)),
        vec![UpdateKind::Start, UpdateKind::CancelOnEvent]
    );
    assert_eq!(kinds(&log.for_interaction(second)), vec![UpdateKind::Start]);
}

#[rstest]
#[case(1, 1)]
#[case(4, 2)]
#[case(3, 10)]
fn test_last_n(#[case] typed: u32, #[case] n: usize) {
    let log = UpdateLog::new();
    let session = Session::new(&log);
    for i in 0..typed {
        session.client.send_event(Query::Typed(i));
    }

    let last = log.last(n);
    assert_eq!(last.len(), n.min(typed as usize));
    let seqs: Vec<u64> = last.iter().map(|u| u.seq).collect();
    let start = (typed as usize).saturating_sub(n) as u64;
    assert_eq!(seqs, (start..u64::from(typed)).collect::<Vec<_>>());
}

#[test]
fn test_count_and_clear() {
    let log = UpdateLog::new();
    let session = Session::new(&log);
    session.client.send_event(Query::Typed(1));
    session.client.send_event(Query::Typed(2));
    session.client.send_event(Query::Typed(3));

    assert_eq!(log.count(|u| u.kind == UpdateKind::RecordEvent), 2);
    assert_eq!(log.len(), 3);

    log.clear();
    assert!(log.is_empty());
    assert!(log.usage_errors().is_empty());
}

#[test]
fn test_parse_jsonl_numbers_lines_from_one() {
    let err = parse_jsonl("{}").unwrap_err();
    assert!(matches!(err, CaptureError::Line { line: 1, .. }));
    assert!(parse_jsonl("").unwrap().is_empty());
}

#[test]
fn test_usage_errors_are_kept_apart() {
    let log = UpdateLog::new();
    let session = Session::new(&log);
    session.client.add_interaction_rule(|rule| {
        rule.on_event::<Query>(|scope, _| {
            scope.running_interaction("nothing-here");
        });
    });

    session.client.send_event(Query::Results);

    assert!(log.is_empty());
    assert_eq!(
        log.usage_errors(),
        vec![interlat::UsageError::MissingKey {
            key: "nothing-here".to_string()
        }]
    );
}

#[test]
fn test_clones_share_the_log() {
    let log = UpdateLog::default();
    let session = Session::new(&log.clone());
    session.client.send_event(Query::Typed(1));
    assert_eq!(log.len(), 1);
}

#[test]
fn test_jsonl_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.jsonl");
    let log = UpdateLog::with_file(&path).unwrap();
    let session = Session::new(&log);

    session.client.send_event(Query::Typed(1));
    session.client.send_event(Query::Results);
    session.clock.advance_ms(16);
    session.render();

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 3);

    let read = read_jsonl(&path).unwrap();
    let recorded = log.updates();
    assert_eq!(read.len(), recorded.len());
    for (read, recorded) in read.iter().zip(&recorded) {
        assert_eq!(read.seq, recorded.seq);
        assert_eq!(read.kind, recorded.kind);
        assert_eq!(read.interaction_id, recorded.interaction_id);
        assert_eq!(read.event, recorded.event);
        assert_eq!(read.frame_uptime, recorded.frame_uptime);
        assert_eq!(read.display_duration, recorded.display_duration);
    }
}

#[test]
fn test_read_jsonl_skips_blank_lines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.jsonl");
    std::fs::write(
        &path,
        "\n{\"seq\":0,\"elapsed\":0,\"kind\":\"start\",\"interaction_id\":1,\"interaction\":\"Search\"}\n\n",
    )
    .unwrap();

    let read = read_jsonl(&path).unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].kind, UpdateKind::Start);
}

#[test]
fn test_read_jsonl_reports_bad_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("capture.jsonl");
    std::fs::write(
        &path,
        "{\"seq\":0,\"elapsed\":0,\"kind\":\"start\",\"interaction_id\":1,\"interaction\":\"Search\"}\nnot json\n",
    )
    .unwrap();

    let err = read_jsonl(&path).unwrap_err();
    assert!(matches!(err, CaptureError::Line { line: 2, .. }));
}

#[test]
fn test_read_jsonl_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = read_jsonl(&dir.path().join("absent.jsonl")).unwrap_err();
    assert!(matches!(err, CaptureError::Io(_)));
}

#[test]
fn test_with_file_in_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let result = UpdateLog::with_file(&dir.path().join("no/such/dir/capture.jsonl"));
    assert!(matches!(result, Err(CaptureError::Io(_))));
}
