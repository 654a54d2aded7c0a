//! Integration tests for the timer orchestrator backed by SQLite.
//!
//! Drives whole sessions through the public API with a manual clock and
//! checks what ends up in the database and statistics.

use std::rc::Rc;

use focusflow_core::testing::{FakePlatform, ManualClock};
use focusflow_core::{
    Database, DurationPlan, Event, PromptChoice, PromptKind, SegmentType, TimerOrchestrator,
    TimerStatus,
};

type Orchestrator = TimerOrchestrator<Database, FakePlatform, Rc<ManualClock>>;

fn setup() -> (Orchestrator, Rc<ManualClock>, i64) {
    let db = Database::open_memory().unwrap();
    let activity = db.add_activity("Writing").unwrap();
    let clock = Rc::new(ManualClock::default());
    let orch = TimerOrchestrator::with_clock(db, FakePlatform::default(), clock.clone());
    (orch, clock, activity.id)
}

fn run_for(orch: &mut Orchestrator, clock: &ManualClock, secs: u64) {
    for _ in 0..secs {
        clock.advance_secs(1);
        orch.tick().unwrap();
    }
}

#[test]
fn test_complete_session_is_recorded() {
    let (mut orch, clock, activity) = setup();
    let plan = DurationPlan::from_minutes("short", &[2, 1, 2]).unwrap();
    orch.start(activity, &plan).unwrap();
    let session_id = orch.session_id().unwrap().to_string();

    // Focus 2m
    run_for(&mut orch, &clock, 120);
    assert_eq!(orch.status(), TimerStatus::Done);
    assert_eq!(orch.pending_prompt().unwrap().kind, PromptKind::SegmentComplete);
    orch.respond(PromptChoice::Confirm).unwrap();

    // Break 1m
    run_for(&mut orch, &clock, 60);
    orch.respond(PromptChoice::Confirm).unwrap();

    // Final focus 2m
    run_for(&mut orch, &clock, 120);
    assert_eq!(orch.pending_prompt().unwrap().kind, PromptKind::SessionComplete);
    orch.respond(PromptChoice::Confirm).unwrap();
    assert_eq!(orch.status(), TimerStatus::Off);

    let db = orch.store();
    let session = db.get_session(&session_id).unwrap().unwrap();
    assert!(!session.is_ongoing);
    assert_eq!(session.total_secs(SegmentType::Focus), 240);
    assert_eq!(session.total_secs(SegmentType::Break), 60);
    assert_eq!(session.segments.len(), 3);

    let activity = db.get_activity(activity).unwrap().unwrap();
    assert_eq!(activity.session_count, 1);
    assert_eq!(activity.total_secs, 240);

    let stats = db.stats_all().unwrap();
    assert_eq!(stats.sessions, 1);
    assert_eq!(stats.completed_sessions, 1);
    assert_eq!(stats.focus_secs, 240);
}

#[test]
fn test_pause_time_is_recorded_separately() {
    let (mut orch, clock, activity) = setup();
    orch.start(activity, &DurationPlan::from_minutes("one", &[5]).unwrap())
        .unwrap();
    run_for(&mut orch, &clock, 60);
    orch.pause().unwrap();
    run_for(&mut orch, &clock, 120);
    orch.resume().unwrap();
    run_for(&mut orch, &clock, 60);

    let session_id = orch.session_id().unwrap().to_string();
    let session = orch.store().get_session(&session_id).unwrap().unwrap();
    let kinds: Vec<_> = session
        .segments
        .iter()
        .map(|s| (s.segment_type, s.duration_secs))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (SegmentType::Focus, 60),
            (SegmentType::Pause, 120),
            (SegmentType::Focus, 60)
        ]
    );
    assert_eq!(
        orch.state().unwrap().active_segment().unwrap().elapsed_duration,
        120
    );
}

#[test]
fn test_stopped_session_ends_early() {
    let (mut orch, clock, activity) = setup();
    orch.start(activity, &DurationPlan::from_minutes("classic", &[25, 5, 25]).unwrap())
        .unwrap();
    run_for(&mut orch, &clock, 300);
    let session_id = orch.session_id().unwrap().to_string();

    orch.stop().unwrap();
    orch.respond(PromptChoice::Confirm).unwrap();
    assert_eq!(orch.status(), TimerStatus::Off);

    let events = orch.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::SessionEnded {
            completed: false,
            active_secs: 300,
            ..
        }
    )));

    let session = orch.store().get_session(&session_id).unwrap().unwrap();
    assert!(!session.is_ongoing);
    assert_eq!(session.total_secs(SegmentType::Focus), 300);
}

#[test]
fn test_deleted_activity_does_not_stop_the_timer() {
    let (mut orch, clock, activity) = setup();
    orch.start(activity, &DurationPlan::from_minutes("one", &[5]).unwrap())
        .unwrap();
    orch.store().remove_activity(activity).unwrap();

    run_for(&mut orch, &clock, 120);
    assert_eq!(orch.status(), TimerStatus::Running);
    let session_id = orch.session_id().unwrap().to_string();
    let session = orch.store().get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.total_secs(SegmentType::Focus), 120);
}

#[test]
fn test_suspended_process_catches_up_on_next_tick() {
    let (mut orch, clock, activity) = setup();
    orch.start(activity, &DurationPlan::from_minutes("classic", &[25, 5, 25]).unwrap())
        .unwrap();
    run_for(&mut orch, &clock, 10);

    orch.enter_background().unwrap();
    assert_eq!(orch.platform().scheduled.len(), 1);

    // Suspended past the end of the focus segment.
    clock.advance_secs(1600);
    orch.enter_foreground().unwrap();
    orch.tick().unwrap();

    assert_eq!(orch.platform().live_notifications(), 0);
    assert_eq!(orch.status(), TimerStatus::Done);
    let active = orch.state().unwrap().active_segment().unwrap();
    assert_eq!(active.elapsed_duration, 1610);

    let session_id = orch.session_id().unwrap().to_string();
    let session = orch.store().get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.total_secs(SegmentType::Focus), 1560);
}

#[test]
fn test_custom_persist_interval() {
    let db = Database::open_memory().unwrap();
    let activity = db.add_activity("Writing").unwrap();
    let clock = Rc::new(ManualClock::default());
    let mut orch = TimerOrchestrator::with_clock(db, FakePlatform::default(), clock.clone())
        .with_persist_interval(10);
    orch.start(activity.id, &DurationPlan::from_minutes("one", &[5]).unwrap())
        .unwrap();
    run_for(&mut orch, &clock, 35);

    let session_id = orch.session_id().unwrap().to_string();
    let session = orch.store().get_session(&session_id).unwrap().unwrap();
    assert_eq!(session.total_secs(SegmentType::Focus), 30);
}
