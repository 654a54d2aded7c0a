//! Session timer state machine.
//!
//! [`reduce`] is a pure transition function over `Option<TimerState>`;
//! `None` means no session is active. It never reads the wall clock: every
//! "now" arrives inside an action.
//!
//! Segments live in a stack. The active segment is always the last element
//! of `remaining`, so completing it is a single pop/push.
//!
//! ```text
//! None --Start--> Some(running) <--Pause/Resume--> Some(paused)
//! Some(_) --Increment/CompleteSegment/Resync--> Some(_)
//! Some(_) | None --Stop--> None
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::plan::{DurationPlan, SegmentType};
use crate::error::TimerError;

pub const STOP_PROMPT_TITLE: &str = "End session?";
pub const STOP_PROMPT_DESCRIPTION: &str =
    "This session is unfinished. Stopping now ends it early and cannot be undone.";

/// Text shown when a segment runs out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub title: String,
    pub description: String,
}

impl CompletionNotice {
    /// Notice for the segment at `index`, derived from what follows it.
    fn for_position(plan: &DurationPlan, index: usize) -> Self {
        match plan.segments.get(index + 1) {
            None => Self {
                title: "Session complete".into(),
                description: "Nice work! You finished every segment of this session.".into(),
            },
            Some(next) if next.segment_type == SegmentType::Break => Self {
                title: "Time for a break".into(),
                description: format!("Take a {} minute break.", next.duration_min),
            },
            Some(next) => Self {
                title: "Time to focus".into(),
                description: format!("Get ready for {} minutes of focus.", next.duration_min),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSegment {
    /// Ordinal position in the plan.
    pub key: usize,
    /// Planned length in seconds.
    pub initial_duration: u64,
    /// Seconds actually run. May exceed `initial_duration`.
    pub elapsed_duration: u64,
    pub segment_type: SegmentType,
    /// `elapsed_duration >= initial_duration`, refreshed on every running increment.
    pub is_complete: bool,
    pub notice: CompletionNotice,
}

impl TimerSegment {
    pub fn remaining_secs(&self) -> u64 {
        self.initial_duration.saturating_sub(self.elapsed_duration)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentState {
    /// Oldest first.
    pub completed: Vec<TimerSegment>,
    /// Active segment on top (last).
    pub remaining: Vec<TimerSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingState {
    pub is_running: bool,
    /// Seconds since the session started, paused time included.
    pub elapsed_time: u64,
    /// Seconds the clock was actually running.
    pub active_time: u64,
    /// Projected wall-clock "now"; the gap to the real now is the drift to apply.
    pub estimated_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticInfo {
    pub stop_prompt: CompletionNotice,
}

impl Default for StaticInfo {
    fn default() -> Self {
        Self {
            stop_prompt: CompletionNotice {
                title: STOP_PROMPT_TITLE.into(),
                description: STOP_PROMPT_DESCRIPTION.into(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    pub segments: SegmentState,
    pub timing: TimingState,
    pub info: StaticInfo,
}

impl TimerState {
    /// Build the initial state for `plan`, first segment on top.
    pub fn from_plan(plan: &DurationPlan, now: DateTime<Utc>) -> Self {
        let remaining = plan
            .segments
            .iter()
            .enumerate()
            .rev()
            .map(|(key, segment)| TimerSegment {
                key,
                initial_duration: segment.duration_secs(),
                elapsed_duration: 0,
                segment_type: segment.segment_type,
                is_complete: false,
                notice: CompletionNotice::for_position(plan, key),
            })
            .collect();

        Self {
            segments: SegmentState {
                completed: Vec::new(),
                remaining,
            },
            timing: TimingState {
                is_running: true,
                elapsed_time: 0,
                active_time: 0,
                estimated_time: now,
            },
            info: StaticInfo::default(),
        }
    }

    pub fn active_segment(&self) -> Option<&TimerSegment> {
        self.segments.remaining.last()
    }

    /// True when the active segment is the only one left.
    pub fn is_final_segment(&self) -> bool {
        self.segments.remaining.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    Start {
        plan: DurationPlan,
        now: DateTime<Utc>,
    },
    Resume,
    Pause,
    Increment {
        delta_secs: u64,
    },
    /// Move `estimated_time` to `now` without counting any time.
    Resync {
        now: DateTime<Utc>,
    },
    CompleteSegment,
    Stop,
}

/// Apply `action` to `state`.
///
/// # Errors
/// - [`TimerError::AlreadyRunning`] for `Start` on an active session
/// - [`TimerError::NotStarted`] for any other action (except `Stop`) on `None`
/// - [`TimerError::NoRemainingSegments`] for `CompleteSegment` on an empty stack
pub fn reduce(
    state: Option<TimerState>,
    action: TimerAction,
) -> Result<Option<TimerState>, TimerError> {
    match (state, action) {
        (None, TimerAction::Start { plan, now }) => Ok(Some(TimerState::from_plan(&plan, now))),
        (Some(_), TimerAction::Start { .. }) => Err(TimerError::AlreadyRunning),
        (_, TimerAction::Stop) => Ok(None),
        (None, _) => Err(TimerError::NotStarted),
        (Some(mut state), TimerAction::Resume) => {
            state.timing.is_running = true;
            Ok(Some(state))
        }
        (Some(mut state), TimerAction::Pause) => {
            state.timing.is_running = false;
            Ok(Some(state))
        }
        (Some(mut state), TimerAction::Increment { delta_secs }) => {
            increment(&mut state, delta_secs);
            Ok(Some(state))
        }
        (Some(mut state), TimerAction::Resync { now }) => {
            state.timing.estimated_time = now;
            Ok(Some(state))
        }
        (Some(mut state), TimerAction::CompleteSegment) => {
            let segment = state
                .segments
                .remaining
                .pop()
                .ok_or(TimerError::NoRemainingSegments)?;
            state.segments.completed.push(segment);
            Ok(Some(state))
        }
    }
}

fn increment(state: &mut TimerState, delta_secs: u64) {
    let timing = &mut state.timing;
    timing.elapsed_time = timing.elapsed_time.saturating_add(delta_secs);
    if let Some(estimated) = i64::try_from(delta_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| timing.estimated_time.checked_add_signed(d))
    {
        timing.estimated_time = estimated;
    }

    if !timing.is_running {
        return;
    }
    timing.active_time = timing.active_time.saturating_add(delta_secs);
    if let Some(active) = state.segments.remaining.last_mut() {
        active.elapsed_duration = active.elapsed_duration.saturating_add(delta_secs);
        active.is_complete = active.elapsed_duration >= active.initial_duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classic() -> DurationPlan {
        DurationPlan::from_minutes("classic", &[25, 5, 25]).unwrap()
    }

    fn started() -> TimerState {
        reduce(
            None,
            TimerAction::Start {
                plan: classic(),
                now: Utc::now(),
            },
        )
        .unwrap()
        .unwrap()
    }

    fn apply(state: TimerState, action: TimerAction) -> TimerState {
        reduce(Some(state), action).unwrap().unwrap()
    }

    #[test]
    fn start_puts_first_segment_on_top() {
        let state = started();
        assert_eq!(state.segments.remaining.len(), 3);
        assert!(state.segments.completed.is_empty());
        let active = state.active_segment().unwrap();
        assert_eq!(active.key, 0);
        assert_eq!(active.segment_type, SegmentType::Focus);
        assert_eq!(active.initial_duration, 1500);
        assert!(state.timing.is_running);
        assert_eq!(state.timing.elapsed_time, 0);
        assert_eq!(state.timing.active_time, 0);
    }

    #[test]
    fn start_twice_fails() {
        let result = reduce(
            Some(started()),
            TimerAction::Start {
                plan: classic(),
                now: Utc::now(),
            },
        );
        assert_eq!(result, Err(TimerError::AlreadyRunning));
    }

    #[test]
    fn notices_follow_position() {
        let state = started();
        let by_key = |k: usize| {
            state
                .segments
                .remaining
                .iter()
                .find(|s| s.key == k)
                .unwrap()
                .notice
                .clone()
        };
        assert_eq!(by_key(0).title, "Time for a break");
        assert_eq!(by_key(0).description, "Take a 5 minute break.");
        assert_eq!(by_key(1).title, "Time to focus");
        assert_eq!(by_key(1).description, "Get ready for 25 minutes of focus.");
        assert_eq!(by_key(2).title, "Session complete");
    }

    #[test]
    fn increment_while_running_advances_segment_and_clock() {
        let state = started();
        let before = state.timing.estimated_time;
        let state = apply(state, TimerAction::Increment { delta_secs: 30 });
        assert_eq!(state.timing.elapsed_time, 30);
        assert_eq!(state.timing.active_time, 30);
        assert_eq!(state.timing.estimated_time - before, Duration::seconds(30));
        assert_eq!(state.active_segment().unwrap().elapsed_duration, 30);
        assert!(!state.active_segment().unwrap().is_complete);
    }

    #[test]
    fn completion_flag_tolerates_overrun_without_advancing() {
        let state = apply(started(), TimerAction::Increment { delta_secs: 1500 });
        assert!(state.active_segment().unwrap().is_complete);
        let state = apply(state, TimerAction::Increment { delta_secs: 7 });
        let active = state.active_segment().unwrap();
        assert_eq!(active.key, 0);
        assert_eq!(active.elapsed_duration, 1507);
        assert!(active.is_complete);
        assert_eq!(state.segments.remaining.len(), 3);
    }

    #[test]
    fn paused_increment_only_moves_clock() {
        let state = apply(started(), TimerAction::Pause);
        let state = apply(state, TimerAction::Increment { delta_secs: 45 });
        assert_eq!(state.timing.elapsed_time, 45);
        assert_eq!(state.timing.active_time, 0);
        assert_eq!(state.active_segment().unwrap().elapsed_duration, 0);

        let state = apply(state, TimerAction::Resume);
        assert!(state.timing.is_running);
    }

    #[test]
    fn complete_segment_pops_onto_completed() {
        let state = apply(started(), TimerAction::Increment { delta_secs: 1500 });
        let state = apply(state, TimerAction::CompleteSegment);
        assert_eq!(state.segments.completed.len(), 1);
        assert_eq!(state.segments.completed[0].key, 0);
        let active = state.active_segment().unwrap();
        assert_eq!(active.segment_type, SegmentType::Break);
        assert_eq!(active.elapsed_duration, 0);

        let state = apply(state, TimerAction::CompleteSegment);
        let state = apply(state, TimerAction::CompleteSegment);
        assert_eq!(
            state.segments.completed.iter().map(|s| s.key).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            reduce(Some(state), TimerAction::CompleteSegment),
            Err(TimerError::NoRemainingSegments)
        );
    }

    #[test]
    fn stop_resets_and_allows_restart() {
        let state = apply(started(), TimerAction::Increment { delta_secs: 99 });
        assert_eq!(reduce(Some(state), TimerAction::Stop), Ok(None));
        assert_eq!(reduce(None, TimerAction::Stop), Ok(None));

        let restarted = reduce(
            None,
            TimerAction::Start {
                plan: classic(),
                now: Utc::now(),
            },
        )
        .unwrap()
        .unwrap();
        assert_eq!(restarted.timing.elapsed_time, 0);
    }

    #[test]
    fn actions_on_empty_state_fail() {
        for action in [
            TimerAction::Pause,
            TimerAction::Resume,
            TimerAction::Increment { delta_secs: 1 },
            TimerAction::CompleteSegment,
        ] {
            assert_eq!(reduce(None, action), Err(TimerError::NotStarted));
        }
    }

    #[test]
    fn resync_moves_only_the_estimate() {
        let state = apply(started(), TimerAction::Increment { delta_secs: 10 });
        let now = state.timing.estimated_time - Duration::seconds(300);
        let state = apply(state, TimerAction::Resync { now });
        assert_eq!(state.timing.estimated_time, now);
        assert_eq!(state.timing.elapsed_time, 10);
    }

    proptest! {
        #[test]
        fn running_increments_are_additive(a in 0u64..5000, b in 0u64..5000) {
            let split = apply(apply(started(), TimerAction::Increment { delta_secs: a }),
                TimerAction::Increment { delta_secs: b });
            let joined = apply(started(), TimerAction::Increment { delta_secs: a + b });
            prop_assert_eq!(
                split.active_segment().unwrap().elapsed_duration,
                joined.active_segment().unwrap().elapsed_duration
            );
            prop_assert_eq!(split.timing.active_time, joined.timing.active_time);
        }

        #[test]
        fn paused_increments_never_touch_segments(deltas in proptest::collection::vec(0u64..600, 1..20)) {
            let mut state = apply(started(), TimerAction::Pause);
            for &d in &deltas {
                state = apply(state, TimerAction::Increment { delta_secs: d });
            }
            prop_assert!(state.segments.remaining.iter().all(|s| s.elapsed_duration == 0));
            prop_assert_eq!(state.timing.elapsed_time, deltas.iter().sum::<u64>());
        }

        #[test]
        fn complete_segment_preserves_segment_count(minutes in proptest::collection::vec(1u64..60, 1..6)) {
            let mut lengths = minutes;
            if lengths.len() % 2 == 0 {
                lengths.push(1);
            }
            let plan = DurationPlan::from_minutes("p", &lengths).unwrap();
            let mut state = reduce(None, TimerAction::Start { plan, now: Utc::now() }).unwrap().unwrap();
            prop_assert_eq!(state.segments.remaining.len(), lengths.len());
            prop_assert_eq!(state.active_segment().unwrap().key, 0);
            while !state.segments.remaining.is_empty() {
                let total = state.segments.remaining.len() + state.segments.completed.len();
                state = apply(state, TimerAction::CompleteSegment);
                prop_assert_eq!(state.segments.remaining.len() + state.segments.completed.len(), total);
            }
        }
    }
}
