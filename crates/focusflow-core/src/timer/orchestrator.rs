//! Timer orchestrator.
//!
//! Owns the one `Option<TimerState>` of the app and drives it through
//! [`reduce`]. Like the state machine it has no thread of its own: the host
//! calls [`TimerOrchestrator::tick`] once per second while a session is
//! active, plus the control and lifecycle methods as the user acts.
//!
//! ## Status
//!
//! ```text
//! Off --start--> Running --pause--> Paused --resume--> Running
//! Running --(segment runs out)--> Done --Proceed--> Running | Off
//! Running | Paused | Done --stop + Confirm--> Off
//! ```
//!
//! ## Drift
//!
//! Each tick applies `round(now - estimated_time)` seconds rather than a
//! fixed second, so ticks missed while the process was suspended land in
//! one jump on the next tick.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::plan::{DurationPlan, SegmentType};
use super::state::{reduce, TimerAction, TimerState};
use crate::collaborators::{
    Clock, NewSession, NotificationId, Platform, Prompt, PromptChoice, PromptKind, PromptOption,
    SessionStore, SoundClip, SystemClock,
};
use crate::error::{Result, StoreError, TimerError};
use crate::events::Event;

/// Default batching interval for persisted progress.
pub const DEFAULT_PERSIST_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Off,
    Running,
    /// Time is up but the segment has not been finalised yet.
    Done,
    Paused,
}

impl TimerStatus {
    pub fn of(state: Option<&TimerState>) -> Self {
        match state {
            None => TimerStatus::Off,
            Some(state) if !state.timing.is_running => TimerStatus::Paused,
            Some(state) => {
                if state.active_segment().is_some_and(|s| s.is_complete) {
                    TimerStatus::Done
                } else {
                    TimerStatus::Running
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Off => "off",
            TimerStatus::Running => "running",
            TimerStatus::Done => "done",
            TimerStatus::Paused => "paused",
        }
    }
}

impl std::fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveSession {
    id: String,
    activity_id: i64,
}

pub struct TimerOrchestrator<S, P, C = SystemClock> {
    store: S,
    platform: P,
    clock: C,
    persist_interval_secs: u64,
    state: Option<TimerState>,
    session: Option<ActiveSession>,
    pending_prompt: Option<Prompt>,
    /// Key of the segment whose completion prompt has already gone out.
    announced_segment: Option<usize>,
    notification: Option<NotificationId>,
    events: Vec<Event>,
}

impl<S: SessionStore, P: Platform> TimerOrchestrator<S, P, SystemClock> {
    pub fn new(store: S, platform: P) -> Self {
        Self::with_clock(store, platform, SystemClock)
    }
}

impl<S: SessionStore, P: Platform, C: Clock> TimerOrchestrator<S, P, C> {
    pub fn with_clock(store: S, platform: P, clock: C) -> Self {
        Self {
            store,
            platform,
            clock,
            persist_interval_secs: DEFAULT_PERSIST_INTERVAL_SECS,
            state: None,
            session: None,
            pending_prompt: None,
            announced_segment: None,
            notification: None,
            events: Vec::new(),
        }
    }

    /// Override the progress batching interval. Zero is treated as one second.
    pub fn with_persist_interval(mut self, secs: u64) -> Self {
        self.persist_interval_secs = secs.max(1);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self) -> TimerStatus {
        TimerStatus::of(self.state.as_ref())
    }

    pub fn state(&self) -> Option<&TimerState> {
        self.state.as_ref()
    }

    /// Whether the host should keep its tick source armed.
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn pending_prompt(&self) -> Option<&Prompt> {
        self.pending_prompt.as_ref()
    }

    pub fn pending_notification(&self) -> Option<&NotificationId> {
        self.notification.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// Take all events produced since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a session for `activity_id` following `plan`.
    ///
    /// # Errors
    /// Fails if a session is already active, the plan is invalid, or the
    /// store cannot create the session record. In the last case the timer
    /// stays off.
    pub fn start(&mut self, activity_id: i64, plan: &DurationPlan) -> Result<()> {
        let before = self.require("start", TimerStatus::Off)?;
        plan.validate()?;
        let now = self.clock.now();
        self.dispatch(TimerAction::Start {
            plan: plan.clone(),
            now,
        })?;

        let session_id = match self
            .store
            .create_session(&NewSession::new(activity_id, plan.id, now))
        {
            Ok(id) => id,
            Err(err) => {
                self.state = None;
                return Err(err.into());
            }
        };

        match self.store.activity_exists(activity_id) {
            Ok(true) => {
                if let Err(err) = self.store.increment_activity_session_count(activity_id) {
                    store_failure("increment activity session count", &err);
                }
            }
            Ok(false) => debug!(activity_id, "activity no longer exists, session count not incremented"),
            Err(err) => store_failure("check activity", &err),
        }

        info!(session_id = %session_id, activity_id, plan = %plan.summary(), "session started");
        self.session = Some(ActiveSession {
            id: session_id.clone(),
            activity_id,
        });
        self.pending_prompt = None;
        self.announced_segment = None;
        self.emit(Event::TimerStarted {
            session_id,
            activity_id,
            segment_count: plan.segments.len(),
            at: now,
        });
        self.note_status(before);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        let before = self.require("pause", TimerStatus::Running)?;
        self.dispatch(TimerAction::Pause)?;
        let elapsed_secs = self.elapsed_secs();
        self.emit(Event::TimerPaused {
            elapsed_secs,
            at: self.clock.now(),
        });
        self.note_status(before);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let before = self.require("resume", TimerStatus::Paused)?;
        self.dispatch(TimerAction::Resume)?;
        let elapsed_secs = self.elapsed_secs();
        self.emit(Event::TimerResumed {
            elapsed_secs,
            at: self.clock.now(),
        });
        self.note_status(before);
        Ok(())
    }

    /// Ask the user to confirm ending an unfinished session.
    ///
    /// Nothing changes until [`respond`](Self::respond) is called with
    /// [`PromptChoice::Confirm`].
    pub fn stop(&mut self) -> Result<()> {
        let status = self.status();
        let Some(state) = self.state.as_ref() else {
            return Err(TimerError::InvalidStatus {
                operation: "stop",
                status,
            }
            .into());
        };
        let notice = &state.info.stop_prompt;
        let prompt = Prompt {
            kind: PromptKind::StopConfirmation,
            title: notice.title.clone(),
            description: notice.description.clone(),
            options: vec![
                PromptOption {
                    label: "Cancel".into(),
                    choice: PromptChoice::Cancel,
                },
                PromptOption {
                    label: "Stop".into(),
                    choice: PromptChoice::Confirm,
                },
            ],
        };
        self.present(prompt);
        Ok(())
    }

    /// Answer the pending prompt.
    ///
    /// # Errors
    /// Fails if nothing is pending or `choice` is not one of its options.
    pub fn respond(&mut self, choice: PromptChoice) -> Result<()> {
        let prompt = self
            .pending_prompt
            .take()
            .ok_or(TimerError::NoPendingPrompt)?;
        if !prompt.allows(choice) {
            self.pending_prompt = Some(prompt);
            return Err(TimerError::InvalidChoice {
                choice: format!("{choice:?}"),
            }
            .into());
        }

        let before = self.status();
        match (prompt.kind, choice) {
            (kind, PromptChoice::Cancel) => {
                self.emit(Event::PromptDismissed {
                    kind,
                    at: self.clock.now(),
                });
                // A completion prompt displaced by the stop prompt comes back,
                // without replaying its sound or SegmentDone.
                if prompt.kind == PromptKind::StopConfirmation {
                    if let Some(completion) = self.announced_completion_prompt() {
                        self.present(completion);
                    }
                }
            }
            (PromptKind::StopConfirmation, PromptChoice::Confirm) => self.finish_session(false)?,
            (PromptKind::SessionComplete, PromptChoice::Confirm) => self.finish_session(true)?,
            (PromptKind::SegmentComplete, PromptChoice::Confirm) => self.advance_segment()?,
        }
        self.note_status(before);
        Ok(())
    }

    /// Advance the timer by the wall-clock time since the last tick.
    ///
    /// No-op while off. Store failures are logged, not returned: losing a
    /// batched increment is preferable to stalling the clock.
    pub fn tick(&mut self) -> Result<()> {
        let Some(state) = self.state.as_ref() else {
            return Ok(());
        };
        let before = self.status();
        let now = self.clock.now();
        let old_elapsed = state.timing.elapsed_time;
        let drift_ms = (now - state.timing.estimated_time).num_milliseconds();
        let delta = (drift_ms as f64 / 1000.0).round() as i64;

        if delta < 0 {
            warn!(delta, "wall clock moved backwards, resyncing timer estimate");
            self.dispatch(TimerAction::Resync { now })?;
            return Ok(());
        }
        if delta == 0 {
            return Ok(());
        }

        let delta_secs = delta as u64;
        self.dispatch(TimerAction::Increment { delta_secs })?;
        if delta_secs > 1 {
            debug!(delta_secs, "applying missed ticks");
            self.emit(Event::DriftReconciled {
                delta_secs,
                at: now,
            });
        }
        self.persist_progress(old_elapsed, now);
        self.check_segment_completion();
        self.note_status(before);
        Ok(())
    }

    /// The host is about to be suspended.
    ///
    /// Schedules one notification for when the running segment will end,
    /// since `tick` will not fire while suspended.
    pub fn enter_background(&mut self) -> Result<()> {
        if self.status() != TimerStatus::Running {
            return Ok(());
        }
        let Some(active) = self.state.as_ref().and_then(TimerState::active_segment) else {
            return Ok(());
        };
        let now = self.clock.now();
        let remaining = i64::try_from(active.remaining_secs()).unwrap_or(i64::MAX);
        let fire_at = Duration::try_seconds(remaining)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let title = active.notice.title.clone();
        let body = active.notice.description.clone();

        if let Some(previous) = self.notification.take() {
            self.platform.cancel_notification(&previous);
        }
        match self.platform.schedule_notification(&title, &body, fire_at) {
            Ok(id) => {
                debug!(notification_id = %id, %fire_at, "scheduled background notification");
                self.notification = Some(id);
                self.emit(Event::NotificationScheduled { fire_at, at: now });
            }
            Err(err) => warn!(error = %err, "failed to schedule background notification"),
        }
        Ok(())
    }

    /// The host is back in the foreground. Cancels the pending notification.
    pub fn enter_foreground(&mut self) -> Result<()> {
        if let Some(id) = self.notification.take() {
            self.platform.cancel_notification(&id);
            self.emit(Event::NotificationCancelled {
                at: self.clock.now(),
            });
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn dispatch(&mut self, action: TimerAction) -> Result<(), TimerError> {
        self.state = reduce(self.state.clone(), action)?;
        Ok(())
    }

    fn require(&self, operation: &'static str, expected: TimerStatus) -> Result<TimerStatus> {
        let status = self.status();
        if status != expected {
            return Err(TimerError::InvalidStatus { operation, status }.into());
        }
        Ok(status)
    }

    fn elapsed_secs(&self) -> u64 {
        self.state
            .as_ref()
            .map(|s| s.timing.elapsed_time)
            .unwrap_or(0)
    }

    fn emit(&mut self, event: Event) {
        debug!(?event, "timer event");
        self.events.push(event);
    }

    fn note_status(&mut self, before: TimerStatus) {
        let after = self.status();
        if after != before {
            self.emit(Event::StatusChanged {
                from: before,
                to: after,
                at: self.clock.now(),
            });
        }
    }

    fn present(&mut self, prompt: Prompt) {
        if let Some(displaced) = self.pending_prompt.take() {
            self.emit(Event::PromptDismissed {
                kind: displaced.kind,
                at: self.clock.now(),
            });
        }
        self.platform.present(&prompt);
        self.emit(Event::PromptPresented {
            kind: prompt.kind,
            at: self.clock.now(),
        });
        self.pending_prompt = Some(prompt);
    }

    /// Relay whole persist intervals crossed by the last increment.
    fn persist_progress(&mut self, old_elapsed: u64, now: DateTime<Utc>) {
        let (Some(state), Some(session)) = (self.state.as_ref(), self.session.as_ref()) else {
            return;
        };
        let interval = self.persist_interval_secs;
        let crossed = state.timing.elapsed_time / interval - old_elapsed / interval;
        if crossed == 0 {
            return;
        }
        let increment_secs = crossed * interval;
        let is_running = state.timing.is_running;
        let segment_type = match state.active_segment() {
            Some(active) if is_running => active.segment_type,
            _ => SegmentType::Pause,
        };
        let session_id = session.id.clone();
        let activity_id = session.activity_id;

        match self.store.session_exists(&session_id) {
            Ok(true) => {
                match self
                    .store
                    .increment_session_segment(&session_id, segment_type, increment_secs)
                {
                    Ok(()) => self.emit(Event::ProgressPersisted {
                        session_id: session_id.clone(),
                        segment_type,
                        increment_secs,
                        at: now,
                    }),
                    Err(err) => store_failure("increment session segment", &err),
                }
            }
            Ok(false) => debug!(session_id = %session_id, "session no longer exists, progress not persisted"),
            Err(err) => store_failure("check session", &err),
        }

        if segment_type == SegmentType::Focus {
            match self.store.activity_exists(activity_id) {
                Ok(true) => {
                    if let Err(err) = self.store.increment_activity_time(activity_id, increment_secs) {
                        store_failure("increment activity time", &err);
                    }
                }
                Ok(false) => debug!(activity_id, "activity no longer exists, time not credited"),
                Err(err) => store_failure("check activity", &err),
            }
        }
    }

    /// Present the completion prompt once per segment, as soon as it is due.
    fn check_segment_completion(&mut self) {
        if self.status() != TimerStatus::Done {
            return;
        }
        let Some(state) = self.state.as_ref() else {
            return;
        };
        let Some(active) = state.active_segment() else {
            return;
        };
        if self.announced_segment == Some(active.key) {
            return;
        }

        let is_final = state.is_final_segment();
        let segment_key = active.key;
        let segment_type = active.segment_type;
        let prompt = completion_prompt(state);

        self.announced_segment = Some(segment_key);
        self.platform.play(if is_final {
            SoundClip::SessionComplete
        } else {
            SoundClip::SegmentComplete
        });
        self.emit(Event::SegmentDone {
            segment_key,
            segment_type,
            is_final,
            at: self.clock.now(),
        });
        self.present(prompt);
    }

    /// The completion prompt for the active segment, if it is done and was
    /// already announced.
    fn announced_completion_prompt(&self) -> Option<Prompt> {
        if self.status() != TimerStatus::Done {
            return None;
        }
        let state = self.state.as_ref()?;
        let active = state.active_segment()?;
        (self.announced_segment == Some(active.key)).then(|| completion_prompt(state))
    }

    fn advance_segment(&mut self) -> Result<()> {
        self.dispatch(TimerAction::CompleteSegment)?;
        self.announced_segment = None;
        if let Some(active) = self.state.as_ref().and_then(TimerState::active_segment) {
            let event = Event::SegmentAdvanced {
                segment_key: active.key,
                segment_type: active.segment_type,
                duration_secs: active.initial_duration,
                at: self.clock.now(),
            };
            info!(segment_key = active.key, segment_type = %active.segment_type, "segment advanced");
            self.emit(event);
        }
        Ok(())
    }

    /// Stop the state machine and close the session record.
    fn finish_session(&mut self, completed: bool) -> Result<()> {
        let now = self.clock.now();
        let (active_secs, elapsed_secs) = self
            .state
            .as_ref()
            .map(|s| (s.timing.active_time, s.timing.elapsed_time))
            .unwrap_or((0, 0));

        self.dispatch(TimerAction::Stop)?;
        self.pending_prompt = None;
        self.announced_segment = None;

        if let Some(session) = self.session.take() {
            if let Err(err) = self.store.end_session(&session.id, now) {
                store_failure("end session", &err);
            }
            info!(session_id = %session.id, completed, active_secs, elapsed_secs, "session ended");
            self.emit(Event::SessionEnded {
                session_id: session.id,
                completed,
                active_secs,
                elapsed_secs,
                at: now,
            });
        }
        Ok(())
    }
}

fn completion_prompt(state: &TimerState) -> Prompt {
    let (title, description) = state
        .active_segment()
        .map(|a| (a.notice.title.clone(), a.notice.description.clone()))
        .unwrap_or_default();
    Prompt {
        kind: if state.is_final_segment() {
            PromptKind::SessionComplete
        } else {
            PromptKind::SegmentComplete
        },
        title,
        description,
        options: vec![PromptOption {
            label: "Proceed".into(),
            choice: PromptChoice::Confirm,
        }],
    }
}

fn store_failure(operation: &str, err: &StoreError) {
    if err.is_not_found() {
        debug!(operation, error = %err, "skipped missing reference");
    } else {
        warn!(operation, error = %err, "store operation failed");
    }
}
