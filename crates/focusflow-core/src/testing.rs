//! Recording fakes for the platform collaborators and a hand-driven clock.

use std::cell::Cell;

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::collaborators::{
    Clock, NotificationId, Notifier, Presenter, Prompt, SoundClip, SoundPlayer,
};
use crate::error::NotifyError;

/// Records every prompt, sound and notification it is handed.
#[derive(Debug, Default)]
pub struct FakePlatform {
    pub prompts: Vec<Prompt>,
    pub sounds: Vec<SoundClip>,
    /// `(id, title, fire_at)` in scheduling order.
    pub scheduled: Vec<(NotificationId, String, DateTime<Utc>)>,
    pub cancelled: Vec<NotificationId>,
    /// Refuse every schedule request, as a host without notification permission would.
    pub deny_notifications: bool,
}

impl FakePlatform {
    /// Notifications scheduled and not cancelled.
    pub fn live_notifications(&self) -> usize {
        self.scheduled
            .iter()
            .filter(|(id, _, _)| !self.cancelled.contains(id))
            .count()
    }
}

impl Notifier for FakePlatform {
    fn schedule_notification(
        &mut self,
        title: &str,
        _body: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<NotificationId, NotifyError> {
        if self.deny_notifications {
            return Err(NotifyError::Unavailable("permission denied".into()));
        }
        let id = format!("notification-{}", self.scheduled.len() + 1);
        self.scheduled.push((id.clone(), title.to_string(), fire_at));
        Ok(id)
    }

    fn cancel_notification(&mut self, id: &NotificationId) {
        self.cancelled.push(id.clone());
    }
}

impl Presenter for FakePlatform {
    fn present(&mut self, prompt: &Prompt) {
        self.prompts.push(prompt.clone());
    }
}

impl SoundPlayer for FakePlatform {
    fn play(&mut self, clip: SoundClip) {
        self.sounds.push(clip);
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance_secs(&self, secs: i64) {
        self.now.set(self.now.get() + Duration::seconds(secs));
    }

    pub fn advance_millis(&self, millis: i64) {
        self.now.set(self.now.get() + Duration::milliseconds(millis));
    }

    pub fn rewind_secs(&self, secs: i64) {
        self.now.set(self.now.get() - Duration::seconds(secs));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(
            Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0)
                .single()
                .unwrap_or_else(Utc::now),
        )
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
