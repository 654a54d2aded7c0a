use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collaborators::PromptKind;
use crate::timer::{SegmentType, TimerStatus};

/// Every orchestrator transition produces an Event.
/// Front ends drain them to refresh their view; the CLI prints them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        session_id: String,
        activity_id: i64,
        segment_count: usize,
        at: DateTime<Utc>,
    },
    TimerPaused {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// A tick applied more than one second at once (missed ticks while suspended).
    DriftReconciled {
        delta_secs: u64,
        at: DateTime<Utc>,
    },
    /// A batched increment was relayed to the store.
    ProgressPersisted {
        session_id: String,
        segment_type: SegmentType,
        increment_secs: u64,
        at: DateTime<Utc>,
    },
    /// The active segment ran out; a prompt is waiting.
    SegmentDone {
        segment_key: usize,
        segment_type: SegmentType,
        is_final: bool,
        at: DateTime<Utc>,
    },
    SegmentAdvanced {
        segment_key: usize,
        segment_type: SegmentType,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    PromptPresented {
        kind: PromptKind,
        at: DateTime<Utc>,
    },
    PromptDismissed {
        kind: PromptKind,
        at: DateTime<Utc>,
    },
    NotificationScheduled {
        fire_at: DateTime<Utc>,
        at: DateTime<Utc>,
    },
    NotificationCancelled {
        at: DateTime<Utc>,
    },
    SessionEnded {
        session_id: String,
        completed: bool,
        active_secs: u64,
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    StatusChanged {
        from: TimerStatus,
        to: TimerStatus,
        at: DateTime<Utc>,
    },
}
