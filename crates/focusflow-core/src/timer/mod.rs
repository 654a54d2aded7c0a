mod orchestrator;
mod plan;
mod state;

pub use orchestrator::{TimerOrchestrator, TimerStatus, DEFAULT_PERSIST_INTERVAL_SECS};
pub use plan::{DurationPlan, PlanSegment, SegmentType};
pub use state::{
    reduce, CompletionNotice, SegmentState, StaticInfo, TimerAction, TimerSegment, TimerState,
    TimingState, STOP_PROMPT_DESCRIPTION, STOP_PROMPT_TITLE,
};
