use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusflow_core::collaborators::NotificationId;
use focusflow_core::{
    Config, Database, DurationPlan, Notifier, Presenter, Prompt, PromptChoice, PromptKind,
    NotifyError, SessionStore, SoundClip, SoundPlayer, TimerOrchestrator,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

const HELP: &str = "commands: p pause | r resume | s stop | y proceed/confirm | n cancel | \
b background | f foreground | status | h help";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run a session in the foreground, answering prompts on stdin
    Run {
        /// Activity ID to track time against
        #[arg(long)]
        activity: i64,
        /// Stored duration plan ID (defaults to the configured plan)
        #[arg(long)]
        duration: Option<i64>,
    },
}

/// Prompts go to stderr, notifications to the log, sounds to the bell.
struct TerminalPlatform {
    notifications_enabled: bool,
    sound_enabled: bool,
    next_notification: u64,
}

impl TerminalPlatform {
    fn new(config: &Config) -> Self {
        Self {
            notifications_enabled: config.notifications.enabled,
            sound_enabled: config.sound.enabled,
            next_notification: 0,
        }
    }
}

impl Notifier for TerminalPlatform {
    fn schedule_notification(
        &mut self,
        title: &str,
        body: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<NotificationId, NotifyError> {
        self.next_notification += 1;
        let id = format!("terminal-{}", self.next_notification);
        if self.notifications_enabled {
            info!(notification_id = %id, title, body, %fire_at, "notification scheduled");
        } else {
            debug!(notification_id = %id, "notifications disabled");
        }
        Ok(id)
    }

    fn cancel_notification(&mut self, id: &NotificationId) {
        debug!(notification_id = %id, "notification cancelled");
    }
}

impl Presenter for TerminalPlatform {
    fn present(&mut self, prompt: &Prompt) {
        eprintln!();
        eprintln!("== {} ==", prompt.title);
        eprintln!("{}", prompt.description);
        let options: Vec<String> = prompt
            .options
            .iter()
            .map(|o| format!("[{}] {}", choice_key(o.choice), o.label))
            .collect();
        eprintln!("{}", options.join("  "));
    }
}

impl SoundPlayer for TerminalPlatform {
    fn play(&mut self, clip: SoundClip) {
        if self.sound_enabled {
            debug!(?clip, "bell");
            eprint!("\x07");
        }
    }
}

fn choice_key(choice: PromptChoice) -> &'static str {
    match choice {
        PromptChoice::Confirm => "y",
        PromptChoice::Cancel => "n",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Input {
    Pause,
    Resume,
    Stop,
    Answer(PromptChoice),
    Background,
    Foreground,
    Status,
    Help,
}

fn parse_input(line: &str) -> Option<Input> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" => Some(Input::Pause),
        "r" | "resume" => Some(Input::Resume),
        "s" | "stop" => Some(Input::Stop),
        "y" | "yes" | "proceed" | "confirm" => Some(Input::Answer(PromptChoice::Confirm)),
        "n" | "no" | "cancel" => Some(Input::Answer(PromptChoice::Cancel)),
        "b" | "background" => Some(Input::Background),
        "f" | "foreground" => Some(Input::Foreground),
        "status" => Some(Input::Status),
        "h" | "help" | "?" => Some(Input::Help),
        _ => None,
    }
}

type Orchestrator = TimerOrchestrator<Database, TerminalPlatform>;

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Run { activity, duration } => {
            let config = Config::load()?;
            let db = Database::open()?;
            if !db.activity_exists(activity)? {
                return Err(format!("activity not found: {activity}").into());
            }
            let plan = match duration {
                Some(id) => db
                    .get_duration(id)?
                    .ok_or_else(|| format!("duration not found: {id}"))?,
                None => config.default_plan()?,
            };

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(run_session(db, &config, activity, &plan))
        }
    }
}

async fn run_session(
    db: Database,
    config: &Config,
    activity_id: i64,
    plan: &DurationPlan,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut orch = TimerOrchestrator::new(db, TerminalPlatform::new(config))
        .with_persist_interval(config.timer.persist_interval_secs);
    orch.start(activity_id, plan)?;
    print_events(&mut orch)?;
    eprintln!("{HELP}");

    let period = Duration::from_millis(config.timer.tick_interval_ms.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut warned_prompt = None;

    while orch.is_active() {
        tokio::select! {
            _ = ticker.tick() => orch.tick()?,
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if let Err(e) = handle_line(&mut orch, &line) {
                        eprintln!("error: {e}");
                    }
                }
                None => {
                    debug!("stdin closed");
                    stdin_open = false;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                interrupt(&mut orch)?;
            }
        }
        print_events(&mut orch)?;

        let stuck = unanswerable_prompt(&orch, stdin_open);
        if stuck.is_some() && stuck != warned_prompt {
            warn!(
                prompt = ?stuck,
                "stdin is closed, the session keeps running until ctrl-c answers this prompt"
            );
        }
        warned_prompt = stuck;
    }
    Ok(())
}

/// The pending prompt, if stdin is closed and it can no longer be answered there.
fn unanswerable_prompt(orch: &Orchestrator, stdin_open: bool) -> Option<PromptKind> {
    if stdin_open {
        return None;
    }
    orch.pending_prompt().map(|p| p.kind)
}

fn handle_line(orch: &mut Orchestrator, line: &str) -> Result<(), Box<dyn std::error::Error>> {
    if line.trim().is_empty() {
        return Ok(());
    }
    let Some(input) = parse_input(line) else {
        eprintln!("unknown command: {}  ({HELP})", line.trim());
        return Ok(());
    };
    match input {
        Input::Pause => orch.pause()?,
        Input::Resume => orch.resume()?,
        Input::Stop => orch.stop()?,
        Input::Answer(choice) => orch.respond(choice)?,
        Input::Background => orch.enter_background()?,
        Input::Foreground => orch.enter_foreground()?,
        Input::Status => print_status(orch)?,
        Input::Help => eprintln!("{HELP}"),
    }
    Ok(())
}

/// First ctrl-c asks for confirmation, a second one confirms.
fn interrupt(orch: &mut Orchestrator) -> Result<(), Box<dyn std::error::Error>> {
    let confirming = orch
        .pending_prompt()
        .is_some_and(|p| p.kind == PromptKind::StopConfirmation);
    if confirming {
        orch.respond(PromptChoice::Confirm)?;
    } else {
        orch.stop()?;
    }
    Ok(())
}

fn print_status(orch: &Orchestrator) -> Result<(), Box<dyn std::error::Error>> {
    let active = orch.state().and_then(|s| s.active_segment());
    let status = serde_json::json!({
        "status": orch.status(),
        "session_id": orch.session_id(),
        "segment_type": active.map(|s| s.segment_type),
        "remaining_secs": active.map(|s| s.remaining_secs()),
        "elapsed_secs": orch.state().map(|s| s.timing.elapsed_time),
        "prompt": orch.pending_prompt().map(|p| p.kind),
    });
    println!("{status}");
    Ok(())
}

fn print_events(orch: &mut Orchestrator) -> Result<(), Box<dyn std::error::Error>> {
    for event in orch.drain_events() {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use focusflow_core::TimerStatus;

    #[test]
    fn parses_short_and_long_commands() {
        assert_eq!(parse_input("p"), Some(Input::Pause));
        assert_eq!(parse_input("  Resume \n"), Some(Input::Resume));
        assert_eq!(parse_input("s"), Some(Input::Stop));
        assert_eq!(parse_input("y"), Some(Input::Answer(PromptChoice::Confirm)));
        assert_eq!(parse_input("cancel"), Some(Input::Answer(PromptChoice::Cancel)));
        assert_eq!(parse_input("b"), Some(Input::Background));
        assert_eq!(parse_input("?"), Some(Input::Help));
        assert_eq!(parse_input("launch"), None);
    }

    #[test]
    fn platform_hands_out_distinct_notification_ids() {
        let mut platform = TerminalPlatform::new(&Config::default());
        let at = Utc::now();
        let a = platform.schedule_notification("t", "b", at).unwrap();
        let b = platform.schedule_notification("t", "b", at).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn ctrl_c_asks_then_confirms() {
        let db = Database::open_memory().unwrap();
        let activity = db.add_activity("Reading").unwrap();
        let mut orch = TimerOrchestrator::new(db, TerminalPlatform::new(&Config::default()));
        orch.start(activity.id, &DurationPlan::from_minutes("one", &[5]).unwrap())
            .unwrap();

        interrupt(&mut orch).unwrap();
        assert_eq!(orch.status(), TimerStatus::Running);
        assert_eq!(
            orch.pending_prompt().map(|p| p.kind),
            Some(PromptKind::StopConfirmation)
        );

        interrupt(&mut orch).unwrap();
        assert_eq!(orch.status(), TimerStatus::Off);
    }

    #[test]
    fn pending_prompt_is_unanswerable_once_stdin_closes() {
        let db = Database::open_memory().unwrap();
        let activity = db.add_activity("Reading").unwrap();
        let mut orch = TimerOrchestrator::new(db, TerminalPlatform::new(&Config::default()));
        orch.start(activity.id, &DurationPlan::from_minutes("one", &[5]).unwrap())
            .unwrap();
        assert_eq!(unanswerable_prompt(&orch, false), None);

        orch.stop().unwrap();
        assert_eq!(unanswerable_prompt(&orch, true), None);
        assert_eq!(
            unanswerable_prompt(&orch, false),
            Some(PromptKind::StopConfirmation)
        );
    }

    #[test]
    fn usage_errors_are_reported_not_fatal() {
        let db = Database::open_memory().unwrap();
        let activity = db.add_activity("Reading").unwrap();
        let mut orch = TimerOrchestrator::new(db, TerminalPlatform::new(&Config::default()));
        orch.start(activity.id, &DurationPlan::from_minutes("one", &[5]).unwrap())
            .unwrap();

        assert!(handle_line(&mut orch, "r").is_err());
        assert!(handle_line(&mut orch, "nonsense").is_ok());
        handle_line(&mut orch, "p").unwrap();
        assert_eq!(orch.status(), TimerStatus::Paused);
    }
}
