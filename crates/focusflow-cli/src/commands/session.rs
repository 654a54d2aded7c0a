use clap::Subcommand;
use focusflow_core::Database;

use super::print_json;

#[derive(Subcommand)]
pub enum SessionAction {
    /// List recent sessions, newest first
    List {
        /// Maximum number of sessions
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show one session with its segments
    Show {
        /// Session ID
        id: String,
    },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SessionAction::List { limit } => {
            print_json(&db.list_sessions(Some(limit))?)?;
        }
        SessionAction::Show { id } => match db.get_session(&id)? {
            Some(session) => print_json(&session)?,
            None => return Err(format!("session not found: {id}").into()),
        },
    }
    Ok(())
}
