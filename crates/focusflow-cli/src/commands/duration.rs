use clap::Subcommand;
use focusflow_core::{Database, DurationPlan};

use super::print_json;

#[derive(Subcommand)]
pub enum DurationAction {
    /// Store a duration plan
    Add {
        /// Plan name
        name: String,
        /// Segment lengths in minutes, focus first (e.g. "25,5,25,5,25")
        #[arg(long)]
        minutes: String,
    },
    /// List duration plans as JSON
    List,
    /// Remove a duration plan
    Remove {
        /// Plan ID
        id: i64,
    },
}

pub fn run(action: DurationAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        DurationAction::Add { name, minutes } => {
            let plan = DurationPlan::parse_minutes(name, &minutes)?;
            let stored = db.add_duration(&plan)?;
            print_json(&stored)?;
        }
        DurationAction::List => {
            print_json(&db.list_durations()?)?;
        }
        DurationAction::Remove { id } => {
            db.remove_duration(id)?;
            println!("ok");
        }
    }
    Ok(())
}
