use clap::Subcommand;
use focusflow_core::Database;

use super::print_json;

#[derive(Subcommand)]
pub enum ActivityAction {
    /// Create an activity
    Add {
        /// Activity name
        name: String,
    },
    /// List activities as JSON
    List,
    /// Rename an activity
    Rename {
        /// Activity ID
        id: i64,
        /// New name
        name: String,
    },
    /// Remove an activity (its sessions are kept)
    Remove {
        /// Activity ID
        id: i64,
    },
}

pub fn run(action: ActivityAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        ActivityAction::Add { name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err("activity name must not be empty".into());
            }
            let activity = db.add_activity(name)?;
            print_json(&activity)?;
        }
        ActivityAction::List => {
            print_json(&db.list_activities()?)?;
        }
        ActivityAction::Rename { id, name } => {
            db.rename_activity(id, name.trim())?;
            println!("ok");
        }
        ActivityAction::Remove { id } => {
            db.remove_activity(id)?;
            println!("ok");
        }
    }
    Ok(())
}
