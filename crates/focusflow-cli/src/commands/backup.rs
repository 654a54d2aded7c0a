use std::path::PathBuf;

use clap::Subcommand;
use focusflow_core::storage::Backup;
use focusflow_core::Database;

use super::print_json;

#[derive(Subcommand)]
pub enum BackupAction {
    /// Write all activities, plans and sessions to a JSON file
    Export {
        /// Destination file
        path: PathBuf,
    },
    /// Replace all data with the contents of a backup file
    Import {
        /// Backup file
        path: PathBuf,
    },
}

pub fn run(action: BackupAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        BackupAction::Export { path } => {
            let backup = db.export_backup()?;
            backup.write_to(&path)?;
            print_json(&backup.summary())?;
        }
        BackupAction::Import { path } => {
            let backup = Backup::read_from(&path)?;
            let summary = db.import_backup(&backup)?;
            print_json(&summary)?;
        }
    }
    Ok(())
}
