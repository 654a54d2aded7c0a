use clap::Args;
use focusflow_core::storage::database::start_of_today;
use focusflow_core::Database;

use super::print_json;

#[derive(Args)]
pub struct StatsArgs {
    /// Only sessions started today (UTC)
    #[arg(long)]
    today: bool,
    /// Break focus time down per activity
    #[arg(long)]
    by_activity: bool,
}

pub fn run(args: StatsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let since = if args.today { start_of_today() } else { None };

    if args.by_activity {
        print_json(&db.activity_breakdown(since)?)?;
    } else {
        print_json(&db.stats_since(since)?)?;
    }
    Ok(())
}
