use wristplan_core::Database;

use super::{print_json, CliResult};

pub fn run(limit: usize) -> CliResult {
    let db = Database::open()?;
    print_json(&db.recent_alerts(limit)?)
}
