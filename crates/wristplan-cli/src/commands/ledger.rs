use std::sync::Arc;

use clap::Subcommand;
use serde_json::json;
use wristplan_core::{AlertLedger, Boundary, Database};

use super::{print_json, CliResult};

#[derive(Subcommand)]
pub enum LedgerAction {
    /// Print fired markers and armed timers
    Show,
    /// Forget every fired marker and armed timer
    Clear,
}

pub fn run(action: LedgerAction) -> CliResult {
    let ledger = AlertLedger::new(Arc::new(Database::open()?));
    match action {
        LedgerAction::Show => {
            let fired: Vec<_> = ledger
                .fired_markers()?
                .into_iter()
                .map(|(key, occurrence)| json!({ "key": key, "occurrence": occurrence }))
                .collect();
            let mut armed = serde_json::Map::new();
            for boundary in Boundary::ALL {
                armed.insert(boundary.to_string(), json!(ledger.armed(boundary)?));
            }
            print_json(&json!({ "fired": fired, "armed": armed }))
        }
        LedgerAction::Clear => {
            let removed = ledger.clear()?;
            println!("cleared {removed} ledger keys");
            Ok(())
        }
    }
}
