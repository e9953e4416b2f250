use std::path::Path;

use chrono::{Datelike, Weekday};
use serde_json::json;
use wristplan_core::progress;
use wristplan_core::resolver::{self, Occurrence};
use wristplan_core::{ScheduleEntry, WeekSchedule};

use super::{parse_at, print_json, CliResult, Host};

fn entry_json(entry: &ScheduleEntry) -> serde_json::Value {
    let total = progress::total(entry.start, entry.end);
    json!({
        "id": entry.id(),
        "name": entry.name,
        "window": entry.window_label(),
        "summary": format!("{} | {}", progress::format_duration(total), entry.window_label()),
        "habits": entry.habits,
        "spans_midnight": entry.spans_midnight(),
    })
}

pub fn status(at: Option<&str>) -> CliResult {
    let now = parse_at(at)?;
    let engine = Host::open()?.polling_engine()?;
    print_json(&engine.snapshot(now))
}

pub fn next(at: Option<&str>) -> CliResult {
    let now = parse_at(at)?;
    let schedule = Host::open()?.config.week_schedule()?;
    match resolver::resolve_next_with_offset(now.time(), now.weekday(), &schedule) {
        Some((entry, days_ahead)) => {
            let occ = Occurrence::upcoming(entry, now.date(), days_ahead);
            let mut value = entry_json(entry);
            value["days_ahead"] = json!(days_ahead);
            value["starts_at"] = json!(occ.start_at);
            print_json(&value)
        }
        None => print_json(&serde_json::Value::Null),
    }
}

pub fn day(weekday: &str) -> CliResult {
    let day: Weekday = weekday
        .parse()
        .map_err(|_| format!("unknown weekday '{weekday}'"))?;
    let schedule = Host::open()?.config.week_schedule()?;
    let entries: Vec<_> = schedule.timeline(day).into_iter().map(entry_json).collect();
    print_json(&entries)
}

pub fn validate(path: &Path) -> CliResult {
    let host_config = wristplan_core::Config::load_or_default();
    let schedule = WeekSchedule::load(path, host_config.schedule.sort_by)?;
    let days: serde_json::Map<String, serde_json::Value> = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .map(|day| (day.to_string(), json!(schedule.entries_for(day).len())))
    .collect();
    print_json(&json!({
        "valid": true,
        "groups": schedule.groups.len(),
        "entries": schedule.entry_count(),
        "days": days,
    }))
}

pub fn tick(at: Option<&str>) -> CliResult {
    let now = parse_at(at)?;
    let engine = Host::open()?.polling_engine()?;
    let out = engine.tick(now);
    print_json(&json!({
        "snapshot": out.snapshot,
        "events": out.events,
    }))
}
