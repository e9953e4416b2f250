//! Long-running face host.
//!
//! Render ticks come from a tokio interval; wake timers are tokio tasks whose
//! deliveries arrive on a channel and go to the scheduler's timer entry point.
//! Every event is printed as one JSON line.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use wristplan_core::{Event, TokioTimers};

use super::{CliResult, Host};

pub fn run(ticks: Option<u64>, snapshots: bool) -> CliResult {
    let host = Host::open()?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(host, ticks, snapshots))
}

fn emit(events: &[Event]) -> CliResult {
    for event in events {
        println!("{}", serde_json::to_string(event)?);
    }
    Ok(())
}

async fn watch(host: Host, ticks: Option<u64>, snapshots: bool) -> CliResult {
    let (timers, mut deliveries) = TokioTimers::channel()?;
    let engine = host.engine(Arc::new(timers))?;
    let mode = engine.alerts().settings().mode;

    let period = Duration::from_secs(host.config.tick_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    tracing::info!(?period, ?mode, "watch started");

    let mut count = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let out = engine.tick(Local::now().naive_local());
                emit(&out.events)?;
                if snapshots {
                    emit(&[Event::StateSnapshot { snapshot: out.snapshot }])?;
                }
                count += 1;
                if ticks.is_some_and(|limit| count >= limit) {
                    break;
                }
            }
            Some(payload) = deliveries.recv() => {
                emit(&engine.on_timer(&payload, Local::now().naive_local()))?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    emit(&engine.alerts().cancel_all())?;
    Ok(())
}
