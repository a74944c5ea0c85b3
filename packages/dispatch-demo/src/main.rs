//! Dispatch Demo
//!
//! Starts a dispatcher with one handler per sample type, feeds it a cycling
//! stream of A/B/C events, then stops it and prints per-type statistics.

mod config;
mod events;
mod handlers;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use event_dispatcher::{Dispatcher, EventType, FanoutMode};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::events::{SamplePayload, SampleType};
use crate::handlers::{HandlerA, HandlerB, HandlerC};

/// Feed sample events through the typed event dispatcher
#[derive(Parser, Debug)]
#[command(name = "dispatch-demo", version, about)]
struct Args {
    /// Number of events to generate [env: DISPATCH_EVENTS, default: 10]
    #[arg(short = 'n', long)]
    events: Option<u64>,

    /// Milliseconds to sleep between events [env: DISPATCH_INTERVAL_MS, default: 100]
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Fan-out mode: concurrent or serialized [env: DISPATCH_FANOUT]
    #[arg(short, long)]
    fanout: Option<FanoutMode>,
}

impl Args {
    fn apply(self, mut config: Config) -> Config {
        if let Some(events) = self.events {
            config.events = events;
        }
        if let Some(ms) = self.interval_ms {
            config.interval = Duration::from_millis(ms);
        }
        if let Some(fanout) = self.fanout {
            config.fanout = fanout;
        }
        config
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,event_dispatcher=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true),
        )
        .init();

    let args = Args::parse();
    let config = args.apply(Config::from_env().context("Failed to load configuration")?);
    tracing::info!(
        events = config.events,
        interval_ms = config.interval.as_millis() as u64,
        fanout = %config.fanout,
        "Starting dispatch demo"
    );

    let dispatcher = Dispatcher::<SamplePayload>::builder()
        .fanout(config.fanout)
        .build();
    dispatcher.start().context("Failed to start dispatcher")?;

    let handler_a = Arc::new(HandlerA::default());
    let handler_b = Arc::new(HandlerB::default());
    let handler_c = Arc::new(HandlerC::default());
    dispatcher.register_shared(SampleType::A, handler_a.clone());
    dispatcher.register_shared(SampleType::B, handler_b.clone());
    dispatcher.register_shared(SampleType::C, handler_c.clone());

    produce(&dispatcher, &config);
    dispatcher.stop();

    tracing::info!(
        a = handler_a.handled(),
        b = handler_b.handled(),
        c = handler_c.handled(),
        "Dispatch demo finished"
    );

    print_stats(&dispatcher);
    Ok(())
}

/// Enqueue `config.events` sample events, pausing `config.interval` after each.
fn produce(dispatcher: &Dispatcher<SamplePayload>, config: &Config) {
    for i in 0..config.events {
        dispatcher.add_event(SamplePayload::nth(i));
        if !config.interval.is_zero() {
            thread::sleep(config.interval);
        }
    }
}

fn print_stats(dispatcher: &Dispatcher<SamplePayload>) {
    println!();
    println!(
        "{:<6} {:>9} {:>11} {:>10} {:>9} {:>9}",
        "type", "enqueued", "dispatched", "discarded", "rejected", "handlers"
    );
    for &event_type in SampleType::all() {
        let stats = dispatcher.stats(event_type);
        println!(
            "{:<6} {:>9} {:>11} {:>10} {:>9} {:>9}",
            event_type.name(),
            stats.enqueued,
            stats.dispatched,
            stats.discarded,
            stats.rejected,
            dispatcher.handler_count(event_type)
        );
    }
}
