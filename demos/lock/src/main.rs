//! Lock example binary
//!
//! Launches the session, locks it, types a wrong PIN, then the right one.

use anyhow::Context as _;
use automata_runtime::EngineConfig;
use futures::{Stream, StreamExt};
use lock::session::session;
use lock::{DisplayModel, LockConfig, LockEnvironment, LockScreen, Route, SessionEvent};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lock=debug,automata_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    automata_runtime::metrics::describe_metrics();

    println!("=== Lock Example: PIN entry on the automata engine ===\n");

    let config = LockConfig::from_env()?;
    tracing::info!(config = %serde_json::to_string(&config)?, "Loaded lock configuration");
    let engine_config = EngineConfig::from_env()?;

    let app = session(engine_config.clone())?;
    let mut routes = app.subscribe();

    app.handle(SessionEvent::Start)?;
    println!("Session route: {:?}", next(&mut routes).await?);

    app.handle(SessionEvent::Lock)?;
    println!("Session route: {:?}", next(&mut routes).await?);

    let environment = LockEnvironment::from_config(&config)?;
    let screen = LockScreen::with_config(&environment, engine_config)?;
    let mut display = screen.display_model();
    let mut unlock = screen.route();

    println!("\n>>> Typing a wrong PIN");
    let mut wrong: Vec<u8> = config.secret.iter().map(|digit| (digit + 1) % 10).collect();
    wrong.truncate(screen.pin_length());
    for digit in wrong {
        screen.tapped(digit)?;
    }
    wait_for_display(&mut display, |model| model.is_wrong_pin).await?;

    println!("\n>>> Shake finished, typing the right PIN");
    screen.finished_shake()?;
    for digit in &config.secret {
        screen.tapped(*digit)?;
    }

    let route = next(&mut unlock).await?;
    println!("Lock screen route: {route:?}");
    if route == (Route::MainUi { from_lock: true }) {
        app.handle(SessionEvent::Unlock)?;
    }
    println!("Session route: {:?}", next(&mut routes).await?);

    screen.engine().shutdown();
    app.shutdown();

    println!("\n=== Lock Example Complete ===");
    Ok(())
}

async fn next<S>(stream: &mut S) -> anyhow::Result<S::Item>
where
    S: Stream + Unpin,
{
    tokio::time::timeout(WAIT, stream.next())
        .await
        .context("timed out waiting for the engine")?
        .context("engine stopped")
}

async fn wait_for_display<S, F>(display: &mut S, done: F) -> anyhow::Result<()>
where
    S: Stream<Item = DisplayModel> + Unpin,
    F: Fn(&DisplayModel) -> bool,
{
    loop {
        let model = next(display).await?;
        println!("Display: {} dot(s){}", model.current_pin_length, if model.is_wrong_pin { ", wrong PIN" } else { "" });
        if done(&model) {
            return Ok(());
        }
    }
}
