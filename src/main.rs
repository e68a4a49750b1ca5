//! hotkey-engine: replays input hook events through the hotkey engine
//!
//! Reads one JSON event per line from stdin, as an OS input hook would
//! deliver them, and answers each with a block decision on stdout:
//!
//! ```text
//! {"key":"CapsLock","pressed":true,"injected":false,"extra_info":0}
//! {"key":"CapsLock","pressed":true,"block":true}
//! ```
//!
//! Hotkeys come from the built-in profiles. Injected keys are logged
//! rather than sent anywhere.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hotkey_engine::lifecycle::ShutdownSignal;
use hotkey_engine::{
    Callback, Config, Decision, Engine, HAction, HotkeyBuilder, HotkeyProfile, Key, KeySender,
    RawInput, TriggerKey,
};

/// Logs injected keys instead of synthesizing them
struct LogSender;

impl KeySender for LogSender {
    fn send(&self, key: Key, pressed: bool) {
        debug!(%key, pressed, "inject");
    }
}

struct DemoProfile;

impl HotkeyProfile for DemoProfile {
    fn name(&self) -> &str {
        "demo"
    }

    fn create(&self, engine: &Engine) -> hotkey_engine::Result<()> {
        engine.create_hotkey(
            HotkeyBuilder::new(Key::H.with([Key::Ctrl, Key::Shift])).on_down(HAction::single(
                Callback::sync(|ctx| {
                    info!(id = ctx.hotkey_id(), "hello");
                    Ok(())
                }),
            )),
        )?;

        engine.create_hotkey(HotkeyBuilder::new(Key::CapsLock).on_down(HAction::hold(
            Duration::from_millis(300),
            Callback::sync(|_| {
                info!("caps lock tapped");
                Ok(())
            }),
            Callback::sync(|_| {
                info!("caps lock held");
                Ok(())
            }),
        )))?;

        engine.create_hotkey(HotkeyBuilder::new(Key::F1).on_down(HAction::double(
            Duration::from_millis(250),
            Callback::sync(|_| {
                info!("F1 pressed once");
                Ok(())
            }),
            Callback::sync(|_| {
                info!("F1 pressed twice");
                Ok(())
            }),
        )))?;

        engine.create_hotkey(
            HotkeyBuilder::new(TriggerKey::alt(Key::Space))
                .wild(false)
                .on_up(HAction::single(Callback::new(|ctx| async move {
                    let released = ctx
                        .engine()
                        .wait_key_up(Key::Alt, Some(Duration::from_secs(1)), false)
                        .await;
                    info!(released, "alt+space released");
                    Ok(())
                }))),
        )?;

        Ok(())
    }
}

struct DebugProfile;

impl HotkeyProfile for DebugProfile {
    fn name(&self) -> &str {
        "debug"
    }

    fn debug(&self) -> bool {
        true
    }

    fn create(&self, engine: &Engine) -> hotkey_engine::Result<()> {
        engine.create_hotkey(HotkeyBuilder::new(Key::F12).on_down(HAction::repeat(
            Callback::sync(|ctx| {
                debug!(iteration = ctx.iteration(), "F12 repeat");
                Ok(())
            }),
        )))?;

        engine.create_hotkey(
            HotkeyBuilder::new(Key::WheelUp.with([Key::Ctrl])).on_down(HAction::single(
                Callback::sync(|ctx| {
                    let history = ctx.engine().history();
                    debug!(recent = ?history.iter().take(5).collect::<Vec<_>>(), "input history");
                    Ok(())
                }),
            )),
        )?;

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hotkey-engine starting");

    let config = Config::load().context("failed to load configuration")?;
    info!(
        history_size = config.history_size,
        repeat_delay_ms = config.key_repeat_delay.as_millis() as u64,
        stateless_numpad = config.stateless_numpad,
        "configuration loaded"
    );

    let debug_profiles = config.debug_profiles;
    let engine = Engine::new(config);
    engine.set_key_sender(std::sync::Arc::new(LogSender));
    engine.set_fault_handler(|hotkey, fault| {
        warn!(id = hotkey.id(), trigger = %hotkey.trigger(), %fault, "hotkey action fault");
    });

    let profiles: Vec<Box<dyn HotkeyProfile>> = vec![Box::new(DemoProfile), Box::new(DebugProfile)];
    let loaded = engine.load_profiles(&profiles, debug_profiles)?;
    info!(profiles = loaded, hotkeys = engine.hotkey_count(), "hotkeys ready");

    let shutdown = ShutdownSignal::new();
    let mut input_rx = engine.subscribe();

    let outcome = tokio::select! {
        result = replay(&engine) => {
            if result.is_ok() {
                info!("input stream closed");
            }
            result
        }

        _ = async {
            loop {
                match input_rx.recv().await {
                    Ok(event) => debug!(%event, "input event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "input event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => Ok(()),

        result = shutdown.wait() => {
            info!("shutdown signal received");
            result.context("failed to register signal handlers")
        }
    };

    info!("shutting down...");
    engine.shutdown().await;
    info!("hotkey-engine stopped");

    if let Err(e) = &outcome {
        error!(?e, "hotkey-engine failed");
    }
    outcome
}

/// Feed stdin events through the engine, answering each with a decision.
///
/// Malformed lines are skipped; an engine consistency error is fatal.
async fn replay(engine: &Engine) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let raw: RawInput = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%e, line, "skipping malformed input");
                continue;
            }
        };

        let block = engine
            .record_input(raw.key, raw.pressed, raw.injected, raw.extra_info)
            .context("engine state is inconsistent")?;

        let decision = Decision {
            key: raw.key,
            pressed: raw.pressed,
            block,
        };
        let mut out = serde_json::to_vec(&decision)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    Ok(())
}
