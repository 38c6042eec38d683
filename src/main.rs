//! Rotary Control bench daemon
//!
//! Runs the rotary plugin against simulated hardware, an in-process mixer
//! and a logging player. The GPIO knob is bound to the configured
//! `clk`/`dt`/`sw` lines. Turns and presses are typed on stdin:
//! `+3` / `-2` turn the encoder, `p` presses the knob, `q` quits.

use rotary_control::bus::{self, BusEvent};
use rotary_control::config::{self, RotaryParams};
use rotary_control::controls::{LoggingPlayer, SoftwareMixer};
use rotary_control::hardware::sim::{SimulatedBreakout, SimulatedDisplay, SimulatedPins};
use rotary_control::rotary::{Dispatcher, RotaryController};

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Turn(i32),
    Press,
    Quit,
}

fn parse_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim() {
        "p" | "press" => Some(ConsoleCommand::Press),
        "q" | "quit" => Some(ConsoleCommand::Quit),
        other => other.parse::<i32>().ok().map(ConsoleCommand::Turn),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rotary_control=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rotary Control v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = config::load_settings()?;
    let params = RotaryParams::from_params(&settings.params);

    let bus = bus::create_bus();
    let mut events = bus.subscribe();

    let dispatcher = Dispatcher::new(params.step, bus.clone())
        .with_volume_control(Arc::new(SoftwareMixer::new(settings.initial_volume)))
        .with_player_control(Arc::new(LoggingPlayer::new()));

    let breakout = SimulatedBreakout::new(settings.board.i2c_addr);
    let channel = settings.board.encoder_channel;
    let controller = RotaryController::new(
        settings.board.clone(),
        breakout.clone(),
        SimulatedDisplay::new(),
        dispatcher,
    )?;
    let pins = SimulatedPins::new(params.knob_lines())?;

    let shutdown = CancellationToken::new();
    let handle = controller.spawn_with_knob(pins.clone(), shutdown)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let signal = shutdown_signal();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            _ = &mut signal => break,
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => match parse_command(&line) {
                    Some(ConsoleCommand::Turn(ticks)) => breakout.turn(channel, ticks),
                    Some(ConsoleCommand::Press) => pins.press(),
                    Some(ConsoleCommand::Quit) => break,
                    None => tracing::warn!("Unknown command: {:?}", line),
                },
                None => stdin_open = false,
            },
            event = events.recv() => match event {
                Ok(BusEvent::ControllerStopped { reason }) => {
                    tracing::warn!("Controller stopped: {}", reason);
                    break;
                }
                Ok(event) => tracing::debug!("Bus event: {}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(n)) => tracing::warn!("Bus subscriber lagged by {} events", n),
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Stopping rotary controller...");
    tokio::task::spawn_blocking(move || handle.stop()).await??;
    tracing::info!("Shutdown complete");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("+3"), Some(ConsoleCommand::Turn(3)));
        assert_eq!(parse_command(" -2 "), Some(ConsoleCommand::Turn(-2)));
        assert_eq!(parse_command("p"), Some(ConsoleCommand::Press));
        assert_eq!(parse_command("quit"), Some(ConsoleCommand::Quit));
        assert_eq!(parse_command("louder"), None);
    }
}
