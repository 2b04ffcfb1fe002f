//! Common utility functions shared across CLI commands.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use u2f_core::{
    CeremonyConfig, CeremonyController, CeremonyOutcome, DeviceResult, ErrorCode,
    MockAuthenticator, MockBehavior,
};

use crate::DeviceArgs;

/// A controller wired to a simulated key.
pub struct Session {
    pub device: Arc<MockAuthenticator>,
    pub controller: CeremonyController,
}

/// Environment configuration with command-line overrides applied.
pub fn build_config(args: &DeviceArgs) -> Result<CeremonyConfig> {
    let mut config = CeremonyConfig::from_env()?;

    if let Some(origin) = &args.origin {
        config.origin = origin.clone();
    }
    if let Some(secs) = args.timeout_secs {
        config.budget = Duration::from_secs(secs);
    }
    config.validate()?;

    debug!(
        origin = %config.origin,
        budget_secs = config.budget_secs(),
        "Loaded configuration"
    );
    Ok(config)
}

/// Build the simulated key and the controller driving it.
///
/// `--fail` and `--hang` apply to the first ceremony only.
pub fn open_session(args: &DeviceArgs) -> Result<Session> {
    let config = build_config(args)?;

    let device = Arc::new(
        MockAuthenticator::new(args.seed).with_latency(Duration::from_millis(args.latency_ms)),
    );
    if let Some(code) = args.fail {
        device.script(MockBehavior::Fail(ErrorCode(code)));
    } else if args.hang {
        device.script(MockBehavior::Hang);
    }

    let controller = CeremonyController::new(config, device.clone())?;
    Ok(Session { device, controller })
}

/// Wait for the ceremony in flight, drawing the countdown on stderr.
pub async fn wait_for_device(
    controller: &mut CeremonyController,
    show_progress: bool,
) -> Result<CeremonyOutcome> {
    let mut countdown = controller.subscribe_countdown();
    if show_progress {
        draw_countdown(*countdown.borrow_and_update());
    }

    let settle = controller.settle();
    tokio::pin!(settle);

    let outcome = loop {
        tokio::select! {
            outcome = &mut settle => break outcome?,
            Ok(()) = countdown.changed(), if show_progress => {
                draw_countdown(*countdown.borrow_and_update());
            }
        }
    };

    if show_progress {
        eprintln!();
    }
    Ok(outcome)
}

fn draw_countdown(percent: u8) {
    let filled = usize::from(percent.min(100)) / 5;
    let bar = format!("{}{}", "#".repeat(filled), ".".repeat(20 - filled));
    eprint!(
        "\r   {} [{}] {:>3}%",
        "Touch your security key".yellow(),
        bar,
        percent
    );
    let _ = std::io::stderr().flush();
}

/// Turn a non-success outcome into an error for the exit code.
pub fn ensure_completed(outcome: CeremonyOutcome) -> Result<()> {
    match outcome {
        CeremonyOutcome::Completed(kind) => {
            info!(%kind, "Ceremony completed");
            Ok(())
        }
        CeremonyOutcome::DeviceError { kind, code } => {
            bail!("Device error during {kind}: {code}")
        }
        CeremonyOutcome::Unparsed { kind, error } => {
            Err(anyhow::Error::new(error).context(format!("Failed to parse {kind} response")))
        }
    }
}

/// Load a raw device response from a file, or stdin for `-`.
pub fn load_response<T: DeserializeOwned>(input: &Path) -> Result<DeviceResult<T>> {
    let raw = if input == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read response file: {}", input.display()))?
    };

    debug!(bytes = raw.len(), "Read response");
    serde_json::from_str(&raw).context("Failed to decode response JSON")
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("Failed to write output")?;
    Ok(())
}

/// First `len` characters of a long hex or base64 value.
pub fn abbreviate(value: &str, len: usize) -> String {
    if value.chars().count() <= len {
        return value.to_string();
    }
    let head: String = value.chars().take(len).collect();
    format!("{head}...")
}

/// Format a UTC instant as a human-readable string.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
