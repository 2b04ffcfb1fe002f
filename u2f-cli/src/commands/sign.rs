//! Sign command implementation.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use tracing::warn;
use u2f_core::{CeremonyOutcome, ParsedSignature, Route};

use crate::utils::{self, Session};
use crate::DeviceArgs;

/// Execute the sign command.
pub async fn execute(
    key_handle: String,
    challenge: Option<String>,
    device: DeviceArgs,
    quiet: bool,
) -> Result<()> {
    let Session { mut controller, .. } = utils::open_session(&device)?;

    controller.navigate(Route::Signing);
    controller.update_signing("keyHandle", key_handle)?;
    if let Some(challenge) = challenge {
        controller.update_signing("challenge", challenge)?;
    }
    if !controller.signing().has_key_handle() {
        warn!("Empty key handle; the device will reject the request");
    }

    controller.submit_signing()?;
    let outcome = utils::wait_for_device(&mut controller, !quiet && !device.json).await?;

    let signing = controller.signing();
    if device.json {
        utils::print_json(signing)?;
    } else if let (CeremonyOutcome::Completed(_), Some(parsed)) =
        (&outcome, &signing.parsed_response)
    {
        report(parsed, quiet);
    }

    utils::ensure_completed(outcome)
}

/// Print a parsed signature. Quiet mode prints only the counter.
pub fn report(parsed: &ParsedSignature, quiet: bool) {
    if quiet {
        println!("{}", parsed.counter);
        return;
    }

    let presence = if parsed.user_presence {
        "verified".green()
    } else {
        "NOT verified".red()
    };

    println!();
    println!("{}", "Signing complete!".green().bold());
    println!();
    println!("   {} {}", "Key handle:".dimmed(), parsed.key_handle);
    println!("   {} {}", "User presence:".dimmed(), presence);
    println!("   {} {}", "Counter:".dimmed(), parsed.counter);
    println!(
        "   {} {}",
        "Signature:".dimmed(),
        utils::abbreviate(&parsed.signature, 16)
    );
    println!("   {} {}", "Challenge:".dimmed(), parsed.client_data.challenge);
    println!(
        "   {} {}",
        "Completed at:".dimmed(),
        utils::format_timestamp(Utc::now())
    );
}
