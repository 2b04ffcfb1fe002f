//! Register command implementation.

use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use u2f_core::{AppId, CeremonyOutcome, ParsedRegistration, Route};

use crate::utils::{self, Session};
use crate::DeviceArgs;

/// Execute the register command.
pub async fn execute(challenge: Option<String>, device: DeviceArgs, quiet: bool) -> Result<()> {
    let Session { mut controller, .. } = utils::open_session(&device)?;

    controller.navigate(Route::Registration);
    if let Some(challenge) = challenge {
        controller.update_registration("challenge", challenge)?;
    }

    controller.submit_registration()?;
    let outcome = utils::wait_for_device(&mut controller, !quiet && !device.json).await?;

    let registration = controller.registration();
    if device.json {
        utils::print_json(registration)?;
    } else if let (CeremonyOutcome::Completed(_), Some(parsed)) =
        (&outcome, &registration.parsed_response)
    {
        report(&registration.relying_party_id, parsed, quiet);
    }

    utils::ensure_completed(outcome)
}

/// Print a parsed registration. Quiet mode prints only the key handle.
pub fn report(app_id: &AppId, parsed: &ParsedRegistration, quiet: bool) {
    if quiet {
        println!("{}", parsed.key_handle);
        return;
    }

    println!();
    println!("{}", "Registration complete!".green().bold());
    println!();
    println!("   {} {}", "App id:".dimmed(), app_id);
    println!("   {} {}", "Key handle:".dimmed(), parsed.key_handle);
    println!(
        "   {} {}",
        "Public key:".dimmed(),
        utils::abbreviate(&parsed.public_key, 16)
    );
    println!(
        "   {} {} bytes",
        "Attestation:".dimmed(),
        parsed.attestation_certificate.len() / 2
    );
    println!("   {} {}", "Challenge:".dimmed(), parsed.client_data.challenge);
    println!(
        "   {} {}",
        "Completed at:".dimmed(),
        utils::format_timestamp(Utc::now())
    );
}
