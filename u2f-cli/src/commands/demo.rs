//! Demo command implementation.
//!
//! Walks the page the way a visitor would: open `#reg`, register, follow the
//! navigation to `#sig`, then sign with the key handle registration left in
//! the signing form.

use anyhow::Result;
use colored::Colorize;
use tracing::info;
use u2f_core::{CeremonyController, CeremonyOutcome};

use super::{register, sign};
use crate::utils::{self, Session};
use crate::DeviceArgs;

/// Execute the demo command.
pub async fn execute(device: DeviceArgs, quiet: bool) -> Result<()> {
    let Session {
        device: key,
        mut controller,
    } = utils::open_session(&device)?;
    let progress = !quiet && !device.json;

    // Registration page
    controller.on_hash_change("#reg");
    if progress {
        print_page(&controller);
    }
    controller.submit_registration()?;
    let outcome = utils::wait_for_device(&mut controller, progress).await?;

    let registration = controller.registration();
    match (&outcome, &registration.parsed_response) {
        (CeremonyOutcome::Completed(_), Some(parsed)) if !device.json => {
            register::report(&registration.relying_party_id, parsed, quiet);
        }
        (CeremonyOutcome::Completed(_), _) => {}
        _ => {
            if device.json {
                utils::print_json(&controller.snapshot())?;
            }
            return utils::ensure_completed(outcome);
        }
    }

    // Signing page, key handle carried over by the registration
    controller.on_hash_change("#sig");
    if progress {
        print_page(&controller);
    }
    info!(key_handle = %controller.signing().key_handle, "Signing with registered key");
    controller.submit_signing()?;
    let outcome = utils::wait_for_device(&mut controller, progress).await?;

    if device.json {
        utils::print_json(&controller.snapshot())?;
    } else if let (CeremonyOutcome::Completed(_), Some(parsed)) =
        (&outcome, &controller.signing().parsed_response)
    {
        sign::report(parsed, quiet);
    }

    info!(requests = key.requests().len(), "Demo finished");
    utils::ensure_completed(outcome)
}

/// Navigation bar and address of the current page.
fn print_page(controller: &CeremonyController) {
    let snapshot = controller.snapshot();
    let nav: Vec<String> = snapshot
        .nav
        .iter()
        .map(|item| {
            if item.active {
                format!("[{}]", item.label).bold().to_string()
            } else {
                format!(" {} ", item.label).dimmed().to_string()
            }
        })
        .collect();

    println!();
    println!(
        "{}  {}",
        format!("#{}", snapshot.fragment).cyan().bold(),
        nav.join(" ")
    );
}
