//! Parse command implementation.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::info;
use u2f_core::{parse_registration, parse_signature, DeviceResult, RegisterResponse, SignResponse};

use crate::utils;
use crate::ResponseKind;

/// Execute the parse command.
pub fn execute(kind: ResponseKind, input: PathBuf) -> Result<()> {
    match kind {
        ResponseKind::Registration => {
            let response = payload(utils::load_response::<RegisterResponse>(&input)?)?;
            let parsed = parse_registration(&response)
                .context("Failed to parse registration response")?;
            info!(key_handle = %parsed.key_handle, "Parsed registration");
            utils::print_json(&parsed)
        }
        ResponseKind::Signature => {
            let response = payload(utils::load_response::<SignResponse>(&input)?)?;
            let parsed =
                parse_signature(&response).context("Failed to parse signature response")?;
            info!(counter = parsed.counter, "Parsed signature");
            utils::print_json(&parsed)
        }
    }
}

fn payload<T>(result: DeviceResult<T>) -> Result<T> {
    match result {
        DeviceResult::Success(payload) => Ok(payload),
        DeviceResult::Error { error_code } => {
            bail!("Device error recorded in response: {error_code}")
        }
    }
}
