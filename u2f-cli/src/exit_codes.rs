//! Exit codes following sysexits.h conventions.
//!
//! These codes let scripts tell a rejected invocation apart from a device
//! that answered with an error code or a response that could not be parsed.

use u2f_core::{ParseError, U2fError};

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments, origin or field name).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (malformed response JSON or message bytes).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// The authenticator answered with an error code (including TIMEOUT).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const DEVICE_ERROR: i32 = 69;

/// I/O error (stdin or stdout).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Typed causes first, then classify by message
        let code = if err
            .chain()
            .any(|e| e.is::<ParseError>() || e.is::<serde_json::Error>())
        {
            DATA_ERROR
        } else if let Some(e) = err.chain().find_map(|e| e.downcast_ref::<U2fError>()) {
            match e {
                U2fError::InvalidOrigin(_)
                | U2fError::InvalidConfig(_)
                | U2fError::UnknownField { .. } => USAGE_ERROR,
                _ => GENERAL_ERROR,
            }
        } else if message.contains("Device error") {
            DEVICE_ERROR
        } else if message.contains("Failed to read stdin") || message.contains("Failed to write")
        {
            IO_ERROR
        } else if message.contains("Failed to read") {
            INPUT_ERROR
        } else {
            GENERAL_ERROR
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn test_parse_error_is_data_error() {
        let err = anyhow::Error::new(ParseError::EmptySignature).context("Failed to parse");
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);
    }

    #[test]
    fn test_bad_origin_is_usage_error() {
        let err: anyhow::Error = U2fError::InvalidOrigin("nope".into()).into();
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);
    }

    #[test]
    fn test_message_classification() {
        let device = anyhow!("Device error: 5 (TIMEOUT)");
        assert_eq!(ExitCode::from_anyhow(&device).code, DEVICE_ERROR);

        let missing: anyhow::Result<()> =
            Err(std::io::Error::from(std::io::ErrorKind::NotFound)).context("Failed to read x.json");
        assert_eq!(ExitCode::from_anyhow(&missing.unwrap_err()).code, INPUT_ERROR);

        let stdin = anyhow!("Failed to read stdin");
        assert_eq!(ExitCode::from_anyhow(&stdin).code, IO_ERROR);

        let other = anyhow!("something else");
        let exit = ExitCode::from_anyhow(&other);
        assert_eq!(exit.code, GENERAL_ERROR);
        assert_eq!(exit.message.as_deref(), Some("something else"));
    }
}
