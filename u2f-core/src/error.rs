use thiserror::Error;

use crate::protocol::CeremonyKind;

/// Errors surfaced by the ceremony controller and its configuration.
///
/// Device-level failures and parse failures are not represented here: they are
/// ceremony outcomes and are stored in the state records instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum U2fError {
    #[error("Invalid origin: {0}")]
    InvalidOrigin(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown field `{field}` for {record} state")]
    UnknownField { record: &'static str, field: String },

    #[error("A {0} ceremony is already in flight")]
    CeremonyInFlight(CeremonyKind),

    #[error("No ceremony is in flight")]
    NoCeremonyInFlight,

    #[error("Controller event loop closed")]
    EventLoopClosed,
}

pub type Result<T> = std::result::Result<T, U2fError>;
