//! U2F Core - ceremony state machine for a FIDO U2F demo client
//!
//! This crate drives the two ceremonies of a hardware security key demo:
//! registering a key, then signing a challenge with it. It owns the page
//! route, the per-ceremony state records, and the countdown shown while the
//! authenticator waits for a touch.
//!
//! # Features
//!
//! - Fragment routing (`#reg`, `#sig`, anything else is the landing page)
//! - Single-outcome device ceremonies behind the [`DeviceGateway`] trait
//! - Drift-tolerant countdown that tracks the ceremony deadline
//! - Parsing of raw U2F registration and signature messages
//! - Deterministic [`MockAuthenticator`] for tests and demos
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use u2f_core::{CeremonyConfig, CeremonyController, CeremonyOutcome, MockAuthenticator};
//!
//! # async fn example() -> u2f_core::Result<()> {
//! let device = Arc::new(MockAuthenticator::default());
//! let mut controller = CeremonyController::new(CeremonyConfig::default(), device)?;
//!
//! controller.on_hash_change("#reg");
//! controller.submit_registration()?;
//! let outcome = controller.settle().await?;
//! assert!(matches!(outcome, CeremonyOutcome::Completed(_)));
//!
//! controller.on_hash_change("#sig");
//! controller.submit_signing()?;
//! controller.settle().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod countdown;
pub mod error;
pub mod parser;
pub mod protocol;
pub mod route;
pub mod state;

#[cfg(feature = "runtime")]
pub mod controller;
#[cfg(feature = "runtime")]
pub mod gateway;

// Re-export main types for convenience
pub use config::CeremonyConfig;
pub use countdown::percent_remaining;
pub use error::{Result, U2fError};
pub use parser::{
    parse_client_data, parse_registration, parse_signature, ClientData, ParseError,
    ParsedRegistration, ParsedSignature,
};
pub use protocol::{
    AppId, CeremonyKind, DeviceResult, ErrorCode, RegisterRequest, RegisterResponse,
    RegisteredKey, SignResponse, U2F_V2,
};
pub use route::{ActiveView, NavItem, Route, RouteState};
pub use state::{RegistrationField, RegistrationState, SigningField, SigningState};

// Runtime-dependent exports (not available in Wasm)
#[cfg(feature = "runtime")]
pub use controller::{
    CeremonyController, CeremonyOutcome, Completion, ControllerSnapshot, Ticket, ViewEvent,
};
#[cfg(feature = "runtime")]
pub use countdown::CountdownTimer;
#[cfg(feature = "runtime")]
pub use gateway::{
    CompletionSlot, Completer, DeviceGateway, MockAuthenticator, MockBehavior, RecordedRequest,
};
