//! Ceremony configuration.
//!
//! Loaded from environment variables with sensible defaults.

use std::time::Duration;

use crate::error::{Result, U2fError};
use crate::protocol::AppId;
use crate::state::{DEFAULT_REGISTRATION_CHALLENGE, DEFAULT_SIGNING_CHALLENGE};

/// Ceremony configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CeremonyConfig {
    /// Page origin the relying-party id is derived from (default: http://localhost:8080)
    pub origin: String,
    /// Device ceremony budget (default: 30s)
    pub budget: Duration,
    /// Countdown tick interval (default: 1s)
    pub tick: Duration,
    /// Initial registration challenge
    pub registration_challenge: String,
    /// Initial signing challenge
    pub signing_challenge: String,
    /// Extra wait past the budget before a silent gateway is treated as timed out
    pub completion_grace: Duration,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            budget: Duration::from_secs(30),
            tick: Duration::from_millis(1000),
            registration_challenge: DEFAULT_REGISTRATION_CHALLENGE.to_string(),
            signing_challenge: DEFAULT_SIGNING_CHALLENGE.to_string(),
            completion_grace: Duration::from_secs(5),
        }
    }
}

impl CeremonyConfig {
    /// Load configuration from environment variables.
    ///
    /// - `U2F_ORIGIN` - page origin
    /// - `U2F_TIMEOUT_SECS` - ceremony budget in seconds
    /// - `U2F_TICK_MS` - countdown tick in milliseconds
    /// - `U2F_REGISTER_CHALLENGE` / `U2F_SIGN_CHALLENGE` - initial challenges
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let origin = std::env::var("U2F_ORIGIN").unwrap_or(defaults.origin);

        let budget = std::env::var("U2F_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.budget);

        let tick = std::env::var("U2F_TICK_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.tick);

        let registration_challenge = std::env::var("U2F_REGISTER_CHALLENGE")
            .unwrap_or(defaults.registration_challenge);
        let signing_challenge =
            std::env::var("U2F_SIGN_CHALLENGE").unwrap_or(defaults.signing_challenge);

        let config = Self {
            origin,
            budget,
            tick,
            registration_challenge,
            signing_challenge,
            completion_grace: defaults.completion_grace,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.budget.is_zero() {
            return Err(U2fError::InvalidConfig("budget must be > 0".into()));
        }
        if self.tick.is_zero() {
            return Err(U2fError::InvalidConfig("tick must be > 0".into()));
        }
        self.app_id().map(|_| ())
    }

    /// Relying-party id derived from the configured origin.
    pub fn app_id(&self) -> Result<AppId> {
        AppId::from_origin(&self.origin)
    }

    /// Budget in whole seconds, rounded down but never below 1. Only used
    /// for logging; the device receives `budget` itself.
    pub fn budget_secs(&self) -> u64 {
        self.budget.as_secs().max(1)
    }
}
