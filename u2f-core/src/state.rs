//! Ceremony state records and their field-update functions.
//!
//! Records are replaced wholesale on every change. `with_field` returns a new
//! record that differs from the old one in exactly one field; no validation of
//! the value happens here.

use std::str::FromStr;

use serde::Serialize;

use crate::error::U2fError;
use crate::parser::{ParsedRegistration, ParsedSignature};
use crate::protocol::{AppId, DeviceResult, RegisterResponse, SignResponse};

pub const DEFAULT_REGISTRATION_CHALLENGE: &str = "LoooooooongRegisterChallenge";
pub const DEFAULT_SIGNING_CHALLENGE: &str = "SigningChallenge";

/// Editable fields of [`RegistrationState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationField {
    Challenge,
}

/// Editable fields of [`SigningState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningField {
    KeyHandle,
    Challenge,
}

impl FromStr for RegistrationField {
    type Err = U2fError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "challenge" => Ok(Self::Challenge),
            other => Err(U2fError::UnknownField {
                record: "registration",
                field: other.to_string(),
            }),
        }
    }
}

impl FromStr for SigningField {
    type Err = U2fError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "keyHandle" | "key_handle" => Ok(Self::KeyHandle),
            "challenge" => Ok(Self::Challenge),
            other => Err(U2fError::UnknownField {
                record: "signing",
                field: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationState {
    pub relying_party_id: AppId,
    pub challenge: String,
    pub response: Option<DeviceResult<RegisterResponse>>,
    pub parsed_response: Option<ParsedRegistration>,
}

impl RegistrationState {
    pub fn new(relying_party_id: AppId, challenge: impl Into<String>) -> Self {
        Self {
            relying_party_id,
            challenge: challenge.into(),
            response: None,
            parsed_response: None,
        }
    }

    pub fn with_field(&self, field: RegistrationField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        match field {
            RegistrationField::Challenge => next.challenge = value.into(),
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningState {
    pub relying_party_id: AppId,
    pub key_handle: String,
    pub challenge: String,
    pub response: Option<DeviceResult<SignResponse>>,
    pub parsed_response: Option<ParsedSignature>,
}

impl SigningState {
    pub fn new(relying_party_id: AppId, challenge: impl Into<String>) -> Self {
        Self {
            relying_party_id,
            key_handle: String::new(),
            challenge: challenge.into(),
            response: None,
            parsed_response: None,
        }
    }

    pub fn with_field(&self, field: SigningField, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        match field {
            SigningField::KeyHandle => next.key_handle = value.into(),
            SigningField::Challenge => next.challenge = value.into(),
        }
        next
    }

    /// Signing needs a key handle, copied from registration or typed in.
    pub fn has_key_handle(&self) -> bool {
        !self.key_handle.trim().is_empty()
    }
}
