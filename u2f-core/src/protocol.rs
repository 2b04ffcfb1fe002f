//! FIDO U2F request and response descriptors.
//!
//! These mirror the JSON shapes exchanged with the browser's U2F API
//! (`u2f.register` / `u2f.sign`). Field names are camelCase on the wire.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::error::{Result, U2fError};

/// Protocol version tag sent with every request.
pub const U2F_V2: &str = "U2F_V2";

/// Which ceremony a request or completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyKind {
    Registration,
    Signing,
}

impl std::fmt::Display for CeremonyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Registration => write!(f, "registration"),
            Self::Signing => write!(f, "signing"),
        }
    }
}

/// Relying-party identifier (the U2F "app id").
///
/// Always the serialized origin of the page (`scheme://host[:port]`). It is
/// fixed configuration: user edits never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(String);

impl AppId {
    /// Derive the app id from a page URL or origin.
    pub fn from_origin(origin: &str) -> Result<Self> {
        let url = Url::parse(origin)
            .map_err(|e| U2fError::InvalidOrigin(format!("{origin}: {e}")))?;

        let origin = url.origin();
        if !origin.is_tuple() {
            return Err(U2fError::InvalidOrigin(format!(
                "{url} has an opaque origin"
            )));
        }

        Ok(Self(origin.ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the `registerRequests` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub challenge: String,
    pub version: String,
}

impl RegisterRequest {
    pub fn new(challenge: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
            version: U2F_V2.to_string(),
        }
    }
}

/// A previously registered credential, as passed to `sign`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredKey {
    pub key_handle: String,
    pub version: String,
}

impl RegisteredKey {
    pub fn new(key_handle: impl Into<String>) -> Self {
        Self {
            key_handle: key_handle.into(),
            version: U2F_V2.to_string(),
        }
    }
}

/// Successful registration payload (all binary fields websafe base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub registration_data: String,
    pub client_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Successful signing payload (all binary fields websafe base64).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignResponse {
    pub key_handle: String,
    pub signature_data: String,
    pub client_data: String,
}

/// Numeric status reported by the authenticator or browser layer.
///
/// Stored verbatim; unknown codes are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const OK: Self = Self(0);
    pub const OTHER_ERROR: Self = Self(1);
    pub const BAD_REQUEST: Self = Self(2);
    pub const CONFIGURATION_UNSUPPORTED: Self = Self(3);
    pub const DEVICE_INELIGIBLE: Self = Self(4);
    pub const TIMEOUT: Self = Self(5);

    /// Symbolic name for codes defined by the U2F JavaScript API.
    pub fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("OK"),
            1 => Some("OTHER_ERROR"),
            2 => Some("BAD_REQUEST"),
            3 => Some("CONFIGURATION_UNSUPPORTED"),
            4 => Some("DEVICE_INELIGIBLE"),
            5 => Some("TIMEOUT"),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({name})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Outcome of one device ceremony: a success payload or a device error code.
///
/// Serializes as the payload itself or as `{"errorCode": n}`. When reading
/// raw JSON, an absent or zero `errorCode` counts as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DeviceResult<T> {
    Error {
        #[serde(rename = "errorCode")]
        error_code: ErrorCode,
    },
    Success(T),
}

impl<T> DeviceResult<T> {
    pub fn error(code: ErrorCode) -> Self {
        Self::Error { error_code: code }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Error { error_code } => Some(*error_code),
            Self::Success(_) => None,
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for DeviceResult<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;

        match value.get("errorCode").and_then(serde_json::Value::as_u64) {
            Some(code) if code != 0 => {
                let code = u16::try_from(code).map_err(D::Error::custom)?;
                Ok(Self::error(ErrorCode(code)))
            }
            _ => serde_json::from_value(value)
                .map(Self::Success)
                .map_err(D::Error::custom),
        }
    }
}
