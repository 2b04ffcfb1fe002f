//! Simulated U2F security key for testing and demos.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sha3::{Digest, Sha3_256};
use tracing::{debug, info};

use super::{CompletionSlot, DeviceGateway};
use crate::parser::{websafe_decode, websafe_encode};
use crate::protocol::{
    AppId, DeviceResult, ErrorCode, RegisterRequest, RegisterResponse, RegisteredKey,
    SignResponse, U2F_V2,
};

const ENROLL_TYP: &str = "navigator.id.finishEnrollment";
const SIGN_TYP: &str = "navigator.id.getAssertion";

/// How the simulated key answers a ceremony.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockBehavior {
    /// Produce a well-formed response after the configured latency.
    Succeed,
    /// Report a device-level error code.
    Fail(ErrorCode),
    /// Succeed, but with a payload that cannot be parsed.
    Garbage,
    /// Never answer (the user walked away). Ends in `TIMEOUT` once the
    /// budget runs out.
    Hang,
    /// Fire the completion callback twice: a success, then an error.
    DoubleFire,
}

/// A request the mock received, for assertions in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub app_id: String,
    pub challenge: String,
    pub key_handles: Vec<String>,
    pub versions: Vec<String>,
    pub timeout: Duration,
}

/// Mock authenticator with deterministic key material.
/// WARNING: Do not use in production - keys are derived from a fixed seed!
pub struct MockAuthenticator {
    seed: u64,
    latency: Duration,
    default_behavior: MockBehavior,
    scripted: Mutex<VecDeque<MockBehavior>>,
    counter: AtomicU32,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockAuthenticator {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            latency: Duration::from_millis(1500),
            default_behavior: MockBehavior::Succeed,
            scripted: Mutex::new(VecDeque::new()),
            counter: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock with default seed for simple tests.
    pub fn default_test() -> Self {
        Self::new(0xDEADBEEF_CAFEBABE)
    }

    /// Time the simulated user takes to touch the key.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Behavior used when nothing is scripted.
    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.default_behavior = behavior;
        self
    }

    /// Queue a behavior for the next ceremony only.
    pub fn script(&self, behavior: MockBehavior) {
        lock(&self.scripted).push_back(behavior);
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Key handle this device issues for `app_id`, websafe base64.
    pub fn key_handle_for(&self, app_id: &AppId) -> String {
        websafe_encode(self.key_handle_bytes(app_id))
    }

    fn next_behavior(&self) -> MockBehavior {
        lock(&self.scripted)
            .pop_front()
            .unwrap_or_else(|| self.default_behavior.clone())
    }

    fn record(&self, request: RecordedRequest) {
        lock(&self.requests).push(request);
    }

    fn derive(&self, label: &[u8], input: &[u8]) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(label);
        hasher.update(input);

        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    fn key_handle_bytes(&self, app_id: &AppId) -> [u8; 32] {
        self.derive(b"u2f-mock-key-handle", app_id.as_str().as_bytes())
    }

    fn registration_data(&self, app_id: &AppId, challenge: &str) -> Vec<u8> {
        let key_handle = self.key_handle_bytes(app_id);

        let mut data = vec![0x05, 0x04];
        data.extend_from_slice(&self.derive(b"u2f-mock-public-x", &key_handle));
        data.extend_from_slice(&self.derive(b"u2f-mock-public-y", &key_handle));
        data.push(key_handle.len() as u8);
        data.extend_from_slice(&key_handle);

        // Attestation "certificate": a DER SEQUENCE of 64 opaque bytes
        data.extend_from_slice(&[0x30, 0x40]);
        data.extend_from_slice(&self.derive(b"u2f-mock-cert-0", &[]));
        data.extend_from_slice(&self.derive(b"u2f-mock-cert-1", &[]));

        data.extend_from_slice(&self.signature(challenge.as_bytes()));
        data
    }

    fn signature_data(&self, challenge: &str, counter: u32) -> Vec<u8> {
        let mut data = vec![0x01];
        data.extend_from_slice(&counter.to_be_bytes());
        data.extend_from_slice(&self.signature(challenge.as_bytes()));
        data
    }

    fn signature(&self, message: &[u8]) -> Vec<u8> {
        let mut sig = vec![0x30, 0x20];
        sig.extend_from_slice(&self.derive(b"u2f-mock-signature", message));
        sig
    }

    async fn touch(&self, behavior: &MockBehavior, timeout: Duration) -> Option<ErrorCode> {
        match behavior {
            MockBehavior::Hang => {
                tokio::time::sleep(timeout).await;
                Some(ErrorCode::TIMEOUT)
            }
            _ if self.latency > timeout => {
                tokio::time::sleep(timeout).await;
                Some(ErrorCode::TIMEOUT)
            }
            _ => {
                tokio::time::sleep(self.latency).await;
                match behavior {
                    MockBehavior::Fail(code) => Some(*code),
                    _ => None,
                }
            }
        }
    }

    /// Deliver `success` through a callback that fires twice.
    async fn double_fire<T: Send + 'static>(success: DeviceResult<T>) -> DeviceResult<T> {
        let (completer, slot) = CompletionSlot::new();
        let late = completer.clone();
        tokio::spawn(async move {
            completer.complete(success);
            late.complete(DeviceResult::error(ErrorCode::OTHER_ERROR));
        });
        slot.wait().await
    }
}

impl Default for MockAuthenticator {
    fn default() -> Self {
        Self::default_test()
    }
}

#[async_trait]
impl DeviceGateway for MockAuthenticator {
    async fn register(
        &self,
        app_id: &AppId,
        register_requests: &[RegisterRequest],
        registered_keys: &[RegisteredKey],
        timeout: Duration,
    ) -> DeviceResult<RegisterResponse> {
        let behavior = self.next_behavior();
        let challenge = register_requests
            .first()
            .map(|r| r.challenge.clone())
            .unwrap_or_default();
        self.record(RecordedRequest {
            app_id: app_id.to_string(),
            challenge: challenge.clone(),
            key_handles: registered_keys.iter().map(|k| k.key_handle.clone()).collect(),
            versions: register_requests.iter().map(|r| r.version.clone()).collect(),
            timeout,
        });
        debug!(behavior = ?behavior, "Mock registration requested");

        if !register_requests.iter().any(|r| r.version == U2F_V2) {
            return DeviceResult::error(ErrorCode::BAD_REQUEST);
        }
        if let Some(code) = self.touch(&behavior, timeout).await {
            return DeviceResult::error(code);
        }

        let response = RegisterResponse {
            registration_data: match behavior {
                MockBehavior::Garbage => websafe_encode(b"\x00not a registration"),
                _ => websafe_encode(self.registration_data(app_id, &challenge)),
            },
            client_data: client_data(ENROLL_TYP, &challenge, app_id),
            version: Some(U2F_V2.to_string()),
        };
        info!("Mock registration completed");

        if behavior == MockBehavior::DoubleFire {
            return Self::double_fire(DeviceResult::Success(response)).await;
        }
        DeviceResult::Success(response)
    }

    async fn sign(
        &self,
        app_id: &AppId,
        challenge: &str,
        registered_keys: &[RegisteredKey],
        timeout: Duration,
    ) -> DeviceResult<SignResponse> {
        let behavior = self.next_behavior();
        self.record(RecordedRequest {
            app_id: app_id.to_string(),
            challenge: challenge.to_string(),
            key_handles: registered_keys.iter().map(|k| k.key_handle.clone()).collect(),
            versions: registered_keys.iter().map(|k| k.version.clone()).collect(),
            timeout,
        });
        debug!(behavior = ?behavior, "Mock signing requested");

        let own_handle = self.key_handle_bytes(app_id);
        let mut decodable = false;
        let mut matched = None;
        for key in registered_keys {
            if let Ok(bytes) = websafe_decode("keyHandle", &key.key_handle) {
                if bytes.is_empty() {
                    continue;
                }
                decodable = true;
                if bytes == own_handle && key.version == U2F_V2 {
                    matched = Some(key.key_handle.clone());
                }
            }
        }

        if !decodable {
            return DeviceResult::error(ErrorCode::BAD_REQUEST);
        }
        if let Some(code) = self.touch(&behavior, timeout).await {
            return DeviceResult::error(code);
        }
        let Some(key_handle) = matched else {
            return DeviceResult::error(ErrorCode::DEVICE_INELIGIBLE);
        };

        let counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let response = SignResponse {
            key_handle,
            signature_data: match behavior {
                MockBehavior::Garbage => websafe_encode([0x01]),
                _ => websafe_encode(self.signature_data(challenge, counter)),
            },
            client_data: client_data(SIGN_TYP, challenge, app_id),
        };
        info!(counter, "Mock signing completed");

        if behavior == MockBehavior::DoubleFire {
            return Self::double_fire(DeviceResult::Success(response)).await;
        }
        DeviceResult::Success(response)
    }
}

fn client_data(typ: &str, challenge: &str, app_id: &AppId) -> String {
    websafe_encode(
        serde_json::json!({
            "typ": typ,
            "challenge": challenge,
            "origin": app_id.as_str(),
        })
        .to_string(),
    )
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
