//! Channel to the physical authenticator.
//!
//! A [`DeviceGateway`] performs one ceremony per call and yields exactly one
//! [`DeviceResult`]. Gateways built on a callback API (such as the browser's
//! `u2f.register(..., callback, timeout)`) should route the callback through a
//! [`CompletionSlot`], which keeps the first delivery and drops the rest.
//!
//! - **MockAuthenticator** - deterministic simulated security key (testing and demos)

mod mock;

pub use mock::{MockAuthenticator, MockBehavior, RecordedRequest};

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::warn;

use crate::protocol::{
    AppId, DeviceResult, ErrorCode, RegisterRequest, RegisterResponse, RegisteredKey, SignResponse,
};

/// Trait for authenticator transports.
///
/// Implementations must be thread-safe (`Send + Sync`). The `timeout` is the
/// budget handed to the device; implementations report expiry as
/// [`ErrorCode::TIMEOUT`] rather than by never returning.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Register a new credential for `app_id`.
    async fn register(
        &self,
        app_id: &AppId,
        register_requests: &[RegisterRequest],
        registered_keys: &[RegisteredKey],
        timeout: Duration,
    ) -> DeviceResult<RegisterResponse>;

    /// Sign `challenge` with one of `registered_keys`.
    async fn sign(
        &self,
        app_id: &AppId,
        challenge: &str,
        registered_keys: &[RegisteredKey],
        timeout: Duration,
    ) -> DeviceResult<SignResponse>;
}

/// Receiving half of a single-outcome completion.
pub struct CompletionSlot<T> {
    rx: oneshot::Receiver<DeviceResult<T>>,
}

/// Callback half of a [`CompletionSlot`]. Cheap to clone into callbacks.
pub struct Completer<T> {
    tx: Arc<Mutex<Option<oneshot::Sender<DeviceResult<T>>>>>,
}

impl<T> Clone for Completer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> CompletionSlot<T> {
    pub fn new() -> (Completer<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (
            Completer {
                tx: Arc::new(Mutex::new(Some(tx))),
            },
            Self { rx },
        )
    }

    /// Wait for the first delivered outcome.
    ///
    /// If every completer is dropped without delivering, the ceremony is
    /// reported as [`ErrorCode::OTHER_ERROR`].
    pub async fn wait(self) -> DeviceResult<T> {
        self.rx.await.unwrap_or_else(|_| {
            warn!("Completion dropped without an outcome");
            DeviceResult::error(ErrorCode::OTHER_ERROR)
        })
    }
}

impl<T> Completer<T> {
    /// Deliver an outcome. Returns `false` if one was already delivered.
    pub fn complete(&self, outcome: DeviceResult<T>) -> bool {
        let sender = self
            .tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => {
                warn!("Ignoring duplicate device completion");
                false
            }
        }
    }
}
