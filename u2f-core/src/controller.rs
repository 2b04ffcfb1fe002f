//! Ceremony controller.
//!
//! Owns the route, both ceremony records and the countdown. Views get
//! read-only [`ControllerSnapshot`]s and talk back with [`ViewEvent`]s.
//!
//! Device calls run on spawned tasks and report back through a completion
//! channel, so the controller stays responsive (route changes, field edits)
//! while a ceremony is outstanding. Every state change happens on the task
//! that owns the controller.
//!
//! ```no_run
//! use std::sync::Arc;
//! use u2f_core::{CeremonyConfig, CeremonyController, MockAuthenticator};
//!
//! # async fn example() -> u2f_core::Result<()> {
//! let gateway = Arc::new(MockAuthenticator::default());
//! let mut controller = CeremonyController::new(CeremonyConfig::default(), gateway)?;
//!
//! controller.on_hash_change("#reg");
//! controller.submit_registration()?;
//! controller.settle().await?;
//!
//! // The key handle was copied over for the signing ceremony
//! assert!(controller.signing().has_key_handle());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::CeremonyConfig;
use crate::countdown::CountdownTimer;
use crate::error::{Result, U2fError};
use crate::gateway::DeviceGateway;
use crate::parser::{parse_registration, parse_signature, ParseError};
use crate::protocol::{
    AppId, CeremonyKind, DeviceResult, ErrorCode, RegisterRequest, RegisterResponse,
    RegisteredKey, SignResponse,
};
use crate::route::{ActiveView, NavItem, Route, RouteState};
use crate::state::{RegistrationField, RegistrationState, SigningField, SigningState};

/// Identifies one issued ceremony request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Ticket(u64);

/// Raw completion of a device request, as delivered by the ceremony task.
#[derive(Debug, Clone)]
pub enum Completion {
    Registration {
        ticket: Ticket,
        result: DeviceResult<RegisterResponse>,
    },
    Signing {
        ticket: Ticket,
        result: DeviceResult<SignResponse>,
    },
}

impl Completion {
    fn kind_and_ticket(&self) -> (CeremonyKind, Ticket) {
        match self {
            Self::Registration { ticket, .. } => (CeremonyKind::Registration, *ticket),
            Self::Signing { ticket, .. } => (CeremonyKind::Signing, *ticket),
        }
    }
}

/// What an applied completion did to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CeremonyOutcome {
    /// Payload stored and parsed.
    Completed(CeremonyKind),
    /// Device reported an error code.
    DeviceError { kind: CeremonyKind, code: ErrorCode },
    /// Payload stored, but it could not be parsed.
    Unparsed {
        kind: CeremonyKind,
        error: ParseError,
    },
}

/// Events emitted by the view shells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    HashChange(String),
    Navigate(Route),
    UpdateRegistration { field: String, value: String },
    UpdateSigning { field: String, value: String },
    SubmitRegistration,
    SubmitSigning,
}

/// Read-only view of the controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerSnapshot {
    pub route: Route,
    pub fragment: String,
    pub view: ActiveView,
    pub nav: Vec<NavItem>,
    pub registration: RegistrationState,
    pub signing: SigningState,
    /// Countdown percentage, 0 when idle.
    pub timeout: u8,
    pub in_flight: Vec<CeremonyKind>,
}

pub struct CeremonyController {
    config: CeremonyConfig,
    app_id: AppId,
    gateway: Arc<dyn DeviceGateway>,
    route: RouteState,
    registration: RegistrationState,
    signing: SigningState,
    countdown: CountdownTimer,
    registration_in_flight: Option<Ticket>,
    signing_in_flight: Option<Ticket>,
    next_ticket: u64,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    snapshots: watch::Sender<ControllerSnapshot>,
}

impl CeremonyController {
    /// Create a controller. The relying-party id is derived from
    /// `config.origin` here and never changes afterwards.
    pub fn new(config: CeremonyConfig, gateway: Arc<dyn DeviceGateway>) -> Result<Self> {
        config.validate()?;
        let app_id = config.app_id()?;

        let registration = RegistrationState::new(app_id.clone(), &config.registration_challenge);
        let signing = SigningState::new(app_id.clone(), &config.signing_challenge);
        let countdown = CountdownTimer::new(config.tick);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let route = RouteState::default();
        let initial = ControllerSnapshot {
            route: route.route(),
            fragment: route.displayed_fragment().to_string(),
            view: route.route().active_view(),
            nav: route.route().nav_items(),
            registration: registration.clone(),
            signing: signing.clone(),
            timeout: 0,
            in_flight: Vec::new(),
        };
        let (snapshots, _) = watch::channel(initial);

        info!(app_id = %app_id, "Ceremony controller created");

        Ok(Self {
            config,
            app_id,
            gateway,
            route,
            registration,
            signing,
            countdown,
            registration_in_flight: None,
            signing_in_flight: None,
            next_ticket: 0,
            completions_tx,
            completions_rx,
            snapshots,
        })
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn route(&self) -> Route {
        self.route.route()
    }

    pub fn displayed_fragment(&self) -> &str {
        self.route.displayed_fragment()
    }

    pub fn registration(&self) -> &RegistrationState {
        &self.registration
    }

    pub fn signing(&self) -> &SigningState {
        &self.signing
    }

    /// Countdown percentage (0 when no ceremony is being timed).
    pub fn timeout(&self) -> u8 {
        self.countdown.percent()
    }

    pub fn is_in_flight(&self, kind: CeremonyKind) -> bool {
        self.in_flight_slot(kind).is_some()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        let route = self.route.route();
        ControllerSnapshot {
            route,
            fragment: self.route.displayed_fragment().to_string(),
            view: route.active_view(),
            nav: route.nav_items(),
            registration: self.registration.clone(),
            signing: self.signing.clone(),
            timeout: self.countdown.percent(),
            in_flight: [CeremonyKind::Registration, CeremonyKind::Signing]
                .into_iter()
                .filter(|&kind| self.is_in_flight(kind))
                .collect(),
        }
    }

    /// Snapshots republished after every state change (and countdown tick
    /// while [`run`](Self::run) is driving the controller).
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.snapshots.subscribe()
    }

    /// Countdown percentages as they are published.
    pub fn subscribe_countdown(&self) -> watch::Receiver<u8> {
        self.countdown.subscribe()
    }

    /// Apply a fragment from the initial load or a hash-change event.
    ///
    /// Any running countdown is stopped; an issued device request keeps
    /// running and its completion is still applied. Returns `true` if the
    /// fragment was not addressable and the address bar must show the
    /// normalized one instead.
    pub fn on_hash_change(&mut self, fragment: &str) -> bool {
        self.countdown.cancel();
        let rewritten = self.route.apply(fragment);
        debug!(
            fragment,
            route = %self.route.route(),
            rewritten,
            "Route applied"
        );
        self.publish();
        rewritten
    }

    /// Navigation link click.
    pub fn navigate(&mut self, route: Route) -> bool {
        self.on_hash_change(route.fragment())
    }

    /// Replace one editable field of the registration record.
    pub fn update_registration(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        let field: RegistrationField = field.parse()?;
        self.registration = self.registration.with_field(field, value);
        self.publish();
        Ok(())
    }

    /// Replace one editable field of the signing record.
    pub fn update_signing(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        let field: SigningField = field.parse()?;
        self.signing = self.signing.with_field(field, value);
        self.publish();
        Ok(())
    }

    /// Start a registration ceremony with the current challenge.
    #[instrument(level = "info", skip(self), fields(app_id = %self.app_id))]
    pub fn submit_registration(&mut self) -> Result<Ticket> {
        if self.registration_in_flight.is_some() {
            return Err(U2fError::CeremonyInFlight(CeremonyKind::Registration));
        }

        let ticket = self.issue_ticket();
        let request = RegisterRequest::new(self.registration.challenge.clone());
        info!(challenge = %request.challenge, "Start registration");

        self.countdown.start(Instant::now(), self.config.budget);
        self.registration_in_flight = Some(ticket);

        let gateway = Arc::clone(&self.gateway);
        let app_id = self.app_id.clone();
        let completions = self.completions_tx.clone();
        let budget = self.config.budget;
        let deadline = budget + self.config.completion_grace;

        tokio::spawn(async move {
            let result = tokio::time::timeout(
                deadline,
                gateway.register(&app_id, &[request], &[], budget),
            )
            .await
            .unwrap_or_else(|_| {
                warn!("Gateway did not answer within budget, reporting TIMEOUT");
                DeviceResult::error(ErrorCode::TIMEOUT)
            });
            // The controller may be gone; nothing to deliver to then
            let _ = completions.send(Completion::Registration { ticket, result });
        });

        self.publish();
        Ok(ticket)
    }

    /// Start a signing ceremony for the current key handle and challenge.
    #[instrument(level = "info", skip(self), fields(app_id = %self.app_id))]
    pub fn submit_signing(&mut self) -> Result<Ticket> {
        if self.signing_in_flight.is_some() {
            return Err(U2fError::CeremonyInFlight(CeremonyKind::Signing));
        }
        if !self.signing.has_key_handle() {
            warn!("Signing without a key handle; the device will reject it");
        }

        let ticket = self.issue_ticket();
        let challenge = self.signing.challenge.clone();
        let key = RegisteredKey::new(self.signing.key_handle.clone());
        info!(challenge = %challenge, "Start signing");

        self.countdown.start(Instant::now(), self.config.budget);
        self.signing_in_flight = Some(ticket);

        let gateway = Arc::clone(&self.gateway);
        let app_id = self.app_id.clone();
        let completions = self.completions_tx.clone();
        let budget = self.config.budget;
        let deadline = budget + self.config.completion_grace;

        tokio::spawn(async move {
            let result = tokio::time::timeout(
                deadline,
                gateway.sign(&app_id, &challenge, &[key], budget),
            )
            .await
            .unwrap_or_else(|_| {
                warn!("Gateway did not answer within budget, reporting TIMEOUT");
                DeviceResult::error(ErrorCode::TIMEOUT)
            });
            let _ = completions.send(Completion::Signing { ticket, result });
        });

        self.publish();
        Ok(ticket)
    }

    /// Wait for the next outstanding ceremony to complete and apply it.
    pub async fn settle(&mut self) -> Result<CeremonyOutcome> {
        loop {
            if self.registration_in_flight.is_none() && self.signing_in_flight.is_none() {
                return Err(U2fError::NoCeremonyInFlight);
            }
            let completion = self
                .completions_rx
                .recv()
                .await
                .ok_or(U2fError::EventLoopClosed)?;
            if let Some(outcome) = self.apply_completion(completion) {
                return Ok(outcome);
            }
        }
    }

    /// Apply a device completion.
    ///
    /// Returns `None` when the completion does not belong to the request
    /// currently in flight (a late or duplicate delivery); such completions
    /// change nothing.
    pub fn apply_completion(&mut self, completion: Completion) -> Option<CeremonyOutcome> {
        let (kind, ticket) = completion.kind_and_ticket();
        if *self.in_flight_slot(kind) != Some(ticket) {
            debug!(%kind, ?ticket, "Ignoring stale ceremony completion");
            return None;
        }
        *self.in_flight_slot_mut(kind) = None;
        self.countdown.cancel();

        let outcome = match completion {
            Completion::Registration { result, .. } => self.complete_registration(result),
            Completion::Signing { result, .. } => self.complete_signing(result),
        };
        self.publish();
        Some(outcome)
    }

    /// Drive the controller from view events until the event channel closes.
    ///
    /// Ceremony completions and countdown ticks are applied as they arrive;
    /// a fresh snapshot is published after each.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ViewEvent>) {
        let mut countdown = self.countdown.subscribe();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.apply_completion(completion);
                }
                Ok(()) = countdown.changed() => {
                    countdown.borrow_and_update();
                    self.publish();
                }
            }
        }

        debug!("View event channel closed, controller stopping");
    }

    /// Dispatch one view event. Rejected events are logged, never fatal.
    pub fn handle_event(&mut self, event: ViewEvent) {
        let result = match event {
            ViewEvent::HashChange(fragment) => {
                self.on_hash_change(&fragment);
                Ok(())
            }
            ViewEvent::Navigate(route) => {
                self.navigate(route);
                Ok(())
            }
            ViewEvent::UpdateRegistration { field, value } => {
                self.update_registration(&field, value)
            }
            ViewEvent::UpdateSigning { field, value } => self.update_signing(&field, value),
            ViewEvent::SubmitRegistration => self.submit_registration().map(|_| ()),
            ViewEvent::SubmitSigning => self.submit_signing().map(|_| ()),
        };

        if let Err(e) = result {
            warn!(error = %e, "View event rejected");
        }
    }

    fn complete_registration(&mut self, result: DeviceResult<RegisterResponse>) -> CeremonyOutcome {
        let kind = CeremonyKind::Registration;
        match result {
            DeviceResult::Error { error_code } => {
                warn!(error_code = %error_code, "Registration failed");
                // parsed_response keeps the last good result, as it does for
                // signing; see DESIGN.md before changing either.
                self.registration = RegistrationState {
                    response: Some(DeviceResult::error(error_code)),
                    ..self.registration.clone()
                };
                CeremonyOutcome::DeviceError {
                    kind,
                    code: error_code,
                }
            }
            DeviceResult::Success(payload) => match parse_registration(&payload) {
                Ok(parsed) => {
                    info!(key_handle = %parsed.key_handle, "Registration completed");
                    self.signing = self
                        .signing
                        .with_field(SigningField::KeyHandle, parsed.key_handle.clone());
                    self.registration = RegistrationState {
                        response: Some(DeviceResult::Success(payload)),
                        parsed_response: Some(parsed),
                        ..self.registration.clone()
                    };
                    CeremonyOutcome::Completed(kind)
                }
                Err(error) => {
                    warn!(error = %error, "Registration response could not be parsed");
                    self.registration = RegistrationState {
                        response: Some(DeviceResult::Success(payload)),
                        parsed_response: None,
                        ..self.registration.clone()
                    };
                    CeremonyOutcome::Unparsed { kind, error }
                }
            },
        }
    }

    fn complete_signing(&mut self, result: DeviceResult<SignResponse>) -> CeremonyOutcome {
        let kind = CeremonyKind::Signing;
        match result {
            DeviceResult::Error { error_code } => {
                warn!(error_code = %error_code, "Signing failed");
                self.signing = SigningState {
                    response: Some(DeviceResult::error(error_code)),
                    ..self.signing.clone()
                };
                CeremonyOutcome::DeviceError {
                    kind,
                    code: error_code,
                }
            }
            DeviceResult::Success(payload) => {
                let parsed = parse_signature(&payload);
                let outcome = match &parsed {
                    Ok(sig) => {
                        info!(counter = sig.counter, "Signing completed");
                        CeremonyOutcome::Completed(kind)
                    }
                    Err(error) => {
                        warn!(error = %error, "Signing response could not be parsed");
                        CeremonyOutcome::Unparsed {
                            kind,
                            error: error.clone(),
                        }
                    }
                };
                self.signing = SigningState {
                    response: Some(DeviceResult::Success(payload)),
                    parsed_response: parsed.ok(),
                    ..self.signing.clone()
                };
                outcome
            }
        }
    }

    fn issue_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    fn in_flight_slot(&self, kind: CeremonyKind) -> &Option<Ticket> {
        match kind {
            CeremonyKind::Registration => &self.registration_in_flight,
            CeremonyKind::Signing => &self.signing_in_flight,
        }
    }

    fn in_flight_slot_mut(&mut self, kind: CeremonyKind) -> &mut Option<Ticket> {
        match kind {
            CeremonyKind::Registration => &mut self.registration_in_flight,
            CeremonyKind::Signing => &mut self.signing_in_flight,
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}

impl std::fmt::Debug for CeremonyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CeremonyController")
            .field("app_id", &self.app_id)
            .field("route", &self.route)
            .field("registration_in_flight", &self.registration_in_flight)
            .field("signing_in_flight", &self.signing_in_flight)
            .field("gateway", &"<DeviceGateway>")
            .finish()
    }
}
