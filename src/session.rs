//! Session loop: connect, drain, poll, reconnect.
//!
//! The loop is the only consumer of the command queue and the only owner of the
//! transport. Everything it learns leaves through the [`EventPublisher`] as whole
//! snapshots.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──run()──> Connecting ──handshake ok──> Connected ──exit flag──> Closed
//!                             ▲   │                        │
//!                             │   └──handshake failed──┐   │ fatal poll failure
//!                             │                        ▼   ▼
//!                             └──reload()──prompt()──── Failed
//! ```
//!
//! A failed ccd400 poll never leaves `Connected`; it only marks that detector
//! unavailable for the cycle. There is no backoff: every failure goes straight to the
//! reconnect prompt.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::astrometry::Astrometry;
use crate::command::{Command, CommandQueue};
use crate::config::SessionConfig;
use crate::error::AppResult;
use crate::events::{EventPublisher, LogLevel, SessionEvent};
use crate::instrument::Instrument;
use crate::protocol::{decode_telescope, ExposeState, SpectrographState};
use crate::transport::{ConnectionParams, ExposeInfo, Transport, CLIENT_BUILD};

/// Connection state of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started yet.
    Disconnected,

    /// Handshake in progress.
    Connecting,

    /// Handshake succeeded; polling.
    Connected,

    /// Handshake or a fatal poll failed.
    Failed {
        /// Human-readable reason, `"<code> <reason phrase>"` for status errors
        reason: String,
    },

    /// Loop ended through the exit flag.
    Closed {
        /// Always `"Connection closed"`.
        reason: String,
    },
}

impl ConnectionState {
    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns the reason if failed or closed.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } | Self::Closed { reason } => Some(reason),
            _ => None,
        }
    }

    /// Returns a short status label for display.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected",
            Self::Failed { .. } => "Failed",
            Self::Closed { .. } => "Closed",
        }
    }
}

/// Operator answer to a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptDecision {
    /// Reconnect, possibly with edited parameters.
    Retry,
    /// Stop the session loop.
    Exit,
}

/// Blocking reconnect dialog shown after every connection failure.
#[async_trait]
pub trait ReconnectPrompt: Send + Sync {
    /// Ask the operator what to do about `reason`; `params` may be edited in place.
    async fn prompt(&self, reason: &str, params: &mut ConnectionParams) -> PromptDecision;
}

/// Global exit request shared between the loop and its controllers.
#[derive(Debug, Clone, Default)]
pub struct ExitFlag(Arc<AtomicBool>);

impl ExitFlag {
    /// New flag, not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop at its next check.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The connect/poll/dispatch/reconnect loop.
pub struct SessionLoop {
    transport: Arc<dyn Transport>,
    astrometry: Arc<dyn Astrometry>,
    params: ConnectionParams,
    poll_interval: Duration,
    queue: CommandQueue,
    events: EventPublisher,
    prompt: Box<dyn ReconnectPrompt>,
    exit: ExitFlag,
    state: ConnectionState,
    /// Detectors whose one-shot init fetch ran on this connection.
    initialized: HashSet<Instrument>,
}

impl SessionLoop {
    /// Build a loop in `Disconnected` state; nothing happens until [`Self::run`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transport: Arc<dyn Transport>,
        astrometry: Arc<dyn Astrometry>,
        params: ConnectionParams,
        config: &SessionConfig,
        queue: CommandQueue,
        events: EventPublisher,
        prompt: Box<dyn ReconnectPrompt>,
        exit: ExitFlag,
    ) -> Self {
        Self {
            transport,
            astrometry,
            params,
            poll_interval: config.poll_interval(),
            queue,
            events,
            prompt,
            exit,
            state: ConnectionState::Disconnected,
            initialized: HashSet::new(),
        }
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Current connection parameters, including prompt edits.
    #[must_use]
    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    /// Run until the exit flag is set.
    pub async fn run(&mut self) {
        tracing::info!(address = %self.params.address(), "Session loop started");

        while !self.exit.is_set() {
            let reason = match self.connect().await {
                Ok(()) => match self.poll_until_exit().await {
                    Ok(()) => break,
                    Err(reason) => reason,
                },
                Err(reason) => reason,
            };

            if self.exit.is_set() {
                break;
            }
            match self.prompt.prompt(&reason, &mut self.params).await {
                PromptDecision::Retry => {
                    if let Err(e) = self.transport.reload(&self.params).await {
                        self.events
                            .log(LogLevel::Error, format!("Transport reload failed - {}", e));
                    }
                }
                PromptDecision::Exit => self.exit.set(),
            }
        }

        self.set_state(
            ConnectionState::Closed {
                reason: "Connection closed".to_string(),
            },
            "Connection closed",
        );
        tracing::info!("Session loop stopped");
    }

    /// Perform the connect handshake.
    ///
    /// On success the state is `Connected`, every init flag is cleared and the client
    /// version document is published. On failure the state is `Failed` and the reason
    /// is returned.
    pub async fn connect(&mut self) -> Result<(), String> {
        let address = self.params.address();
        self.set_state(ConnectionState::Connecting, format!("Connecting {}", address));

        if let Err(e) = self.transport.get_user(&self.params.username).await {
            return Err(self.fail(e.to_string()));
        }

        self.initialized.clear();
        self.set_state(ConnectionState::Connected, format!("Connected {}", address));

        match self.transport.get_client_version_document().await {
            Ok(version) => {
                if let Some(notice) = version.deprecation_notice(CLIENT_BUILD) {
                    self.events.log(LogLevel::Warn, notice);
                }
                self.events.publish(SessionEvent::ClientVersion(version));
                Ok(())
            }
            Err(e) => Err(self.fail(e.to_string())),
        }
    }

    async fn poll_until_exit(&mut self) -> Result<(), String> {
        while !self.exit.is_set() {
            self.run_cycle().await?;
        }
        Ok(())
    }

    /// One poll cycle: drain the command queue, poll every subsystem, sleep.
    ///
    /// A fatal poll failure sets `Failed` and returns the reason; the rest of the cycle
    /// is skipped.
    pub async fn run_cycle(&mut self) -> Result<(), String> {
        self.queue
            .drain_and_execute_all(self.transport.as_ref(), &self.events)
            .await;

        for instrument in Instrument::POLL_ORDER {
            if self.exit.is_set() {
                return Ok(());
            }

            match self.poll(instrument).await {
                Ok(()) => self.publish_availability(instrument, true),
                Err(e) if instrument.failure_is_soft() => {
                    tracing::debug!(%instrument, error = %e, "Soft poll failure");
                    if e.is_service_unavailable() {
                        self.events
                            .log(LogLevel::Info, format!("{} unavailable", instrument));
                    } else {
                        self.events
                            .log(LogLevel::Warn, format!("{} unavailable - {}", instrument, e));
                    }
                    let message = format!("Connected {}", self.params.address());
                    self.set_state(ConnectionState::Connected, message);
                    self.publish_availability(instrument, false);
                }
                Err(e) => {
                    self.publish_availability(instrument, false);
                    return Err(self.fail(e.to_string()));
                }
            }
        }

        tokio::time::sleep(self.poll_interval).await;
        Ok(())
    }

    async fn poll(&mut self, instrument: Instrument) -> AppResult<()> {
        match instrument {
            Instrument::Telescope => {
                let info = self.transport.get_telescope_state().await?;
                let state = decode_telescope(&info, self.astrometry.as_ref());
                self.events
                    .publish(SessionEvent::Telescope(Box::new(state)));
            }
            Instrument::Spectrograph => {
                let info = self.transport.get_spectrograph_state().await?;
                let state = SpectrographState::decode(&info);
                self.events
                    .publish(SessionEvent::Spectrograph(Box::new(state)));
            }
            detector => {
                let info = self.transport.get_expose_state(detector).await?;
                self.events.publish(SessionEvent::Expose {
                    instrument: detector,
                    info: info.clone(),
                });
                if !self.initialized.contains(&detector) {
                    self.init_detector(detector, info).await?;
                    self.initialized.insert(detector);
                }
            }
        }
        Ok(())
    }

    /// One-shot fetches after the first successful poll of a detector.
    async fn init_detector(&self, instrument: Instrument, info: ExposeInfo) -> AppResult<()> {
        let setup = self.transport.get_setup_document(instrument).await?;
        self.events.publish(SessionEvent::Setup(setup));

        if instrument.has_manual_setup() {
            let manual = self.transport.get_manual_setup_document().await?;
            self.events.publish(SessionEvent::ManualSetup(manual));
        }

        let transport = self.transport.as_ref();
        let readout_speeds = query(transport, instrument, "expose_get", "READOUT_SPEEDS").await?;
        let gains = query(transport, instrument, "expose_get", "GAINS").await?;
        let object = query(transport, instrument, "expose_get_key", "OBJECT").await?;
        let target = query(transport, instrument, "expose_get_key", "IMAGETYP").await?;

        let state = ExposeState::new(instrument, info)
            .with_readout_speeds(&readout_speeds)
            .with_gains(&gains)
            .with_object(&object)
            .with_target(&target);
        tracing::debug!(%instrument, "Detector initialized");
        self.events
            .publish(SessionEvent::ExposeInit(Box::new(state)));
        Ok(())
    }

    fn publish_availability(&self, instrument: Instrument, available: bool) {
        self.events.publish(SessionEvent::Availability {
            instrument,
            available,
        });
    }

    fn set_state(&mut self, state: ConnectionState, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(state = state.label(), "{}", message);
        self.state = state.clone();
        self.events
            .publish(SessionEvent::Connection { state, message });
    }

    fn fail(&mut self, reason: String) -> String {
        self.events.log(LogLevel::Error, reason.clone());
        self.set_state(
            ConnectionState::Failed {
                reason: reason.clone(),
            },
            reason.clone(),
        );
        reason
    }
}

async fn query(
    transport: &dyn Transport,
    instrument: Instrument,
    function: &str,
    key: &str,
) -> AppResult<String> {
    Command::expose(instrument, function, [key])
        .execute(transport)
        .await
}
