//! Event stream published by the session loop.
//!
//! Consumers (a UI, the CLI printer, tests) hold the receiving end of an unbounded
//! channel. Every event carries a whole snapshot; nothing published is mutated later.
//! Within one poll cycle events arrive in emission order.

use std::fmt;
use tokio::sync::mpsc;

use crate::instrument::Instrument;
use crate::protocol::{ExposeState, SpectrographState, TelescopeState};
use crate::session::ConnectionState;
use crate::transport::{ClientVersion, ExposeInfo, ManualSetupDocument, SetupDocument};

/// Severity of a free-text log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

/// One item of the event stream.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Decoded telescope snapshot.
    Telescope(Box<TelescopeState>),
    /// Decoded spectrograph snapshot.
    Spectrograph(Box<SpectrographState>),
    /// Per-cycle detector snapshot.
    Expose {
        instrument: Instrument,
        info: ExposeInfo,
    },
    /// Detector snapshot with the one-shot queries, once per connection.
    ExposeInit(Box<ExposeState>),
    /// Predefined exposure setups of one detector.
    Setup(SetupDocument),
    /// Central-wavelength calibration (ccd700).
    ManualSetup(ManualSetupDocument),
    /// Released client versions, once per connection.
    ClientVersion(ClientVersion),
    /// Connection state transition.
    Connection {
        state: ConnectionState,
        message: String,
    },
    /// Whether the last poll of a subsystem succeeded.
    Availability {
        instrument: Instrument,
        available: bool,
    },
    /// Free-text log line.
    Log { level: LogLevel, message: String },
}

/// Sending half of the event stream.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventPublisher {
    /// Create a publisher and the receiver consumers read from.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publish one event. A dropped receiver is ignored.
    pub fn publish(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }

    /// Emit a tracing record and publish the same line as a [`SessionEvent::Log`].
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!("{}", message),
            LogLevel::Info => tracing::info!("{}", message),
            LogLevel::Warn => tracing::warn!("{}", message),
            LogLevel::Error => tracing::error!("{}", message),
        }
        self.publish(SessionEvent::Log { level, message });
    }
}
