//! # Observe Client Library
//!
//! Client half of a remote observatory control application. The library keeps a local
//! view of a telescope, a coudé spectrograph and three CCD detectors (OES, ccd400,
//! ccd700) synchronized with a remote control server, and forwards operator commands to
//! that server one at a time.
//!
//! ## Crate Structure
//!
//! - **`session`**: the session loop. Connects, drains the command queue, polls every
//!   subsystem and runs the reconnect prompt on connection failures.
//! - **`command`**: immutable `Command` values and the single-consumer command queue.
//! - **`protocol`**: pure decoders for the compact status strings (GLST lines, `+OK`
//!   answers, coordinates, grating angles) and parsers for operator input.
//! - **`transport`**: the `Transport` trait the loop consumes, the HTTPS implementation
//!   and an in-memory mock.
//! - **`events`**: the snapshot event stream published to consumers.
//! - **`astrometry`**: LST, altitude, azimuth and airmass for the observatory site.
//! - **`instrument`**: the five instrument identities.
//! - **`config`**: layered configuration (defaults, TOML file, `OBSERVE_*` environment).
//! - **`logging`**: tracing subscriber setup.
//! - **`error`**: the `ObserveError` type.

pub mod astrometry;
pub mod command;
pub mod config;
pub mod error;
pub mod events;
pub mod instrument;
pub mod logging;
pub mod protocol;
pub mod session;
pub mod transport;

pub use command::{command_queue, Command, CommandQueue, CommandSender};
pub use error::{AppResult, ObserveError};
pub use events::{EventPublisher, LogLevel, SessionEvent};
pub use instrument::Instrument;
pub use session::{ConnectionState, ExitFlag, PromptDecision, ReconnectPrompt, SessionLoop};
