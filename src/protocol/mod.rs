//! Protocol decoders.
//!
//! Pure functions turning the compact ASCII status strings of the remote subsystems into
//! structured snapshots, plus the operator-input parsers that produce ASCOL command
//! lines going the other way.
//!
//! Decoders never fail. A field that does not match its expected shape is left as
//! `None` (or the "unknown" sub-state), since partial telemetry is more useful to the
//! operator than no telemetry. Only the operator-input parsers in [`input`] return
//! errors, and those are meant to be shown to the operator verbatim.

pub mod answer;
pub mod expose;
pub mod glst;
pub mod input;
pub mod setup;
pub mod spectrograph;
pub mod telescope;

pub use answer::{get_key_value, strip_ok_prefix};
pub use expose::ExposeState;
pub use glst::{lookup_sub_state, SubState, TelescopeFlags, TelescopeGlst};
pub use spectrograph::{SlotDisplay, SpectrographElement, SpectrographState, Tone};
pub use telescope::{decode_telescope, TelescopeState};
