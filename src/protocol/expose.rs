//! Detector exposure state.
//!
//! The per-cycle poll of a detector yields only the [`ExposeInfo`] document. The first
//! successful poll of a connection additionally queries the readout speeds, gains and
//! the `OBJECT`/`IMAGETYP` header keys; [`ExposeState`] bundles those answers.

use super::answer::{get_key_value, strip_ok_prefix, GAINS_OK, READOUT_SPEEDS_OK};
use crate::instrument::Instrument;
use crate::transport::ExposeInfo;

/// Exposure state of one detector, including the one-shot queries.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposeState {
    pub instrument: Instrument,
    pub info: ExposeInfo,
    /// Space-separated readout speeds, `None` if the daemon did not answer `+OK`.
    pub readout_speeds: Option<String>,
    /// Space-separated gains, `None` if the daemon did not answer `+OK`.
    pub gains: Option<String>,
    /// `OBJECT` header value, empty when unset.
    pub object: String,
    /// `IMAGETYP` header value, empty when unset.
    pub target: String,
}

impl ExposeState {
    pub fn new(instrument: Instrument, info: ExposeInfo) -> Self {
        Self {
            instrument,
            info,
            readout_speeds: None,
            gains: None,
            object: String::new(),
            target: String::new(),
        }
    }

    /// Take the `expose_get READOUT_SPEEDS` answer.
    #[must_use]
    pub fn with_readout_speeds(mut self, answer: &str) -> Self {
        if let Some(speeds) = strip_ok_prefix(answer, READOUT_SPEEDS_OK) {
            self.readout_speeds = Some(speeds.to_string());
        }
        self
    }

    /// Take the `expose_get GAINS` answer.
    #[must_use]
    pub fn with_gains(mut self, answer: &str) -> Self {
        if let Some(gains) = strip_ok_prefix(answer, GAINS_OK) {
            self.gains = Some(gains.to_string());
        }
        self
    }

    /// Take the `expose_get_key OBJECT` answer.
    #[must_use]
    pub fn with_object(mut self, answer: &str) -> Self {
        self.object = get_key_value(answer);
        self
    }

    /// Take the `expose_get_key IMAGETYP` answer.
    #[must_use]
    pub fn with_target(mut self, answer: &str) -> Self {
        self.target = get_key_value(answer);
        self
    }

    /// Readout speeds as a list.
    pub fn readout_speed_list(&self) -> Vec<&str> {
        self.readout_speeds
            .as_deref()
            .map(|speeds| speeds.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Gains as a list.
    pub fn gain_list(&self) -> Vec<&str> {
        self.gains
            .as_deref()
            .map(|gains| gains.split_whitespace().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_answers() {
        let state = ExposeState::new(Instrument::Ccd700, ExposeInfo::default())
            .with_readout_speeds("+OK READOUT_SPEEDS = 50kHz 100kHz")
            .with_gains("+OK GAINS = low high")
            .with_object("+OK OBJECT = HD 1234 / Object name")
            .with_target("+OK IMAGETYP = flat / Image type");

        assert_eq!(state.readout_speed_list(), vec!["50kHz", "100kHz"]);
        assert_eq!(state.gain_list(), vec!["low", "high"]);
        assert_eq!(state.object, "HD 1234");
        assert_eq!(state.target, "flat");
    }

    #[test]
    fn error_answers_leave_fields_unset() {
        let state = ExposeState::new(Instrument::Oes, ExposeInfo::default())
            .with_readout_speeds("ERR not supported")
            .with_gains("")
            .with_object("ERR no key");

        assert!(state.readout_speeds.is_none());
        assert!(state.gain_list().is_empty());
        assert_eq!(state.object, "");
    }
}
