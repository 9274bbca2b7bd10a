//! Instrument identity.
//!
//! Every subsystem the client talks to is one of five fixed instruments. The identity
//! selects the poll operation, the command routing and the resource path on the server.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ObserveError;

/// One of the remotely controlled subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    /// Telescope mount, dome and focus.
    Telescope,
    /// Coudé spectrograph optics and exposure meters.
    Spectrograph,
    /// Echelle (OES) detector.
    Oes,
    /// Coudé detector on the 400 mm camera.
    Ccd400,
    /// Coudé detector on the 700 mm camera.
    Ccd700,
}

impl Instrument {
    /// Order in which subsystems are polled every cycle.
    pub const POLL_ORDER: [Instrument; 5] = [
        Instrument::Telescope,
        Instrument::Spectrograph,
        Instrument::Oes,
        Instrument::Ccd400,
        Instrument::Ccd700,
    ];

    /// Detector instruments served by the expose daemon.
    pub const DETECTORS: [Instrument; 3] =
        [Instrument::Oes, Instrument::Ccd400, Instrument::Ccd700];

    /// Wire name, also the server resource path.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Instrument::Telescope => "telescope",
            Instrument::Spectrograph => "spectrograph",
            Instrument::Oes => "oes",
            Instrument::Ccd400 => "ccd400",
            Instrument::Ccd700 => "ccd700",
        }
    }

    /// True for the CCD detectors.
    #[must_use]
    pub fn is_detector(self) -> bool {
        matches!(
            self,
            Instrument::Oes | Instrument::Ccd400 | Instrument::Ccd700
        )
    }

    /// Whether a failed poll of this instrument only marks it unavailable
    /// instead of dropping the connection.
    ///
    /// Only the ccd400 detector gets this treatment. Its daemon is routinely
    /// offline, so every failure on it is classified as service-unavailable.
    #[must_use]
    pub fn failure_is_soft(self) -> bool {
        self == Instrument::Ccd400
    }

    /// Whether the instrument has a manual (central wavelength) exposure setup.
    #[must_use]
    pub fn has_manual_setup(self) -> bool {
        self == Instrument::Ccd700
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for Instrument {
    type Err = ObserveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telescope" => Ok(Instrument::Telescope),
            "spectrograph" => Ok(Instrument::Spectrograph),
            "oes" => Ok(Instrument::Oes),
            "ccd400" => Ok(Instrument::Ccd400),
            "ccd700" => Ok(Instrument::Ccd700),
            other => Err(ObserveError::InvalidInput(format!(
                "Unknown instrument '{}'. Must be one of: telescope, spectrograph, oes, ccd400, ccd700",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_order_is_fixed() {
        let names: Vec<_> = Instrument::POLL_ORDER.iter().map(|i| i.name()).collect();
        assert_eq!(
            names,
            vec!["telescope", "spectrograph", "oes", "ccd400", "ccd700"]
        );
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("CCD400".parse::<Instrument>().unwrap(), Instrument::Ccd400);
        assert_eq!(" Telescope ".parse::<Instrument>().unwrap(), Instrument::Telescope);
        assert!("ccd900".parse::<Instrument>().is_err());
    }

    #[test]
    fn only_ccd400_fails_softly() {
        let soft: Vec<_> = Instrument::POLL_ORDER
            .iter()
            .filter(|i| i.failure_is_soft())
            .collect();
        assert_eq!(soft, vec![&Instrument::Ccd400]);
    }

    #[test]
    fn detectors() {
        assert!(!Instrument::Telescope.is_detector());
        assert!(!Instrument::Spectrograph.is_detector());
        assert!(Instrument::DETECTORS.iter().all(|i| i.is_detector()));
    }
}
