//! Spectrograph state decoding.
//!
//! The spectrograph state is a fixed array of 36 slots. Slots 0..=27 come from the
//! space-separated GLST line, one field per slot in wire order. Slots 28..=35 come from
//! the supplementary position/counter answers bundled in the same document. Every slot
//! has its own display rule, see [`SpectrographState::display`].

use crate::transport::SpectrographInfo;

/// Number of slots in a spectrograph snapshot.
pub const SLOT_COUNT: usize = 36;

/// Number of slots filled from the GLST line.
pub const GLST_SLOTS: usize = 28;

/// One spectrograph slot; the discriminant is the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrographElement {
    DichroicMirror = 0,
    SpectralFilter = 1,
    Collimator = 2,
    Focus700 = 3,
    Focus400 = 4,
    StarCalibration = 5,
    CoudeOes = 6,
    Flat = 7,
    Comp = 8,
    ExpShutter = 9,
    Cam700Shutter = 10,
    Cam400Shutter = 11,
    Grating = 12,
    Exp = 13,
    SlitCam = 14,
    Corr700 = 15,
    Corr400 = 16,
    Unused17 = 17,
    Unused18 = 18,
    Unused19 = 19,
    CollimatorOes = 20,
    FocusOes = 21,
    ExpShutterOes = 22,
    ExpOes = 23,
    Unused24 = 24,
    IodFlask = 25,
    CoudeSlitCameraPower = 26,
    OesSlitCameraPower = 27,
    Focus700Pos = 28,
    Focus400Pos = 29,
    GratingPos = 30,
    ExpCount = 31,
    ExpFreq = 32,
    ExpOesCount = 33,
    ExpOesFreq = 34,
    FocusOesPos = 35,
}

impl SpectrographElement {
    /// Every slot in index order.
    pub const ALL: [SpectrographElement; SLOT_COUNT] = [
        Self::DichroicMirror,
        Self::SpectralFilter,
        Self::Collimator,
        Self::Focus700,
        Self::Focus400,
        Self::StarCalibration,
        Self::CoudeOes,
        Self::Flat,
        Self::Comp,
        Self::ExpShutter,
        Self::Cam700Shutter,
        Self::Cam400Shutter,
        Self::Grating,
        Self::Exp,
        Self::SlitCam,
        Self::Corr700,
        Self::Corr400,
        Self::Unused17,
        Self::Unused18,
        Self::Unused19,
        Self::CollimatorOes,
        Self::FocusOes,
        Self::ExpShutterOes,
        Self::ExpOes,
        Self::Unused24,
        Self::IodFlask,
        Self::CoudeSlitCameraPower,
        Self::OesSlitCameraPower,
        Self::Focus700Pos,
        Self::Focus400Pos,
        Self::GratingPos,
        Self::ExpCount,
        Self::ExpFreq,
        Self::ExpOesCount,
        Self::ExpOesFreq,
        Self::FocusOesPos,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Display emphasis of a slot, replacing panel colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Nominal state.
    Normal,
    /// Needs operator attention (stopped, moving, timeout, closed, ...).
    Alert,
    /// Lamp or flask switched on.
    Highlight,
}

/// Formatted slot value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotDisplay {
    /// Human readable value.
    pub text: String,
    pub tone: Tone,
    /// Raw wire value.
    pub raw: String,
}

/// One decoded spectrograph snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrographState {
    slots: [Option<String>; SLOT_COUNT],
}

impl Default for SpectrographState {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl SpectrographState {
    /// Decode one spectrograph info document.
    ///
    /// Extra GLST fields beyond slot 27 are ignored, missing ones stay `None`. Empty
    /// supplementary answers are treated as missing.
    #[must_use]
    pub fn decode(info: &SpectrographInfo) -> Self {
        let mut state = Self::default();

        for (slot, value) in state
            .slots
            .iter_mut()
            .take(GLST_SLOTS)
            .zip(info.glst.split_whitespace())
        {
            *slot = Some(value.to_string());
        }

        let supplementary = [
            (SpectrographElement::Focus700Pos, &info.spgp_4),
            (SpectrographElement::Focus400Pos, &info.spgp_5),
            (SpectrographElement::GratingPos, &info.spgp_13),
            (SpectrographElement::ExpCount, &info.spce_14),
            (SpectrographElement::ExpFreq, &info.spfe_14),
            (SpectrographElement::ExpOesCount, &info.spce_24),
            (SpectrographElement::ExpOesFreq, &info.spfe_24),
            (SpectrographElement::FocusOesPos, &info.spgp_22),
        ];
        for (element, value) in supplementary {
            let value = value.trim();
            if !value.is_empty() {
                state.slots[element.index()] = Some(value.to_string());
            }
        }

        state
    }

    /// Raw slot value.
    #[must_use]
    pub fn value(&self, element: SpectrographElement) -> Option<&str> {
        self.slots[element.index()].as_deref()
    }

    /// Formatted slot value, `None` when the slot is empty.
    #[must_use]
    pub fn display(&self, element: SpectrographElement) -> Option<SlotDisplay> {
        use SpectrographElement as E;

        let raw = self.value(element)?;
        let shown = |text: &str, tone: Tone| SlotDisplay {
            text: text.to_string(),
            tone,
            raw: raw.to_string(),
        };
        let normal = shown(raw, Tone::Normal);

        let display = match element {
            E::Collimator | E::CollimatorOes => match raw.parse::<usize>() {
                Ok(number) if number < COLLIMATOR_STATES.len() => {
                    let tone = if number == 1 { Tone::Normal } else { Tone::Alert };
                    shown(&format!("{} - {}", raw, COLLIMATOR_STATES[number]), tone)
                }
                _ => shown(raw, Tone::Alert),
            },
            E::DichroicMirror => motion_state(normal, 0, 5, 6),
            E::SlitCam | E::SpectralFilter => motion_state(normal, 0, 6, 7),
            E::Focus700 | E::Focus400 | E::FocusOes => match raw {
                "0" => shown("stop", Tone::Normal),
                _ => motion_state(normal, -1, 1, -1),
            },
            E::CoudeOes => match raw {
                "1" => shown("Coude", Tone::Normal),
                "2" => shown("OES", Tone::Normal),
                _ => motion_state(normal, 0, 3, 4),
            },
            E::StarCalibration => match raw {
                "1" => shown("Star", Tone::Normal),
                "2" => shown("Calibration", Tone::Normal),
                _ => motion_state(normal, 0, 3, 4),
            },
            E::ExpShutter | E::ExpShutterOes | E::Cam700Shutter | E::Cam400Shutter => {
                match raw {
                    "1" => shown("open", Tone::Normal),
                    "2" => shown("closed", Tone::Normal),
                    _ => motion_state(normal, 0, 3, 4),
                }
            }
            E::Flat | E::Comp => match raw {
                "0" => shown("off", Tone::Normal),
                _ => shown("on", Tone::Highlight),
            },
            E::CoudeSlitCameraPower | E::OesSlitCameraPower => match raw {
                "0" => shown("off", Tone::Alert),
                _ => shown("on", Tone::Normal),
            },
            E::Grating => match raw {
                "0" => shown("stop", Tone::Normal),
                _ => motion_state(normal, -1, 1, 2),
            },
            E::Exp | E::ExpOes => match raw {
                "0" => shown("stop", Tone::Alert),
                _ => shown("recording", Tone::Normal),
            },
            E::Corr700 | E::Corr400 => match raw {
                "0" => shown("unknown", Tone::Alert),
                "1" => shown("in", Tone::Normal),
                "2" => shown("out", Tone::Normal),
                _ => normal,
            },
            E::IodFlask => match raw {
                "1" => shown("on", Tone::Highlight),
                "2" => shown("off", Tone::Normal),
                _ => motion_state(normal, 0, 3, 4),
            },
            E::GratingPos => match raw.parse::<i32>() {
                Ok(position) => shown(&grating_increments_to_angle(position), Tone::Normal),
                Err(_) => normal,
            },
            E::ExpCount | E::ExpOesCount => match raw.parse::<f64>() {
                Ok(count) => shown(&format_counts(count), Tone::Normal),
                Err(_) => normal,
            },
            E::Focus700Pos
            | E::Focus400Pos
            | E::ExpFreq
            | E::ExpOesFreq
            | E::FocusOesPos
            | E::Unused17
            | E::Unused18
            | E::Unused19
            | E::Unused24 => normal,
        };

        Some(display)
    }
}

const COLLIMATOR_STATES: [&str; 7] = [
    "stop",
    "open",
    "closed",
    "open left",
    "open right",
    "moving",
    "timeout",
];

/// Replace a motor code with `stop`/`moving`/`timeout` (all alerting); other codes
/// keep the raw display. Codes are checked in that order.
fn motion_state(display: SlotDisplay, stop: i32, moving: i32, timeout: i32) -> SlotDisplay {
    let Ok(value) = display.raw.parse::<i32>() else {
        return display;
    };
    let text = if value == stop {
        "stop"
    } else if value == moving {
        "moving"
    } else if value == timeout {
        "timeout"
    } else {
        return display;
    };
    SlotDisplay {
        text: text.to_string(),
        tone: Tone::Alert,
        raw: display.raw,
    }
}

/// Exposure meter count as `x.xxx Mcounts`, `x.xxx Kcounts` or `n counts`.
#[must_use]
pub fn format_counts(count: f64) -> String {
    if count >= 1_000_000.0 {
        format!("{:.3} Mcounts", count / 1_000_000.0)
    } else if count >= 1_000.0 {
        format!("{:.3} Kcounts", count / 1_000.0)
    } else {
        format!("{:.0} counts", count)
    }
}

/// Grating stepper position to angle `DD:MM`.
///
/// Calibration shared with the spectrograph controller; must not be changed.
#[must_use]
pub fn grating_increments_to_angle(position: i32) -> String {
    let angle = -0.004_871_06 * f64::from(position) + 61.7024;
    let mut degrees = angle.floor();
    let mut minutes = ((angle - degrees) * 60.0).round();
    if minutes == 60.0 {
        degrees += 1.0;
        minutes = 0.0;
    }
    format!("{:02.0}:{:02.0}", degrees, minutes)
}

/// Grating angle in decimal degrees to stepper position.
///
/// Computed in single precision to match the controller side.
#[must_use]
pub fn grating_angle_to_increments(degrees: f32) -> i32 {
    (-205.294_f32 * degrees + 12667.1_f32).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use SpectrographElement as E;

    fn sample() -> SpectrographInfo {
        SpectrographInfo {
            glst: "1 1 1 0 0 1 1 0 0 2 1 1 0 0 1 1 1 0 0 0 1 0 2 0 0 2 1 1".into(),
            spgp_4: "1500".into(),
            spgp_5: "1400".into(),
            spgp_13: "8000".into(),
            spce_14: "2500000".into(),
            spfe_14: "1500".into(),
            spce_24: "800".into(),
            spfe_24: "200".into(),
            spgp_22: "900".into(),
            ..Default::default()
        }
    }

    #[test]
    fn element_discriminants_are_slot_indices() {
        for (index, element) in SpectrographElement::ALL.iter().enumerate() {
            assert_eq!(element.index(), index);
        }
    }

    #[test]
    fn decode_fills_glst_and_supplementary_slots() {
        let state = SpectrographState::decode(&sample());
        assert_eq!(state.value(E::DichroicMirror), Some("1"));
        assert_eq!(state.value(E::ExpShutter), Some("2"));
        assert_eq!(state.value(E::OesSlitCameraPower), Some("1"));
        assert_eq!(state.value(E::Focus700Pos), Some("1500"));
        assert_eq!(state.value(E::FocusOesPos), Some("900"));
    }

    #[test]
    fn short_and_long_glst_lines() {
        let mut info = SpectrographInfo {
            glst: "1 2 3".into(),
            ..Default::default()
        };
        let state = SpectrographState::decode(&info);
        assert_eq!(state.value(E::Collimator), Some("3"));
        assert_eq!(state.value(E::Focus700), None);
        assert_eq!(state.value(E::GratingPos), None);
        assert!(state.display(E::Focus700).is_none());

        info.glst = vec!["0"; 40].join(" ");
        info.spgp_4 = "42".into();
        let state = SpectrographState::decode(&info);
        assert_eq!(state.value(E::OesSlitCameraPower), Some("0"));
        // fields past slot 27 never overwrite supplementary slots
        assert_eq!(state.value(E::Focus700Pos), Some("42"));
        assert_eq!(state.value(E::Focus400Pos), None);
    }

    #[test]
    fn collimator_display() {
        let mut info = sample();
        info.glst = "0 0 1".into();
        let state = SpectrographState::decode(&info);
        let display = state.display(E::Collimator).unwrap();
        assert_eq!(display.text, "1 - open");
        assert_eq!(display.tone, Tone::Normal);

        info.glst = "0 0 5".into();
        let display = SpectrographState::decode(&info).display(E::Collimator).unwrap();
        assert_eq!(display.text, "5 - moving");
        assert_eq!(display.tone, Tone::Alert);

        info.glst = "0 0 9".into();
        let display = SpectrographState::decode(&info).display(E::Collimator).unwrap();
        assert_eq!(display.text, "9");
        assert_eq!(display.tone, Tone::Alert);
    }

    #[test]
    fn motion_codes() {
        let mut info = sample();
        info.glst = "5 7 0 1 0".into();
        let state = SpectrographState::decode(&info);

        let mirror = state.display(E::DichroicMirror).unwrap();
        assert_eq!((mirror.text.as_str(), mirror.tone), ("moving", Tone::Alert));

        let filter = state.display(E::SpectralFilter).unwrap();
        assert_eq!((filter.text.as_str(), filter.tone), ("timeout", Tone::Alert));

        let focus = state.display(E::Focus700).unwrap();
        assert_eq!((focus.text.as_str(), focus.tone), ("moving", Tone::Alert));

        let focus = state.display(E::Focus400).unwrap();
        assert_eq!((focus.text.as_str(), focus.tone), ("stop", Tone::Normal));

        // a filter position is shown as is
        info.glst = "3 2".into();
        let state = SpectrographState::decode(&info);
        assert_eq!(state.display(E::DichroicMirror).unwrap().text, "3");
        assert_eq!(state.display(E::SpectralFilter).unwrap().tone, Tone::Normal);
    }

    #[test]
    fn named_states() {
        let state = SpectrographState::decode(&sample());
        assert_eq!(state.display(E::CoudeOes).unwrap().text, "Coude");
        assert_eq!(state.display(E::StarCalibration).unwrap().text, "Star");
        assert_eq!(state.display(E::ExpShutter).unwrap().text, "closed");
        assert_eq!(state.display(E::Cam700Shutter).unwrap().text, "open");
        assert_eq!(state.display(E::Flat).unwrap().text, "off");
        assert_eq!(state.display(E::Exp).unwrap().tone, Tone::Alert);
        assert_eq!(state.display(E::Corr700).unwrap().text, "in");
        assert_eq!(state.display(E::IodFlask).unwrap().text, "off");
        assert_eq!(state.display(E::CoudeSlitCameraPower).unwrap().text, "on");
    }

    #[test]
    fn lamps_are_highlighted() {
        let mut info = sample();
        info.glst = "0 0 0 0 0 0 0 1 1".into();
        let state = SpectrographState::decode(&info);
        let flat = state.display(E::Flat).unwrap();
        assert_eq!((flat.text.as_str(), flat.tone), ("on", Tone::Highlight));
        assert_eq!(state.display(E::Comp).unwrap().tone, Tone::Highlight);
    }

    #[test]
    fn counts_and_grating_position() {
        let state = SpectrographState::decode(&sample());
        assert_eq!(state.display(E::ExpCount).unwrap().text, "2.500 Mcounts");
        assert_eq!(state.display(E::ExpOesCount).unwrap().text, "800 counts");
        assert_eq!(state.display(E::ExpFreq).unwrap().text, "1500");

        let grating = state.display(E::GratingPos).unwrap();
        assert_eq!(grating.text, "22:44");
        assert_eq!(grating.raw, "8000");

        assert_eq!(format_counts(1500.0), "1.500 Kcounts");
    }

    #[test]
    fn grating_angle_formula() {
        // 61.7024 - 0.00487106 * 8000 = 22.73392 -> 22 deg 44.04 min
        assert_eq!(grating_increments_to_angle(8000), "22:44");
        assert_eq!(grating_increments_to_angle(0), "61:42");
        assert_eq!(grating_angle_to_increments(22.0 + 44.0 / 60.0), 8000);
        assert_eq!(grating_angle_to_increments(61.7), 0);
    }

    #[test]
    fn grating_round_trip_within_arc_minute() {
        for position in (-2000..=12000).step_by(250) {
            let angle = grating_increments_to_angle(position);
            let (deg, min) = angle.split_once(':').unwrap();
            let degrees: f32 = deg.parse::<f32>().unwrap() + min.parse::<f32>().unwrap() / 60.0;
            let back = grating_angle_to_increments(degrees);
            // one arc minute is about 3.4 increments
            assert!((back - position).abs() <= 4, "{} -> {} -> {}", position, angle, back);
        }
    }
}
