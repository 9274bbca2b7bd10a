//! Telescope state decoding.
//!
//! Turns a [`TelescopeInfo`] document (raw ASCOL answers) into a [`TelescopeState`]
//! snapshot. Answer formats:
//!
//! - `TRRD`: `235912.10 -102312.43 0`, right ascension `HHMMSS.ss`, declination
//!   `±DDMMSS.ss`, pier side 0 east / 1 west.
//! - `TRHD`: `-180.9000 55.7890`, hour and declination axis in degrees.
//! - `TRGV`, `TRUS`: two decimals (RA, DEC).
//! - `DOPO`, `FOPO`: one decimal. `TRCS`: one integer.
//! - `TSRA`: `ra dec side` as last sent by the operator.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::warn;

use super::glst::TelescopeGlst;
use crate::astrometry::Astrometry;
use crate::transport::TelescopeInfo;

macro_rules! pattern {
    ($name:ident, $re:literal) => {
        #[allow(clippy::expect_used)]
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($re).expect("telescope answer regex is valid"));
    };
}

pattern!(STAR_COORDINATES, r"(\d+\.?\d*) ([+-]?\d+\.?\d*) ([01])");
pattern!(SOURCE_COORDINATES, r"([+-]?\d+\.?\d*) ([+-]*\d+\.?\d*)");
pattern!(COORDINATE, r"([+-]?\d{2})(\d{2})(\d{2}\.?\d*)");
pattern!(TWO_DOUBLE, r"([+-]?\d+\.?\d*) ([+-]?\d+\.?\d*)");
pattern!(DOUBLE, r"([+-]?\d+\.?\d*)");
pattern!(INTEGER, r"([+-]?\d+)");

/// UT timestamp format of the telescope info document.
pub const UT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Side of the pier the tube is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PierSide {
    East,
    West,
}

impl fmt::Display for PierSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PierSide::East => f.write_str("east"),
            PierSide::West => f.write_str("western"),
        }
    }
}

/// Last target sent with `TSRA`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsraTarget {
    pub ra: String,
    pub dec: String,
    pub side: String,
    pub object: String,
}

/// One decoded telescope snapshot.
///
/// Every field that could not be decoded is `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TelescopeState {
    /// Sub-states and flags from the GLST line.
    pub glst: TelescopeGlst,
    /// Right ascension `HH MM SS.ss`.
    pub ra: Option<String>,
    /// Declination `±DD MM SS.ss`.
    pub dec: Option<String>,
    pub pier_side: Option<PierSide>,
    /// Hour axis `DD MM SS.ss`.
    pub ha_axis: Option<String>,
    /// Declination axis `DD MM SS.ss`.
    pub dec_axis: Option<String>,
    /// UT of the sample `HH:MM:SS`.
    pub utc: Option<String>,
    /// Local sidereal time `HH:MM:SS`.
    pub lst: Option<String>,
    /// LST minus RA, `HH:MM:SS`.
    pub hour_angle: Option<String>,
    pub airmass: Option<f64>,
    pub altitude: Option<f64>,
    pub azimuth: Option<f64>,
    pub corrections_ra: Option<f64>,
    pub corrections_dec: Option<f64>,
    pub speed_ra: Option<f64>,
    pub speed_dec: Option<f64>,
    pub dome_position: Option<f64>,
    pub focus_position: Option<f64>,
    /// Active pointing model (`TRCS`).
    pub model_number: Option<i32>,
    pub tsra: Option<TsraTarget>,
}

/// Decode one telescope info document.
///
/// Never fails; see the module documentation for the accepted formats.
pub fn decode_telescope(info: &TelescopeInfo, astrometry: &dyn Astrometry) -> TelescopeState {
    let mut state = TelescopeState {
        glst: TelescopeGlst::parse(&info.glst),
        ..Default::default()
    };

    decode_star_coordinates(&info.trrd, &info.ut, astrometry, &mut state);

    if let Some(caps) = SOURCE_COORDINATES.captures(&info.trhd) {
        state.ha_axis = degrees_to_dms(&caps[1]);
        state.dec_axis = degrees_to_dms(&caps[2]);
    }

    (state.corrections_ra, state.corrections_dec) = parse_two_doubles(&info.trgv);
    (state.speed_ra, state.speed_dec) = parse_two_doubles(&info.trus);
    state.dome_position = parse_double(&info.dopo);
    state.model_number = INTEGER
        .captures(&info.trcs)
        .and_then(|caps| caps[1].parse().ok());
    state.focus_position = parse_double(&info.fopo);

    let tsra: Vec<&str> = info.tsra.split(' ').collect();
    if let [ra, dec, side] = tsra.as_slice() {
        state.tsra = Some(TsraTarget {
            ra: (*ra).to_string(),
            dec: (*dec).to_string(),
            side: (*side).to_string(),
            object: info.object.clone(),
        });
    }

    state
}

fn decode_star_coordinates(
    trrd: &str,
    ut: &str,
    astrometry: &dyn Astrometry,
    state: &mut TelescopeState,
) {
    let Some(caps) = STAR_COORDINATES.captures(trrd) else {
        return;
    };

    state.ra = split_coordinate(&caps[1]);
    state.dec = split_coordinate(&caps[2]);
    state.pier_side = Some(if &caps[3] == "0" {
        PierSide::East
    } else {
        PierSide::West
    });

    let ut = parse_ut(ut);
    state.utc = Some(ut.format("%H:%M:%S").to_string());

    let (Some(ra_hours), Some(dec_deg)) = (
        state.ra.as_deref().and_then(sexagesimal_to_decimal),
        state.dec.as_deref().and_then(sexagesimal_to_decimal),
    ) else {
        return;
    };

    let position = astrometry.compute(ra_hours, dec_deg, ut);
    state.lst = Some(format_hms_truncated(position.lst_hours));
    state.airmass = position.airmass;
    state.altitude = Some(position.altitude_deg);
    state.azimuth = Some(position.azimuth_deg);
    state.hour_angle = Some(format_hour_angle(position.lst_hours - ra_hours));
}

/// Parse the document UT, falling back to the local clock.
fn parse_ut(ut: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(ut.trim(), UT_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(err) => {
            warn!("Parse UT = '{}' - {}", ut, err);
            Utc::now()
        }
    }
}

/// `235912.10` -> `23 59 12.10`, `-102312.43` -> `-10 23 12.43`.
fn split_coordinate(raw: &str) -> Option<String> {
    COORDINATE
        .captures(raw)
        .map(|caps| format!("{} {} {}", &caps[1], &caps[2], &caps[3]))
}

/// `"±A B C"` -> `±(A + B/60 + C/3600)`.
fn sexagesimal_to_decimal(value: &str) -> Option<f64> {
    let mut parts = value.split_whitespace();
    let first = parts.next()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    let negative = first.starts_with('-');
    let whole: f64 = first.trim_start_matches(['+', '-']).parse().ok()?;
    let magnitude = whole + minutes / 60.0 + seconds / 3600.0;
    Some(if negative { -magnitude } else { magnitude })
}

/// Decimal degrees -> `DD MM SS.ss`, keeping the sign on the degrees.
fn degrees_to_dms(raw: &str) -> Option<String> {
    // "+-1.5" is accepted by the axis pattern, collapse repeated signs
    let negative = raw.chars().take_while(|c| matches!(c, '+' | '-')).any(|c| c == '-');
    let value: f64 = raw.trim_start_matches(['+', '-']).parse().ok()?;

    let centi_arcsec = (value * 360_000.0).round() as i64;
    let degrees = centi_arcsec / 360_000;
    let minutes = (centi_arcsec % 360_000) / 6_000;
    let seconds = (centi_arcsec % 6_000) as f64 / 100.0;
    let sign = if negative && centi_arcsec != 0 { "-" } else { "" };

    Some(format!("{}{:02} {:02} {:.2}", sign, degrees, minutes, seconds))
}

fn parse_two_doubles(raw: &str) -> (Option<f64>, Option<f64>) {
    match TWO_DOUBLE.captures(raw) {
        Some(caps) => (caps[1].parse().ok(), caps[2].parse().ok()),
        None => (None, None),
    }
}

fn parse_double(raw: &str) -> Option<f64> {
    DOUBLE.captures(raw).and_then(|caps| caps[1].parse().ok())
}

/// Hours -> `HH:MM:SS`, seconds truncated.
fn format_hms_truncated(hours: f64) -> String {
    let total = (hours.rem_euclid(24.0) * 3600.0).floor() as i64;
    format!("{:02}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Hour angle in hours, normalized to `-12..12`, as `[-]HH:MM:SS` with rounded seconds.
fn format_hour_angle(hours: f64) -> String {
    let normalized = (hours + 12.0).rem_euclid(24.0) - 12.0;
    let total = (normalized.abs() * 3600.0).round() as i64;
    let sign = if normalized < 0.0 && total != 0 { "-" } else { "" };
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astrometry::SkyPosition;
    use crate::protocol::glst::{OilState, TelescopeMode};

    /// Fixed sky position with LST 01:00:00.
    struct FixedSky;

    impl Astrometry for FixedSky {
        fn compute(&self, _ra: f64, _dec: f64, _ut: DateTime<Utc>) -> SkyPosition {
            SkyPosition {
                lst_hours: 1.0,
                altitude_deg: 42.5,
                azimuth_deg: 181.0,
                airmass: Some(1.47),
            }
        }
    }

    fn sample() -> TelescopeInfo {
        TelescopeInfo {
            ut: "2014-05-06 21:03:04".into(),
            glst: "4 4 1 1 1 0 3 3 3 240".into(),
            trrd: "235912.10 -102312.43 0".into(),
            trhd: "-180.9000 55.7890".into(),
            trgv: "0.5 -0.25".into(),
            trus: "15.0 0.0".into(),
            dopo: "181.5".into(),
            trcs: "3".into(),
            fopo: "12.35".into(),
            tsra: "235912.1 -102312.4 0".into(),
            object: "HD 1234".into(),
        }
    }

    #[test]
    fn decodes_full_document() {
        let state = decode_telescope(&sample(), &FixedSky);

        assert_eq!(state.glst.oil, OilState::On);
        assert_eq!(state.glst.telescope, TelescopeMode::Track);
        assert_eq!(state.ra.as_deref(), Some("23 59 12.10"));
        assert_eq!(state.dec.as_deref(), Some("-10 23 12.43"));
        assert_eq!(state.pier_side, Some(PierSide::East));
        assert_eq!(state.ha_axis.as_deref(), Some("-180 54 0.00"));
        assert_eq!(state.dec_axis.as_deref(), Some("55 47 20.40"));
        assert_eq!(state.utc.as_deref(), Some("21:03:04"));
        assert_eq!(state.lst.as_deref(), Some("01:00:00"));
        assert_eq!(state.airmass, Some(1.47));
        assert_eq!(state.corrections_ra, Some(0.5));
        assert_eq!(state.corrections_dec, Some(-0.25));
        assert_eq!(state.speed_ra, Some(15.0));
        assert_eq!(state.dome_position, Some(181.5));
        assert_eq!(state.focus_position, Some(12.35));
        assert_eq!(state.model_number, Some(3));

        let tsra = state.tsra.unwrap();
        assert_eq!(tsra.ra, "235912.1");
        assert_eq!(tsra.side, "0");
        assert_eq!(tsra.object, "HD 1234");
    }

    #[test]
    fn hour_angle_is_lst_minus_ra() {
        // LST 01:00:00 - RA 23:59:12.10 = 01:00:47.9 (wrapped)
        let state = decode_telescope(&sample(), &FixedSky);
        assert_eq!(state.hour_angle.as_deref(), Some("01:00:48"));

        assert_eq!(format_hour_angle(-1.5), "-01:30:00");
        assert_eq!(format_hour_angle(23.0), "-01:00:00");
    }

    #[test]
    fn west_pier_side() {
        let mut info = sample();
        info.trrd = "010203.00 +452000.00 1".into();
        let state = decode_telescope(&info, &FixedSky);
        assert_eq!(state.pier_side, Some(PierSide::West));
        assert_eq!(state.pier_side.unwrap().to_string(), "western");
        assert_eq!(state.dec.as_deref(), Some("+45 20 00.00"));
    }

    #[test]
    fn empty_document_decodes_to_unknowns() {
        let state = decode_telescope(&TelescopeInfo::default(), &FixedSky);
        assert_eq!(state.glst.oil, OilState::Unknown);
        assert!(state.glst.flags.is_none());
        assert!(state.ra.is_none());
        assert!(state.lst.is_none());
        assert!(state.ha_axis.is_none());
        assert!(state.dome_position.is_none());
        assert!(state.model_number.is_none());
        assert!(state.tsra.is_none());
    }

    #[test]
    fn malformed_ut_still_decodes_coordinates() {
        let mut info = sample();
        info.ut = "yesterday".into();
        let state = decode_telescope(&info, &FixedSky);
        assert_eq!(state.ra.as_deref(), Some("23 59 12.10"));
        assert!(state.utc.is_some());
    }

    #[test]
    fn degrees_to_dms_carries_rounding() {
        assert_eq!(degrees_to_dms("10.5").as_deref(), Some("10 30 0.00"));
        assert_eq!(degrees_to_dms("-0.5").as_deref(), Some("-00 30 0.00"));
        assert_eq!(degrees_to_dms("59.9999999").as_deref(), Some("60 00 0.00"));
    }

    #[test]
    fn sexagesimal_values() {
        assert_eq!(sexagesimal_to_decimal("01 30 00"), Some(1.5));
        assert_eq!(sexagesimal_to_decimal("-00 30 00"), Some(-0.5));
        assert_eq!(sexagesimal_to_decimal("garbage"), None);
    }
}
