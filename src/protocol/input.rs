//! Operator input parsers and ASCOL command builders.
//!
//! Every parser returns [`ObserveError::InvalidInput`] with a message meant to be shown
//! to the operator as is.

use once_cell::sync::Lazy;
use regex::Regex;

use super::spectrograph::grating_angle_to_increments;
use crate::error::{AppResult, ObserveError};

macro_rules! pattern {
    ($name:ident, $re:literal) => {
        #[allow(clippy::expect_used)]
        static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($re).expect("input regex is valid"));
    };
}

pattern!(H_M_S, r"^(\d{1,2}):(\d{1,2}):(\d{1,2})$");
pattern!(M_S, r"^(\d{1,2}):(\d{1,2})$");
pattern!(S, r"^(\d{1,5})$");
pattern!(COUNT, r"^(\d{1,4}\.?\d{0,6})$");
pattern!(DEGREES_MINUTES, r"^(\d{1,3}):(\d{1,2}(\.\d{0,3})?)$");
pattern!(DDMMSS, r"^[+-]?\d{6}(\.\d{0,3})?$");
pattern!(DEGREES, r"^[+-]?\d{1,3}(\.\d{0,4})?$");

const EXPOSURE_TIME_HELP: &str = "Exposure time must be [H]H:[M]M:[S]S or [M]M:[S]S or [SSSS]S.\n\n\
Example:\n\n    01:30:00 - 1 hour, 30 minutes, 0 seconds\n    45:00 - 45 minutes, 0 seconds\n    90 - 90 seconds";

const EXPOSURE_METER_HELP: &str = "Exposure meter count must be [NNN]N[.][NNNNNN] Mcounts.\n\n\
Example:\n\n    2 - 2 000 000 counts\n    0.5 - 500 000 counts";

fn invalid(message: impl Into<String>) -> ObserveError {
    ObserveError::InvalidInput(message.into())
}

fn number<T: std::str::FromStr>(digits: &str) -> AppResult<T> {
    digits
        .parse()
        .map_err(|_| invalid(format!("'{}' is not a number", digits)))
}

/// Exposure time in seconds from `H:M:S`, `M:S` or `S`, tried in that order.
pub fn parse_exposure_time(input: &str) -> AppResult<u32> {
    if let Some(caps) = H_M_S.captures(input) {
        let hours: u32 = number(&caps[1])?;
        let minutes: u32 = number(&caps[2])?;
        let seconds: u32 = number(&caps[3])?;
        return Ok(3600 * hours + 60 * minutes + seconds);
    }
    if let Some(caps) = M_S.captures(input) {
        let minutes: u32 = number(&caps[1])?;
        let seconds: u32 = number(&caps[2])?;
        return Ok(60 * minutes + seconds);
    }
    if let Some(caps) = S.captures(input) {
        return number(&caps[1]);
    }
    Err(invalid(EXPOSURE_TIME_HELP))
}

/// Exposure meter limit in counts from a value in Mcounts.
pub fn parse_exposure_meter(input: &str) -> AppResult<u64> {
    let caps = COUNT.captures(input).ok_or_else(|| invalid(EXPOSURE_METER_HELP))?;
    let mcounts: f64 = number(&caps[1])?;
    Ok((mcounts * 1_000_000.0).round() as u64)
}

/// Grating stepper position from an angle `D:M[.MMM]`.
pub fn parse_grating_angle(input: &str) -> AppResult<i32> {
    let caps = DEGREES_MINUTES
        .captures(input)
        .ok_or_else(|| invalid("Grating angle must be [DD]D:[M]M[.MMM]"))?;
    let degrees: u16 = number(&caps[1])?;
    let minutes: f32 = number(&caps[2])?;
    Ok(grating_angle_to_increments(f32::from(degrees) + minutes / 60.0))
}

/// Check a `[+-]DDMMSS[.SSS]` coordinate; `label` names the field in the error.
pub fn validate_ddmmss(label: &str, input: &str) -> AppResult<()> {
    if DDMMSS.is_match(input) {
        Ok(())
    } else {
        Err(invalid(format!("{} must be [+/-]DDMMSS[.SSS]", label)))
    }
}

/// Parse `[+-]D[DD][.DDDD]` degrees and check them against `min..=max`.
pub fn validate_degrees(label: &str, input: &str, min: f64, max: f64) -> AppResult<f64> {
    if !DEGREES.is_match(input) {
        return Err(invalid(format!("{} must be [+/-]D[DD][.DDDD]", label)));
    }
    let value: f64 = number(input)?;
    if value < min || value > max {
        return Err(invalid(format!(
            "{} must be >= {} and <= {}",
            label, min, max
        )));
    }
    Ok(value)
}

/// `TSRA ra dec side`: set the target in equatorial coordinates.
pub fn tsra_command(ra: &str, dec: &str, western: bool) -> AppResult<String> {
    validate_ddmmss("RA", ra)?;
    validate_ddmmss("DEC", dec)?;
    Ok(format!("TSRA {} {} {}", ra, dec, u8::from(western)))
}

/// `TSHA ha da`: set the target in axis coordinates.
pub fn tsha_command(ha: &str, da: &str) -> AppResult<String> {
    validate_degrees("H.A.", ha, -180.0, 330.0)?;
    validate_degrees("D.A.", da, -90.0, 270.0)?;
    Ok(format!("TSHA {} {}", ha, da))
}

/// `SPAP 13 increments`: move the grating to an angle `D:M[.MMM]`.
pub fn grating_command(angle: &str) -> AppResult<String> {
    Ok(format!("SPAP 13 {}", parse_grating_angle(angle)?))
}

/// `SPCH 1 position`: move the dichroic mirror.
pub fn dichroic_mirror_command(position: i32) -> String {
    format!("SPCH 1 {}", position)
}

/// `SPCH 2 position`: move the spectral filter.
pub fn spectral_filter_command(position: i32) -> String {
    format!("SPCH 2 {}", position)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_time_formats() {
        assert_eq!(parse_exposure_time("01:30:00").unwrap(), 5400);
        assert_eq!(parse_exposure_time("45:00").unwrap(), 2700);
        assert_eq!(parse_exposure_time("90").unwrap(), 90);
        assert_eq!(parse_exposure_time("1:2:3").unwrap(), 3723);
        assert_eq!(parse_exposure_time("99999").unwrap(), 99999);
    }

    #[test]
    fn exposure_time_rejects_other_formats() {
        for input in ["", "1:30:00:00", "123456", "1.5", "abc", "001:00", " 90"] {
            let err = parse_exposure_time(input).unwrap_err();
            let message = err.to_string();
            assert!(message.contains("[H]H:[M]M:[S]S"), "{}", input);
            assert!(message.contains("[M]M:[S]S"));
            assert!(message.contains("[SSSS]S"));
        }
    }

    #[test]
    fn exposure_meter_counts() {
        assert_eq!(parse_exposure_meter("2").unwrap(), 2_000_000);
        assert_eq!(parse_exposure_meter("0.5").unwrap(), 500_000);
        assert_eq!(parse_exposure_meter("1234.000001").unwrap(), 1_234_000_001);
        assert_eq!(parse_exposure_meter("3.").unwrap(), 3_000_000);
        assert!(parse_exposure_meter("1.1234567").is_err());
        assert!(parse_exposure_meter("-1").is_err());
        assert!(parse_exposure_meter("1k").unwrap_err().to_string().contains("Mcounts"));
    }

    #[test]
    fn grating_angle_input() {
        assert_eq!(parse_grating_angle("22:44").unwrap(), 8000);
        assert_eq!(grating_command("22:44").unwrap(), "SPAP 13 8000");
        assert!(parse_grating_angle("22:44.5").is_ok());
        assert_eq!(
            parse_grating_angle("22").unwrap_err().to_string(),
            "Grating angle must be [DD]D:[M]M[.MMM]"
        );
        assert!(parse_grating_angle("22:123").is_err());
    }

    #[test]
    fn telescope_coordinates() {
        assert_eq!(
            tsra_command("235912.1", "-102312", true).unwrap(),
            "TSRA 235912.1 -102312 1"
        );
        assert_eq!(
            tsra_command("010203", "+452000.123", false).unwrap(),
            "TSRA 010203 +452000.123 0"
        );
        let err = tsra_command("23591", "+452000", false).unwrap_err();
        assert_eq!(err.to_string(), "RA must be [+/-]DDMMSS[.SSS]");
        assert!(tsra_command("235912", "45:20:00", false).is_err());
    }

    #[test]
    fn axis_coordinates() {
        assert_eq!(tsha_command("-180", "270").unwrap(), "TSHA -180 270");
        assert_eq!(tsha_command("15.25", "-90.0").unwrap(), "TSHA 15.25 -90.0");
        assert!(tsha_command("-180.5", "0").is_err());
        assert!(tsha_command("331", "0").is_err());
        assert!(tsha_command("0", "271").is_err());
        assert!(tsha_command("0", "1e2").is_err());
    }

    #[test]
    fn spectrograph_positions() {
        assert_eq!(dichroic_mirror_command(3), "SPCH 1 3");
        assert_eq!(spectral_filter_command(2), "SPCH 2 2");
    }
}
