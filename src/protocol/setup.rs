//! Exposure setups.
//!
//! A setup positions the coudé optics for one wavelength range: grating angle, dichroic
//! mirror and spectral filter. Predefined setups come from the per-detector setup
//! document; a "Manual" setup is computed for an arbitrary central wavelength from the
//! quadratic calibration in the manual setup document.

use super::input::{dichroic_mirror_command, grating_command, spectral_filter_command};
use crate::command::Command;
use crate::error::{AppResult, ObserveError};
use crate::instrument::Instrument;
use crate::transport::{CoefItem, ManualSetupDocument, SetupExposure};

/// Name given to computed setups.
pub const MANUAL_SETUP_NAME: &str = "Manual";

fn coefficients<'a>(items: &'a [CoefItem], wavelength: f64, what: &str) -> AppResult<&'a CoefItem> {
    items
        .iter()
        .find(|item| wavelength < item.central_wavelength_max)
        .ok_or_else(|| {
            ObserveError::InvalidInput(format!(
                "No {} calibration for central wavelength {}",
                what, wavelength
            ))
        })
}

fn quadratic(coef: &CoefItem, x: f64) -> f64 {
    coef.a * x * x + coef.b * x + coef.c
}

/// Compute the setup for `central_wavelength` (Angstrom).
///
/// The grating angle is rounded to whole arc minutes before the wavelength range is
/// evaluated, so the range describes the angle that will actually be set.
pub fn manual_setup(
    document: &ManualSetupDocument,
    central_wavelength: i32,
) -> AppResult<SetupExposure> {
    let wavelength = f64::from(central_wavelength);

    let coef_angle = coefficients(&document.coef_angle.items, wavelength, "angle")?;
    let coef_short = coefficients(&document.coef_short.items, wavelength, "short range")?;
    let coef_long = coefficients(&document.coef_long.items, wavelength, "long range")?;

    let angle = quadratic(coef_angle, wavelength);
    let mut degrees = angle.trunc();
    let mut minutes = ((angle - degrees) * 60.0).round();
    if minutes == 60.0 {
        degrees += 1.0;
        minutes = 0.0;
    }
    let angle = degrees + minutes / 60.0;

    let wave_short = quadratic(coef_short, angle);
    let wave_long = quadratic(coef_long, angle);

    let optics = document
        .setup
        .items
        .iter()
        .find(|item| wavelength < item.central_wavelength_max)
        .ok_or_else(|| {
            ObserveError::InvalidInput(format!(
                "No optics setup for central wavelength {}",
                central_wavelength
            ))
        })?;

    Ok(SetupExposure {
        name: MANUAL_SETUP_NAME.to_string(),
        ga: format!("{:.0}:{:.0}", degrees, minutes),
        range: format!("{:.0}-{:.0}", wave_short, wave_long),
        dm: optics.dichroic_mirror,
        sf: optics.spectral_filter,
        flat: optics.flat_expose_time,
        comp: optics.comp_expose_time,
    })
}

/// Spectrograph commands that apply `setup` for `instrument`.
///
/// The OES detector has its own fixed optics, so no commands are produced for it.
pub fn setup_commands(instrument: Instrument, setup: &SetupExposure) -> AppResult<Vec<Command>> {
    if instrument == Instrument::Oes {
        return Ok(Vec::new());
    }
    Ok(vec![
        Command::spectrograph(grating_command(&setup.ga)?),
        Command::spectrograph(dichroic_mirror_command(setup.dm)),
        Command::spectrograph(spectral_filter_command(setup.sf)),
    ])
}
