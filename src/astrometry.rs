//! Sky position of the telescope pointing.
//!
//! The telescope decoder needs local sidereal time, altitude, azimuth and airmass for the
//! current pointing. They come from an [`Astrometry`] collaborator so that a different
//! site model (or a fixed one in tests) can be plugged in. [`SiteAstrometry`] is the
//! default: mean sidereal time and a plane-parallel horizon transform for a single site,
//! with the Hardie airmass polynomial. It ignores precession, nutation and refraction,
//! which is well inside the display precision of the operator panels.

use chrono::{DateTime, Utc};

use crate::config::SiteConfig;

/// Unix epoch as a Julian date.
const JD_UNIX_EPOCH: f64 = 2_440_587.5;
/// J2000.0 as a Julian date.
const JD_J2000: f64 = 2_451_545.0;

/// Computed position of one pointing at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    /// Local sidereal time in hours, `0.0..24.0`.
    pub lst_hours: f64,
    /// Altitude above the horizon in degrees.
    pub altitude_deg: f64,
    /// Azimuth in degrees, north through east, `0.0..360.0`.
    pub azimuth_deg: f64,
    /// Relative airmass; `None` at or below the horizon.
    pub airmass: Option<f64>,
}

/// Astrometric collaborator used by the telescope decoder.
pub trait Astrometry: Send + Sync {
    /// Position of `ra_hours`/`dec_deg` at `ut`.
    fn compute(&self, ra_hours: f64, dec_deg: f64, ut: DateTime<Utc>) -> SkyPosition;
}

/// Single-site astrometry.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteAstrometry {
    /// East-positive longitude in degrees.
    pub longitude_deg: f64,
    /// North-positive latitude in degrees.
    pub latitude_deg: f64,
}

impl SiteAstrometry {
    pub fn new(longitude_deg: f64, latitude_deg: f64) -> Self {
        Self {
            longitude_deg,
            latitude_deg,
        }
    }

    pub fn from_config(site: &SiteConfig) -> Self {
        Self::new(site.longitude_deg, site.latitude_deg)
    }

    /// Local mean sidereal time in hours.
    #[must_use]
    pub fn local_sidereal_time(&self, ut: DateTime<Utc>) -> f64 {
        let gmst = greenwich_sidereal_time(ut);
        (gmst + self.longitude_deg / 15.0).rem_euclid(24.0)
    }
}

impl Default for SiteAstrometry {
    fn default() -> Self {
        Self::from_config(&SiteConfig::default())
    }
}

impl Astrometry for SiteAstrometry {
    fn compute(&self, ra_hours: f64, dec_deg: f64, ut: DateTime<Utc>) -> SkyPosition {
        let lst_hours = self.local_sidereal_time(ut);
        let hour_angle = ((lst_hours - ra_hours) * 15.0).to_radians();
        let dec = dec_deg.to_radians();
        let lat = self.latitude_deg.to_radians();

        let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * hour_angle.cos();
        let altitude = sin_alt.clamp(-1.0, 1.0).asin();

        let azimuth = (-dec.cos() * hour_angle.sin())
            .atan2(dec.sin() * lat.cos() - dec.cos() * lat.sin() * hour_angle.cos())
            .to_degrees()
            .rem_euclid(360.0);

        SkyPosition {
            lst_hours,
            altitude_deg: altitude.to_degrees(),
            azimuth_deg: azimuth,
            airmass: airmass(altitude),
        }
    }
}

/// Greenwich mean sidereal time in hours.
fn greenwich_sidereal_time(ut: DateTime<Utc>) -> f64 {
    let seconds = ut.timestamp() as f64 + f64::from(ut.timestamp_subsec_millis()) / 1000.0;
    let jd = JD_UNIX_EPOCH + seconds / 86_400.0;
    (18.697_374_558 + 24.065_709_824_419_08 * (jd - JD_J2000)).rem_euclid(24.0)
}

/// Hardie (1962) polynomial in `sec z - 1`.
fn airmass(altitude: f64) -> Option<f64> {
    if altitude <= 0.0 {
        return None;
    }
    let sec_z = 1.0 / altitude.sin();
    let x = sec_z - 1.0;
    Some(sec_z - 0.001_816_7 * x - 0.002_875 * x * x - 0.000_808_3 * x * x * x)
}
