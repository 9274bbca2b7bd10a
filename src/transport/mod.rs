//! Remote control transport.
//!
//! The session loop talks to the observatory server only through the [`Transport`]
//! trait: a fixed set of typed request/response operations, each returning a decoded
//! document or an [`ObserveError`] carrying the status code.
//!
//! - [`http::HttpTransport`] is the production implementation (HTTPS, basic auth, XML).
//! - [`mock::MockTransport`] is a scriptable in-memory implementation for tests.
//!
//! Documents are plain data. They are decoded once by the transport and then handed to
//! the protocol decoders in [`crate::protocol`], which never fail.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::instrument::Instrument;

/// Where and as whom to connect.
///
/// Supplied at construction and changed only by the reconnect prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Server host name.
    pub host: String,
    /// Server HTTPS port.
    pub port: u16,
    /// Login name, also used for the connect handshake.
    pub username: String,
    /// Password for basic authentication.
    pub password: String,
}

impl ConnectionParams {
    /// `host:port` label used in log lines.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Raw telescope answers bundled by the server (`GET telescope`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "telescope_info", default)]
pub struct TelescopeInfo {
    /// UT of the sample, `YYYY-MM-DD HH:MM:SS`.
    pub ut: String,
    /// Global state line.
    pub glst: String,
    /// Right ascension and declination (`TRRD`).
    pub trrd: String,
    /// Hour and declination axis (`TRHD`).
    pub trhd: String,
    /// Guiding value (`TRGV`).
    pub trgv: String,
    /// User speed (`TRUS`).
    pub trus: String,
    /// Dome position (`DOPO`).
    pub dopo: String,
    /// Correction set (`TRCS`).
    pub trcs: String,
    /// Focus position (`FOPO`).
    pub fopo: String,
    /// Last source set with `TSRA`.
    pub tsra: String,
    /// Object name belonging to `tsra`.
    pub object: String,
}

/// Raw spectrograph answers (`GET spectrograph`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "spectrograph_info", default)]
pub struct SpectrographInfo {
    pub glst: String,
    pub spgp_4: String,
    pub spgp_5: String,
    pub spgp_13: String,
    pub spce_14: String,
    pub spfe_14: String,
    pub spce_24: String,
    pub spfe_24: String,
    pub spgp_22: String,
    pub spgs_19: String,
    pub spgs_20: String,
}

/// Exposure daemon state for one detector (`GET <instrument>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "expose_info", default)]
pub struct ExposeInfo {
    pub filename: String,
    /// Lifecycle phase as reported by the daemon (`ready`, `exposing`, `readout`, ...).
    pub state: String,
    /// Elapsed exposure time in seconds.
    pub elapsed_time: Option<i64>,
    /// Requested exposure time in seconds.
    pub full_time: Option<i64>,
    pub archive: Option<i64>,
    pub expose_number: Option<i64>,
    pub expose_count: Option<i64>,
    pub path: String,
    pub archive_path: String,
    pub paths: String,
    pub archive_paths: String,
    pub instrument: String,
    pub ccd_temp: Option<f64>,
}

impl ExposeInfo {
    /// Case-insensitive instrument comparison.
    #[must_use]
    pub fn is_instrument(&self, instrument: Instrument) -> bool {
        self.instrument.eq_ignore_ascii_case(instrument.name())
    }

    /// Case-insensitive phase comparison.
    #[must_use]
    pub fn is_state(&self, state: &str) -> bool {
        self.state.eq_ignore_ascii_case(state)
    }

    /// True when the CCD temperature is outside the working range (-150..=-98 °C).
    ///
    /// A missing temperature is not an alarm.
    #[must_use]
    pub fn is_ccd_temp_alarm(&self) -> bool {
        match self.ccd_temp {
            Some(temp) => !(-150.0..=-98.0).contains(&temp),
            None => false,
        }
    }
}

/// One predefined exposure setup (grating angle, mirror, filter, calibration times).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "setup_exposure", default)]
pub struct SetupExposure {
    pub name: String,
    /// Grating angle `D:M`.
    pub ga: String,
    /// Wavelength range `short-long`.
    pub range: String,
    /// Dichroic mirror position.
    pub dm: i32,
    /// Spectral filter position.
    pub sf: i32,
    /// Flat exposure time in seconds.
    pub flat: i32,
    /// Comparison exposure time in seconds.
    pub comp: i32,
}

/// Setup list for one detector (`GET setup/exposure_<instrument>.xml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "setup_exposure_list")]
pub struct SetupDocument {
    /// Filled in by the transport, not part of the wire document.
    #[serde(skip, default = "default_setup_instrument")]
    pub instrument: Instrument,
    #[serde(rename = "setup_exposure", default)]
    pub entries: Vec<SetupExposure>,
}

fn default_setup_instrument() -> Instrument {
    Instrument::Ccd700
}

impl SetupDocument {
    /// Look up a setup by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SetupExposure> {
        self.entries.iter().find(|entry| entry.name == name)
    }
}

/// Quadratic coefficients valid below `central_wavelength_max`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoefItem {
    #[serde(rename = "@centralWaveLengthMax")]
    pub central_wavelength_max: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

/// Optics positions valid below `central_wavelength_max`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetupItem {
    #[serde(rename = "@centralWaveLengthMax")]
    pub central_wavelength_max: f64,
    #[serde(rename = "dichroicMirror")]
    pub dichroic_mirror: i32,
    #[serde(rename = "spectralFilter")]
    pub spectral_filter: i32,
    #[serde(rename = "flatExposeTime")]
    pub flat_expose_time: i32,
    #[serde(rename = "compExposeTime")]
    pub comp_expose_time: i32,
}

/// Wrapper for a list of `<item>` elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemList<T> {
    #[serde(rename = "item", default = "Vec::new")]
    pub items: Vec<T>,
}

/// Central-wavelength calibration (`GET setup/exposure_manual.xml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "manualSetupExposure", default)]
pub struct ManualSetupDocument {
    #[serde(rename = "coefAngle")]
    pub coef_angle: ItemList<CoefItem>,
    #[serde(rename = "coefShort")]
    pub coef_short: ItemList<CoefItem>,
    #[serde(rename = "coefLong")]
    pub coef_long: ItemList<CoefItem>,
    pub setup: ItemList<SetupItem>,
}

/// Released client versions (`GET setup/client.xml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "client", default)]
pub struct ClientVersion {
    pub version_actual: Option<u32>,
    pub version_min: Option<u32>,
}

/// Build number of this client, compared against [`ClientVersion`].
pub const CLIENT_BUILD: u32 = 20150103;

impl ClientVersion {
    /// Operator notice when `build` is older than the current release.
    #[must_use]
    pub fn deprecation_notice(&self, build: u32) -> Option<String> {
        let actual = self.version_actual?;
        if build >= actual {
            return None;
        }
        Some(format!(
            "{} is deprecated version, please download new version {}",
            build, actual
        ))
    }
}

/// Account record returned by the connect handshake (`GET users/<name>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename = "user", default)]
pub struct UserInfo {
    pub login: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub email: String,
    pub permission: String,
}

/// Operations the session loop consumes from the remote control server.
///
/// Every call resolves to a decoded document or fails with an
/// [`ObserveError`](crate::error::ObserveError); a non-OK HTTP answer is
/// `ObserveError::Status` with the code. Connect/read timeouts are enforced by the
/// implementation and surface as ordinary failures.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Poll the telescope.
    async fn get_telescope_state(&self) -> AppResult<TelescopeInfo>;

    /// Poll the spectrograph.
    async fn get_spectrograph_state(&self) -> AppResult<SpectrographInfo>;

    /// Poll one detector.
    async fn get_expose_state(&self, instrument: Instrument) -> AppResult<ExposeInfo>;

    /// Fetch the predefined exposure setups of one detector.
    async fn get_setup_document(&self, instrument: Instrument) -> AppResult<SetupDocument>;

    /// Fetch the central-wavelength calibration.
    async fn get_manual_setup_document(&self) -> AppResult<ManualSetupDocument>;

    /// Fetch the released client versions.
    async fn get_client_version_document(&self) -> AppResult<ClientVersion>;

    /// Fetch one account; used as the authenticated connect handshake.
    async fn get_user(&self, username: &str) -> AppResult<UserInfo>;

    /// Forward a telescope function call, returning its textual answer.
    async fn execute_telescope_command(&self, function: &str, args: &[String])
        -> AppResult<String>;

    /// Forward a spectrograph function call, returning its textual answer.
    async fn execute_spectrograph_command(
        &self,
        function: &str,
        args: &[String],
    ) -> AppResult<String>;

    /// Forward a detector function call, returning its textual answer.
    async fn execute_expose_command(
        &self,
        instrument: Instrument,
        function: &str,
        args: &[String],
    ) -> AppResult<String>;

    /// Rebuild the underlying connection after the parameters changed.
    async fn reload(&self, params: &ConnectionParams) -> AppResult<()>;
}
