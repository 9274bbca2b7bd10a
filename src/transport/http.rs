//! HTTPS transport to the observe server.
//!
//! Requests go to `https://<host>:<port><base_path>/<resource>` with HTTP basic
//! authentication. Bodies are XML in both directions.
//!
//! | Operation                     | Request                                   |
//! |-------------------------------|-------------------------------------------|
//! | telescope / spectrograph poll | `GET telescope`, `GET spectrograph`       |
//! | detector poll                 | `GET <instrument>`                        |
//! | setup document                | `GET setup/exposure_<instrument>.xml`     |
//! | manual setup document         | `GET setup/exposure_manual.xml`           |
//! | client versions               | `GET setup/client.xml`                    |
//! | connect handshake             | `GET users/<username>`                    |
//! | command                       | `PUT <target>` with an `<*_execute>` body |
//!
//! Path segments are percent-encoded, so a username may contain any character. Any
//! status other than `200 OK` becomes [`ObserveError::Status`].

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::{
    ClientVersion, ConnectionParams, ExposeInfo, ManualSetupDocument, SetupDocument,
    SpectrographInfo, TelescopeInfo, Transport, UserInfo,
};
use crate::config::ObserveConfig;
use crate::error::{AppResult, ObserveError};
use crate::instrument::Instrument;

const XML: &str = "application/xml";

/// HTTP client settings that survive a reload.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Path prefix of the REST resources.
    pub base_path: String,
    /// How long to wait for the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// How long to wait for a complete answer.
    pub read_timeout: Duration,
    /// Accept self-signed server certificates.
    pub accept_invalid_certs: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            base_path: "/observe".to_string(),
            connect_timeout: Duration::from_millis(5000),
            read_timeout: Duration::from_millis(5000),
            accept_invalid_certs: true,
        }
    }
}

impl HttpSettings {
    /// Extract the HTTP settings from the client configuration.
    #[must_use]
    pub fn from_config(config: &ObserveConfig) -> Self {
        Self {
            base_path: config.server.base_path.clone(),
            connect_timeout: Duration::from_millis(config.session.connect_timeout_ms),
            read_timeout: Duration::from_millis(config.session.read_timeout_ms),
            accept_invalid_certs: config.server.accept_invalid_certs,
        }
    }
}

struct Endpoint {
    client: Client,
    base_url: String,
    params: ConnectionParams,
}

/// Body of a `PUT` command request and its answer.
#[derive(Debug, Serialize, Deserialize)]
struct ExecuteDocument {
    function_name: String,
    #[serde(rename = "function_params", default)]
    function_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<String>,
}

/// [`Transport`] over HTTPS with basic authentication.
pub struct HttpTransport {
    settings: HttpSettings,
    endpoint: RwLock<Endpoint>,
}

impl HttpTransport {
    /// Build a transport for `params`. No request is sent yet.
    pub fn new(params: ConnectionParams, settings: HttpSettings) -> AppResult<Self> {
        let endpoint = Self::build_endpoint(&settings, params)?;
        Ok(Self {
            settings,
            endpoint: RwLock::new(endpoint),
        })
    }

    fn build_endpoint(settings: &HttpSettings, params: ConnectionParams) -> AppResult<Endpoint> {
        let client = Client::builder()
            .use_rustls_tls()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.connect_timeout + settings.read_timeout)
            .build()?;

        let base_url = format!(
            "https://{}:{}{}",
            params.host,
            params.port,
            settings.base_path.trim_end_matches('/')
        );
        debug!(url = %base_url, user = %params.username, "HTTP transport ready");

        Ok(Endpoint {
            client,
            base_url,
            params,
        })
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> AppResult<T> {
        let endpoint = self.endpoint.read().await;
        let url = resource_url(&endpoint.base_url, segments)?;
        trace!(%url, "GET");

        let response = endpoint
            .client
            .get(url)
            .basic_auth(&endpoint.params.username, Some(&endpoint.params.password))
            .header(ACCEPT, XML)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ObserveError::status(response.status().as_u16()));
        }

        let body = response.text().await?;
        Ok(quick_xml::de::from_str(&body)?)
    }

    async fn put_execute(
        &self,
        resource: &str,
        root: &str,
        function: &str,
        args: &[String],
    ) -> AppResult<String> {
        let document = ExecuteDocument {
            function_name: function.to_string(),
            function_params: args.to_vec(),
            result: None,
        };
        let body = quick_xml::se::to_string_with_root(root, &document)
            .map_err(|e| ObserveError::Document(e.to_string()))?;

        let endpoint = self.endpoint.read().await;
        let url = resource_url(&endpoint.base_url, &[resource])?;
        trace!(%url, %function, "PUT");

        let response = endpoint
            .client
            .put(url)
            .basic_auth(&endpoint.params.username, Some(&endpoint.params.password))
            .header(ACCEPT, XML)
            .header(CONTENT_TYPE, XML)
            .body(body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(ObserveError::status(response.status().as_u16()));
        }

        let text = response.text().await?;
        let answer: ExecuteDocument = quick_xml::de::from_str(&text)?;
        Ok(answer.result.unwrap_or_default())
    }
}

/// Append percent-encoded path `segments` to `base_url`.
fn resource_url(base_url: &str, segments: &[&str]) -> AppResult<Url> {
    let mut url =
        Url::parse(base_url).map_err(|e| ObserveError::Transport(format!("{}: {}", base_url, e)))?;
    url.path_segments_mut()
        .map_err(|()| ObserveError::Transport(format!("{}: not a base URL", base_url)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_telescope_state(&self) -> AppResult<TelescopeInfo> {
        self.get(&["telescope"]).await
    }

    async fn get_spectrograph_state(&self) -> AppResult<SpectrographInfo> {
        self.get(&["spectrograph"]).await
    }

    async fn get_expose_state(&self, instrument: Instrument) -> AppResult<ExposeInfo> {
        self.get(&[instrument.name()]).await
    }

    async fn get_setup_document(&self, instrument: Instrument) -> AppResult<SetupDocument> {
        let file = format!("exposure_{}.xml", instrument.name());
        let mut document: SetupDocument = self.get(&["setup", file.as_str()]).await?;
        document.instrument = instrument;
        Ok(document)
    }

    async fn get_manual_setup_document(&self) -> AppResult<ManualSetupDocument> {
        self.get(&["setup", "exposure_manual.xml"]).await
    }

    async fn get_client_version_document(&self) -> AppResult<ClientVersion> {
        self.get(&["setup", "client.xml"]).await
    }

    async fn get_user(&self, username: &str) -> AppResult<UserInfo> {
        self.get(&["users", username]).await
    }

    async fn execute_telescope_command(
        &self,
        function: &str,
        args: &[String],
    ) -> AppResult<String> {
        self.put_execute("telescope", "telescope_execute", function, args)
            .await
    }

    async fn execute_spectrograph_command(
        &self,
        function: &str,
        args: &[String],
    ) -> AppResult<String> {
        self.put_execute("spectrograph", "spectrograph_execute", function, args)
            .await
    }

    async fn execute_expose_command(
        &self,
        instrument: Instrument,
        function: &str,
        args: &[String],
    ) -> AppResult<String> {
        self.put_execute(instrument.name(), "expose_execute", function, args)
            .await
    }

    async fn reload(&self, params: &ConnectionParams) -> AppResult<()> {
        let endpoint = Self::build_endpoint(&self.settings, params.clone())?;
        *self.endpoint.write().await = endpoint;
        Ok(())
    }
}
