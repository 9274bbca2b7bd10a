//! In-memory transport for tests and offline runs.
//!
//! `MockTransport` answers every poll with a canned document and records every call in
//! order, so tests can assert on ordering (commands drained before polls, poll order,
//! one-shot init fetches). Failures are scripted per operation:
//!
//! ```rust,ignore
//! let transport = MockTransport::new();
//! transport.fail_poll(Instrument::Ccd400, 503, 1); // next ccd400 poll answers 503
//! transport.fail_handshake(401, 1);                 // next login is rejected
//! transport.fail_poll_with(Instrument::Telescope, ObserveError::Transport("timed out".into()));
//! transport.fail_setup(Instrument::Oes, ObserveError::status(500));
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{
    ClientVersion, ConnectionParams, ExposeInfo, ManualSetupDocument, SetupDocument,
    SpectrographInfo, TelescopeInfo, Transport, UserInfo,
};
use crate::error::{AppResult, ObserveError};
use crate::instrument::Instrument;

/// One recorded command execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    /// Routing target used by the transport.
    pub target: Instrument,
    /// Remote function name.
    pub function: String,
    /// Positional parameters.
    pub args: Vec<String>,
}

#[derive(Default)]
struct MockState {
    telescope: TelescopeInfo,
    spectrograph: SpectrographInfo,
    expose: HashMap<Instrument, ExposeInfo>,
    setups: HashMap<Instrument, SetupDocument>,
    manual_setup: ManualSetupDocument,
    client_version: ClientVersion,
    /// Remaining scripted failures per polled instrument.
    poll_failures: HashMap<Instrument, VecDeque<ObserveError>>,
    setup_failures: HashMap<Instrument, VecDeque<ObserveError>>,
    manual_setup_failures: VecDeque<ObserveError>,
    handshake_failures: VecDeque<u16>,
    command_failures: VecDeque<u16>,
    answers: HashMap<String, String>,
    calls: Vec<String>,
    executed: Vec<ExecutedCommand>,
    reloads: Vec<ConnectionParams>,
}

/// Scriptable [`Transport`] with canned documents.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    /// Create a transport with plausible documents for every instrument.
    pub fn new() -> Self {
        let transport = Self::default();
        {
            let mut state = transport.lock();
            state.telescope = TelescopeInfo {
                ut: "2014-05-06 21:00:00".into(),
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
            };
            state.spectrograph = SpectrographInfo {
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
            };
            for instrument in Instrument::DETECTORS {
                state.expose.insert(
                    instrument,
                    ExposeInfo {
                        filename: format!("{}001.fit", instrument.name()),
                        state: "ready".into(),
                        elapsed_time: Some(0),
                        full_time: Some(0),
                        instrument: instrument.name().into(),
                        ccd_temp: Some(-115.0),
                        ..Default::default()
                    },
                );
                state.setups.insert(
                    instrument,
                    SetupDocument {
                        instrument,
                        entries: Vec::new(),
                    },
                );
            }
            state.client_version = ClientVersion {
                version_actual: Some(super::CLIENT_BUILD),
                version_min: Some(super::CLIENT_BUILD),
            };
            state.answers.insert(
                "expose_get READOUT_SPEEDS".into(),
                "+OK READOUT_SPEEDS = 50kHz 100kHz".into(),
            );
            state
                .answers
                .insert("expose_get GAINS".into(), "+OK GAINS = low high".into());
            state.answers.insert(
                "expose_get_key OBJECT".into(),
                "+OK OBJECT = HD 1234 / Object name".into(),
            );
            state.answers.insert(
                "expose_get_key IMAGETYP".into(),
                "+OK IMAGETYP = object / Image type".into(),
            );
        }
        transport
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `times` polls of `instrument` fail with `status`.
    pub fn fail_poll(&self, instrument: Instrument, status: u16, times: usize) {
        let mut state = self.lock();
        let queue = state.poll_failures.entry(instrument).or_default();
        queue.extend((0..times).map(|_| ObserveError::status(status)));
    }

    /// Make the next poll of `instrument` fail with `error`, e.g. a transport timeout.
    pub fn fail_poll_with(&self, instrument: Instrument, error: ObserveError) {
        self.lock()
            .poll_failures
            .entry(instrument)
            .or_default()
            .push_back(error);
    }

    /// Make the next setup document fetch for `instrument` fail with `error`.
    pub fn fail_setup(&self, instrument: Instrument, error: ObserveError) {
        self.lock()
            .setup_failures
            .entry(instrument)
            .or_default()
            .push_back(error);
    }

    /// Make the next manual setup document fetch fail with `error`.
    pub fn fail_manual_setup(&self, error: ObserveError) {
        self.lock().manual_setup_failures.push_back(error);
    }

    /// Make the next `times` connect handshakes fail with `status`.
    pub fn fail_handshake(&self, status: u16, times: usize) {
        self.lock()
            .handshake_failures
            .extend(std::iter::repeat(status).take(times));
    }

    /// Make the next `times` command executions fail with `status`.
    pub fn fail_commands(&self, status: u16, times: usize) {
        self.lock()
            .command_failures
            .extend(std::iter::repeat(status).take(times));
    }

    /// Answer `function` (optionally only when called with `first_arg`) with `answer`.
    pub fn set_answer(&self, function: &str, first_arg: Option<&str>, answer: &str) {
        let key = match first_arg {
            Some(arg) => format!("{} {}", function, arg),
            None => function.to_string(),
        };
        self.lock().answers.insert(key, answer.to_string());
    }

    /// Replace the telescope document.
    pub fn set_telescope(&self, info: TelescopeInfo) {
        self.lock().telescope = info;
    }

    /// Replace the spectrograph document.
    pub fn set_spectrograph(&self, info: SpectrographInfo) {
        self.lock().spectrograph = info;
    }

    /// Replace one detector's expose document.
    pub fn set_expose(&self, instrument: Instrument, info: ExposeInfo) {
        self.lock().expose.insert(instrument, info);
    }

    /// Replace one detector's setup document.
    pub fn set_setup(&self, document: SetupDocument) {
        self.lock().setups.insert(document.instrument, document);
    }

    /// Every call in the order it was made, e.g. `"poll telescope"` or `"execute ccd700 expose_start"`.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Commands executed so far, in execution order.
    pub fn executed(&self) -> Vec<ExecutedCommand> {
        self.lock().executed.clone()
    }

    /// Parameters passed to every `reload`.
    pub fn reloads(&self) -> Vec<ConnectionParams> {
        self.lock().reloads.clone()
    }

    /// Forget recorded calls and executions.
    pub fn clear_calls(&self) {
        let mut state = self.lock();
        state.calls.clear();
        state.executed.clear();
    }

    fn poll(&self, instrument: Instrument) -> AppResult<MutexGuard<'_, MockState>> {
        let mut state = self.lock();
        state.calls.push(format!("poll {}", instrument));
        let failure = state
            .poll_failures
            .get_mut(&instrument)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }

    fn execute(&self, target: Instrument, function: &str, args: &[String]) -> AppResult<String> {
        let mut state = self.lock();
        state.calls.push(format!("execute {} {}", target, function));
        if let Some(code) = state.command_failures.pop_front() {
            return Err(ObserveError::status(code));
        }
        state.executed.push(ExecutedCommand {
            target,
            function: function.to_string(),
            args: args.to_vec(),
        });

        let keyed = args
            .first()
            .and_then(|arg| state.answers.get(&format!("{} {}", function, arg)));
        let answer = keyed
            .or_else(|| state.answers.get(function))
            .cloned()
            .unwrap_or_else(|| "+OK".to_string());
        Ok(answer)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get_telescope_state(&self) -> AppResult<TelescopeInfo> {
        Ok(self.poll(Instrument::Telescope)?.telescope.clone())
    }

    async fn get_spectrograph_state(&self) -> AppResult<SpectrographInfo> {
        Ok(self.poll(Instrument::Spectrograph)?.spectrograph.clone())
    }

    async fn get_expose_state(&self, instrument: Instrument) -> AppResult<ExposeInfo> {
        let state = self.poll(instrument)?;
        state
            .expose
            .get(&instrument)
            .cloned()
            .ok_or_else(|| ObserveError::status(404))
    }

    async fn get_setup_document(&self, instrument: Instrument) -> AppResult<SetupDocument> {
        let mut state = self.lock();
        state.calls.push(format!("setup {}", instrument));
        if let Some(error) = state
            .setup_failures
            .get_mut(&instrument)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        state
            .setups
            .get(&instrument)
            .cloned()
            .ok_or_else(|| ObserveError::status(404))
    }

    async fn get_manual_setup_document(&self) -> AppResult<ManualSetupDocument> {
        let mut state = self.lock();
        state.calls.push("manual setup".to_string());
        if let Some(error) = state.manual_setup_failures.pop_front() {
            return Err(error);
        }
        Ok(state.manual_setup.clone())
    }

    async fn get_client_version_document(&self) -> AppResult<ClientVersion> {
        let mut state = self.lock();
        state.calls.push("client version".to_string());
        Ok(state.client_version.clone())
    }

    async fn get_user(&self, username: &str) -> AppResult<UserInfo> {
        let mut state = self.lock();
        state.calls.push(format!("user {}", username));
        if let Some(code) = state.handshake_failures.pop_front() {
            return Err(ObserveError::status(code));
        }
        Ok(UserInfo {
            login: username.to_string(),
            permission: "observer".into(),
            ..Default::default()
        })
    }

    async fn execute_telescope_command(
        &self,
        function: &str,
        args: &[String],
    ) -> AppResult<String> {
        self.execute(Instrument::Telescope, function, args)
    }

    async fn execute_spectrograph_command(
        &self,
        function: &str,
        args: &[String],
    ) -> AppResult<String> {
        self.execute(Instrument::Spectrograph, function, args)
    }

    async fn execute_expose_command(
        &self,
        instrument: Instrument,
        function: &str,
        args: &[String],
    ) -> AppResult<String> {
        self.execute(instrument, function, args)
    }

    async fn reload(&self, params: &ConnectionParams) -> AppResult<()> {
        let mut state = self.lock();
        state.calls.push("reload".to_string());
        state.reloads.push(params.clone());
        Ok(())
    }
}
