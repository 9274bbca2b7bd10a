//! Operator commands and the single-consumer command queue.
//!
//! A [`Command`] is an immutable intent: call one remote function with positional
//! parameters on one instrument. Producers hold a clonable [`CommandSender`]; the session
//! loop owns the only [`CommandQueue`] and drains it at the top of every poll cycle, so
//! commands run strictly one at a time in enqueue order and never race each other on the
//! hardware.
//!
//! ```rust,ignore
//! let (sender, mut queue) = command_queue();
//! sender.enqueue(Command::telescope("TSRA 235912 -102312 0"))?;
//! queue.drain_and_execute_all(&transport, &events).await;
//! ```

use std::fmt;
use tokio::sync::mpsc;

use crate::error::{AppResult, ObserveError};
use crate::events::{EventPublisher, LogLevel};
use crate::instrument::Instrument;
use crate::transport::Transport;

/// Remote function forwarding a raw ASCOL line to the telescope.
pub const TELESCOPE_EXECUTE: &str = "telescope_execute";
/// Remote function forwarding a raw ASCOL line to the spectrograph.
pub const SPECTROGRAPH_EXECUTE: &str = "spectrograph_execute";

/// Leading marker of a daemon error answer.
const ERROR_MARKER: &str = "ERR";

/// Classification of a textual command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerKind {
    /// Answer starting with `ERR`; logged as a warning, not a failure.
    Error,
    Ok,
}

/// Classify a command answer by its leading marker.
#[must_use]
pub fn classify_answer(answer: &str) -> AnswerKind {
    if answer.starts_with(ERROR_MARKER) {
        AnswerKind::Error
    } else {
        AnswerKind::Ok
    }
}

/// One remote function call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Instrument the call is routed to; `None` cannot be executed.
    pub target: Option<Instrument>,
    /// Remote function name, e.g. `expose_start`.
    pub function: String,
    /// Positional parameters, sent in order.
    pub params: Vec<String>,
}

impl Command {
    /// Call `function` on `target` with `params`.
    pub fn new(
        target: Option<Instrument>,
        function: impl Into<String>,
        params: Vec<String>,
    ) -> Self {
        Self {
            target,
            function: function.into(),
            params,
        }
    }

    /// Wrap a raw ASCOL line for the telescope or the spectrograph.
    ///
    /// Detectors do not speak ASCOL; for them the line is passed as the single parameter
    /// of `expose_execute`, which the daemon rejects with an `ERR` answer.
    pub fn ascol(target: Instrument, line: impl Into<String>) -> Self {
        let function = match target {
            Instrument::Telescope => TELESCOPE_EXECUTE,
            Instrument::Spectrograph => SPECTROGRAPH_EXECUTE,
            _ => "expose_execute",
        };
        Self::new(Some(target), function, vec![line.into()])
    }

    pub fn telescope(line: impl Into<String>) -> Self {
        Self::ascol(Instrument::Telescope, line)
    }

    pub fn spectrograph(line: impl Into<String>) -> Self {
        Self::ascol(Instrument::Spectrograph, line)
    }

    /// Detector function call such as `expose_start` or `expose_set_key`.
    pub fn expose<I, S>(instrument: Instrument, function: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            Some(instrument),
            function,
            params.into_iter().map(Into::into).collect(),
        )
    }

    /// Audit form: `telescope - telescope_execute("TSRA 1 2 0")`.
    #[must_use]
    pub fn audit_line(&self) -> String {
        self.to_string()
    }

    /// Execute against `transport`, returning the daemon's textual answer.
    pub async fn execute(&self, transport: &dyn Transport) -> AppResult<String> {
        match self.target {
            Some(Instrument::Telescope) => {
                transport
                    .execute_telescope_command(&self.function, &self.params)
                    .await
            }
            Some(Instrument::Spectrograph) => {
                transport
                    .execute_spectrograph_command(&self.function, &self.params)
                    .await
            }
            Some(instrument) => {
                transport
                    .execute_expose_command(instrument, &self.function, &self.params)
                    .await
            }
            None => Err(ObserveError::NoTarget(self.audit_line())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(instrument) => write!(f, "{} - {}(", instrument, self.function)?,
            None => write!(f, "none - {}(", self.function)?,
        }
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "\"{}\"", param)?;
        }
        f.write_str(")")
    }
}

/// Create a connected sender/queue pair.
pub fn command_queue() -> (CommandSender, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CommandSender { tx }, CommandQueue { rx })
}

/// Producer handle; clone freely across tasks and threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<Command>,
}

impl CommandSender {
    /// Append `command` to the queue.
    pub fn enqueue(&self, command: Command) -> AppResult<()> {
        self.tx.send(command).map_err(|_| ObserveError::QueueClosed)
    }

    /// Append several commands; they stay contiguous only if no other producer is active.
    pub fn enqueue_all(&self, commands: impl IntoIterator<Item = Command>) -> AppResult<()> {
        commands
            .into_iter()
            .try_for_each(|command| self.enqueue(command))
    }
}

/// Consumer end, owned by the session loop.
#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandQueue {
    /// Execute every queued command in order, returning how many were taken.
    ///
    /// Commands enqueued while draining run in the same drain. An execution failure is
    /// logged and does not stop the drain.
    pub async fn drain_and_execute_all(
        &mut self,
        transport: &dyn Transport,
        events: &EventPublisher,
    ) -> usize {
        let mut count = 0;
        while let Ok(command) = self.rx.try_recv() {
            count += 1;
            events.log(LogLevel::Info, command.audit_line());
            match command.execute(transport).await {
                Ok(answer) => match classify_answer(&answer) {
                    AnswerKind::Error => events.log(LogLevel::Warn, format!("Answer: {}", answer)),
                    AnswerKind::Ok => events.log(LogLevel::Debug, format!("Answer: {}", answer)),
                },
                Err(e) => events.log(LogLevel::Error, format!("Execute failure - {}", e)),
            }
        }
        count
    }

    /// Number of commands waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionEvent;
    use crate::protocol::setup::setup_commands;
    use crate::transport::mock::MockTransport;
    use crate::transport::SetupExposure;
    use tracing_test::traced_test;

    #[test]
    fn audit_line_format() {
        let command = Command::telescope("TSRA 235912 -102312 0");
        assert_eq!(
            command.audit_line(),
            "telescope - telescope_execute(\"TSRA 235912 -102312 0\")"
        );

        let command = Command::expose(Instrument::Ccd700, "expose_set_key", ["OBJECT", "HD 1"]);
        assert_eq!(
            command.audit_line(),
            "ccd700 - expose_set_key(\"OBJECT\", \"HD 1\")"
        );

        let command = Command::new(None, "noop", vec![]);
        assert_eq!(command.audit_line(), "none - noop()");
    }

    #[test]
    fn answer_classification() {
        assert_eq!(classify_answer("ERR busy"), AnswerKind::Error);
        assert_eq!(classify_answer("+OK"), AnswerKind::Ok);
        assert_eq!(classify_answer(""), AnswerKind::Ok);
        assert_eq!(classify_answer(" ERR"), AnswerKind::Ok);
    }

    #[tokio::test]
    async fn routes_by_target() {
        let transport = MockTransport::new();
        Command::spectrograph("SPCH 1 2").execute(&transport).await.unwrap();
        Command::expose(Instrument::Oes, "expose_start", ["10"])
            .execute(&transport)
            .await
            .unwrap();

        let executed = transport.executed();
        assert_eq!(executed[0].target, Instrument::Spectrograph);
        assert_eq!(executed[0].function, SPECTROGRAPH_EXECUTE);
        assert_eq!(executed[1].target, Instrument::Oes);
        assert_eq!(executed[1].args, vec!["10".to_string()]);
    }

    #[tokio::test]
    async fn untargeted_command_is_rejected() {
        let transport = MockTransport::new();
        let err = Command::new(None, "noop", vec![])
            .execute(&transport)
            .await
            .unwrap_err();
        assert!(matches!(err, ObserveError::NoTarget(_)));
        assert!(transport.executed().is_empty());
    }

    #[tokio::test]
    async fn drain_runs_in_order_and_survives_failures() {
        let transport = MockTransport::new();
        transport.fail_commands(500, 1);
        transport.set_answer(TELESCOPE_EXECUTE, Some("TSGM"), "ERR not allowed");

        let (events, mut rx) = EventPublisher::channel();
        let (sender, mut queue) = command_queue();
        sender.enqueue(Command::telescope("TSRA 1 2 0")).unwrap();
        sender.enqueue(Command::telescope("TSGM")).unwrap();
        sender.enqueue(Command::spectrograph("SPCH 1 1")).unwrap();
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.drain_and_execute_all(&transport, &events).await, 3);
        assert!(queue.is_empty());

        // First execution failed, the rest went through in order.
        let lines: Vec<_> = transport
            .executed()
            .into_iter()
            .map(|c| c.args[0].clone())
            .collect();
        assert_eq!(lines, vec!["TSGM", "SPCH 1 1"]);

        let mut messages = Vec::new();
        while let Ok(SessionEvent::Log { level, message }) = rx.try_recv() {
            messages.push((level, message));
        }
        assert!(messages
            .iter()
            .any(|(l, m)| *l == LogLevel::Error && m.starts_with("Execute failure - 500")));
        assert!(messages
            .iter()
            .any(|(l, m)| *l == LogLevel::Warn && m == "Answer: ERR not allowed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn drain_emits_tracing_records() {
        let transport = MockTransport::new();
        let (events, _rx) = EventPublisher::channel();
        let (sender, mut queue) = command_queue();
        sender.enqueue(Command::telescope("TSGM 1")).unwrap();
        queue.drain_and_execute_all(&transport, &events).await;

        assert!(logs_contain("telescope - telescope_execute(\"TSGM 1\")"));
        assert!(logs_contain("Answer: +OK"));
    }

    #[test]
    fn setup_batch_runs_back_to_back() {
        let transport = MockTransport::new();
        let (events, _rx) = EventPublisher::channel();
        let (sender, mut queue) = command_queue();
        let setup = SetupExposure {
            ga: "22:44".into(),
            dm: 1,
            sf: 2,
            ..Default::default()
        };
        sender
            .enqueue_all(setup_commands(Instrument::Ccd400, &setup).unwrap())
            .unwrap();

        let taken = tokio_test::block_on(queue.drain_and_execute_all(&transport, &events));
        assert_eq!(taken, 3);
        assert_eq!(
            transport.calls(),
            vec![
                "execute spectrograph spectrograph_execute",
                "execute spectrograph spectrograph_execute",
                "execute spectrograph spectrograph_execute",
            ]
        );
    }

    #[tokio::test]
    async fn enqueue_after_queue_dropped() {
        let (sender, queue) = command_queue();
        drop(queue);
        let err = sender.enqueue(Command::telescope("TSGM")).unwrap_err();
        assert!(matches!(err, ObserveError::QueueClosed));
    }
}
