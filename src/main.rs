//! CLI entry point for the observe client.
//!
//! Watch all subsystems until Ctrl+C:
//! ```bash
//! observe-client watch --config config/observe.toml
//! ```
//!
//! Execute one command and print the answer:
//! ```bash
//! observe-client exec telescope telescope_execute "TSRA 235912 -102312 0"
//! observe-client exec ccd700 expose_get_key OBJECT
//! ```
//!
//! `--mock` replaces the HTTPS transport with the in-memory one.

#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use observe_client::astrometry::SiteAstrometry;
use observe_client::command::{classify_answer, command_queue, AnswerKind, Command};
use observe_client::config::{ObserveConfig, DEFAULT_CONFIG_PATH};
use observe_client::events::{EventPublisher, SessionEvent};
use observe_client::protocol::spectrograph::SpectrographElement;
use observe_client::session::{ExitFlag, PromptDecision, ReconnectPrompt, SessionLoop};
use observe_client::transport::http::{HttpSettings, HttpTransport};
use observe_client::transport::mock::MockTransport;
use observe_client::transport::{ConnectionParams, Transport};
use observe_client::{logging, Instrument};

#[derive(Parser)]
#[command(name = "observe-client")]
#[command(about = "Remote observatory control client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll all subsystems and print their state until Ctrl+C
    Watch {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Use the in-memory transport instead of the server
        #[arg(long)]
        mock: bool,
    },

    /// Execute one remote function and print its answer
    Exec {
        /// Configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Use the in-memory transport instead of the server
        #[arg(long)]
        mock: bool,

        /// Target instrument (telescope, spectrograph, oes, ccd400, ccd700)
        target: Instrument,

        /// Remote function name
        function: String,

        /// Positional parameters
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch { config, mock } => watch(load_config(&config)?, mock).await,
        Commands::Exec {
            config,
            mock,
            target,
            function,
            args,
        } => exec(load_config(&config)?, mock, target, function, args).await,
    }
}

fn load_config(path: &PathBuf) -> Result<ObserveConfig> {
    let config = ObserveConfig::load_from(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.validate()?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;
    Ok(config)
}

fn build_transport(config: &ObserveConfig, mock: bool) -> Result<Arc<dyn Transport>> {
    if mock {
        return Ok(Arc::new(MockTransport::new()));
    }
    let transport = HttpTransport::new(
        config.connection_params(),
        HttpSettings::from_config(config),
    )?;
    Ok(Arc::new(transport))
}

async fn watch(config: ObserveConfig, mock: bool) -> Result<()> {
    println!("🔭 {}", config.application.name);
    println!("   Server: {}", config.connection_params().address());
    println!("   Press Ctrl+C to stop");
    println!();

    let transport = build_transport(&config, mock)?;
    let astrometry = Arc::new(SiteAstrometry::from_config(&config.site));
    let (events, rx) = EventPublisher::channel();
    // The sender must outlive the loop or the queue reports closed.
    let (_commands, queue) = command_queue();
    let exit = ExitFlag::new();

    let printer = tokio::spawn(print_events(rx));

    let signal_exit = exit.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            println!("\n🛑 Shutdown signal received");
            signal_exit.set();
        }
    });

    let mut session = SessionLoop::new(
        transport,
        astrometry,
        config.connection_params(),
        &config.session,
        queue,
        events,
        Box::new(TerminalPrompt),
        exit,
    );
    session.run().await;
    drop(session);

    let _ = printer.await;
    println!("👋 Session closed");
    Ok(())
}

async fn exec(
    config: ObserveConfig,
    mock: bool,
    target: Instrument,
    function: String,
    args: Vec<String>,
) -> Result<()> {
    let transport = build_transport(&config, mock)?;
    let params = config.connection_params();
    transport
        .get_user(&params.username)
        .await
        .with_context(|| format!("connecting {}", params.address()))?;

    let command = Command::new(Some(target), function, args);
    tracing::info!("{}", command.audit_line());
    let answer = command.execute(transport.as_ref()).await?;
    println!("{}", answer);

    if classify_answer(&answer) == AnswerKind::Error {
        bail!("command rejected: {}", answer);
    }
    Ok(())
}

async fn print_events(mut rx: UnboundedReceiver<SessionEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SessionEvent::Telescope(state) => println!(
                "telescope     RA {}  DEC {}  HA {}  airmass {}  {}",
                state.ra.as_deref().unwrap_or("-"),
                state.dec.as_deref().unwrap_or("-"),
                state.hour_angle.as_deref().unwrap_or("-"),
                state
                    .airmass
                    .map_or_else(|| "-".to_string(), |a| format!("{:.3}", a)),
                state.glst.telescope,
            ),
            SessionEvent::Spectrograph(state) => {
                let grating = state
                    .display(SpectrographElement::GratingPos)
                    .map_or_else(|| "-".to_string(), |d| d.text);
                println!("spectrograph  grating {}", grating);
            }
            SessionEvent::Expose { instrument, info } => println!(
                "{:<13} {} {}/{} s {}",
                instrument,
                info.state,
                info.elapsed_time.unwrap_or_default(),
                info.full_time.unwrap_or_default(),
                info.filename,
            ),
            SessionEvent::ExposeInit(state) => println!(
                "{:<13} readout speeds [{}]  gains [{}]  object '{}'",
                state.instrument,
                state.readout_speed_list().join(", "),
                state.gain_list().join(", "),
                state.object,
            ),
            SessionEvent::Setup(setup) => println!(
                "{:<13} {} exposure setups",
                setup.instrument,
                setup.entries.len()
            ),
            SessionEvent::Connection { state, message } => {
                println!("⚡ {} ({})", message, state.label());
            }
            SessionEvent::Availability {
                instrument,
                available: false,
            } => println!("⚠️  {} unavailable", instrument),
            // Log lines already went through tracing.
            _ => {}
        }
    }
}

/// Reconnect prompt on the controlling terminal.
struct TerminalPrompt;

#[async_trait]
impl ReconnectPrompt for TerminalPrompt {
    async fn prompt(&self, reason: &str, params: &mut ConnectionParams) -> PromptDecision {
        eprintln!("❌ {}: {}", params.address(), reason);
        eprintln!("   Enter to reconnect, host[:port] to change server, q to quit");

        let interrupted = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        read_decision(BufReader::new(tokio::io::stdin()), interrupted, params).await
    }
}

/// Read one prompt answer from `input`; `Exit` on end of input or when `interrupted`
/// completes first.
async fn read_decision<R, F>(
    mut input: R,
    interrupted: F,
    params: &mut ConnectionParams,
) -> PromptDecision
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let mut line = String::new();
    tokio::select! {
        read = input.read_line(&mut line) => match read {
            Ok(0) | Err(_) => return PromptDecision::Exit,
            Ok(_) => {}
        },
        () = interrupted => return PromptDecision::Exit,
    }

    let input = line.trim();
    if input.eq_ignore_ascii_case("q") {
        return PromptDecision::Exit;
    }
    if !input.is_empty() {
        match input.split_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => {
                    params.host = host.to_string();
                    params.port = port;
                }
                Err(_) => eprintln!("   Invalid port '{}', keeping {}", port, params.port),
            },
            None => params.host = input.to_string(),
        }
    }
    PromptDecision::Retry
}
