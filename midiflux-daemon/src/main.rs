// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! MIDIFlux daemon entry point: command-line parsing, sink wiring, and the
//! dispatcher / profile-controller / management-surface lifecycle. A
//! `tokio::runtime::Runtime` is built explicitly so logging can be
//! initialized before entering async code; `run()` owns the dispatcher for
//! the remainder of the process lifetime.

use std::sync::Arc;

use clap::Parser;
use midiflux_core::action::{
    AudioSink, CommandSink, ExecutionContext, GamepadSink, KeyboardSink, MidiOutputSink, MouseSink,
    ReleaseScheduler,
};
use midiflux_core::logging::{init_logging, LoggingConfig};
use midiflux_core::registry::RegistryHandle;
use midiflux_core::state::StateManager;
use midiflux_daemon::daemon::config_watcher::ProfileWatcher;
use midiflux_daemon::daemon::ipc::IpcServer;
use midiflux_daemon::daemon::release_scheduler::TimerReleaseScheduler;
use midiflux_daemon::daemon::types::DaemonCommand;
use midiflux_daemon::daemon::{paths, Dispatcher};
use midiflux_daemon::sinks::{
    EnigoKeyboardSink, EnigoMouseSink, LoggingGamepadBackend, MidirOutputSink, NullAudioSink,
    ProcessCommandSink, RodioAudioSink, VirtualGamepadSink,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// MIDIFlux daemon: binds MIDI controller input to host-side actions.
#[derive(Parser, Debug)]
#[command(name = "midifluxd")]
#[command(version)]
#[command(about = "MIDIFlux daemon: MIDI-to-action dispatch service", long_about = None)]
struct Args {
    /// Profile to load at startup. Defaults to the last-used profile, or
    /// "default" if none was ever recorded.
    #[arg(short, long)]
    profile: Option<String>,

    /// Enable debug-level logging (equivalent to RUST_LOG=debug).
    #[arg(short, long)]
    verbose: bool,

    /// Emit structured JSON logs instead of pretty text.
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut logging = LoggingConfig::default();
    if args.verbose {
        logging = logging.with_level("debug");
    }
    if args.json_logs {
        logging = logging.with_json_format();
    }
    init_logging(&logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "midifluxd starting");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let profiles_dir = paths::profiles_dir()?;
    let _examples_dir = paths::examples_dir()?;

    let profile_name = match args.profile {
        Some(name) => name,
        None => paths::read_last_profile()
            .await?
            .unwrap_or_else(|| "default".to_string()),
    };

    let keyboard: Arc<dyn KeyboardSink> = Arc::new(EnigoKeyboardSink::new()?);
    let mouse: Arc<dyn MouseSink> = Arc::new(EnigoMouseSink::new()?);
    let gamepad: Arc<dyn GamepadSink> = Arc::new(VirtualGamepadSink::new(Box::new(LoggingGamepadBackend)));
    let command: Arc<dyn CommandSink> = Arc::new(ProcessCommandSink::new());
    let audio: Arc<dyn AudioSink> = match RodioAudioSink::new() {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            warn!(error = %e, "no audio output device available; PlaySound actions will no-op");
            Arc::new(NullAudioSink)
        }
    };
    let midi_output: Arc<dyn MidiOutputSink> = Arc::new(MidirOutputSink::new());

    let state = Arc::new(StateManager::new());
    let registry = Arc::new(RegistryHandle::default());

    let (command_tx, command_rx) = mpsc::channel::<DaemonCommand>(256);
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    let release_scheduler: Arc<dyn ReleaseScheduler> = Arc::new(TimerReleaseScheduler::new(command_tx.clone()));

    let ctx = ExecutionContext {
        state: Arc::clone(&state),
        keyboard,
        mouse,
        gamepad,
        command,
        audio,
        midi_output,
        release_scheduler,
    };

    let mut dispatcher = Dispatcher::new(
        ctx,
        Arc::clone(&registry),
        profiles_dir.clone(),
        command_rx,
        command_tx.clone(),
    );

    if let Err(e) = dispatcher.load_initial_profile(&profile_name).await {
        warn!(profile = %profile_name, error = %e, "failed to load initial profile; starting with an empty registry");
    } else {
        info!(profile = %profile_name, "initial profile loaded");
    }

    let mut ipc_server = IpcServer::new(command_tx.clone(), shutdown_tx.subscribe());
    let ipc_task = tokio::spawn(async move {
        if let Err(e) = ipc_server.run().await {
            error!(error = %e, "management surface stopped");
        }
    });

    let mut watcher = ProfileWatcher::new(profiles_dir, command_tx.clone(), shutdown_tx.subscribe())?;
    let watcher_task = tokio::spawn(async move {
        if let Err(e) = watcher.watch().await {
            error!(error = %e, "profile watcher stopped");
        }
    });

    let ctrlc_tx = command_tx.clone();
    let ctrlc_shutdown = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        info!("shutdown signal received");
        let _ = ctrlc_shutdown.send(());
        let _ = ctrlc_tx.blocking_send(DaemonCommand::Shutdown);
    })?;

    dispatcher.run().await;

    let _ = shutdown_tx.send(());
    let _ = ipc_task.await;
    let _ = watcher_task.await;

    info!("midifluxd stopped");
    Ok(())
}
