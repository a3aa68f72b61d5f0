// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! `midifluxctl`: command-line client for the management surface (§6/§13),
//! one subcommand per `ManagementRequest` variant.

use clap::{Parser, Subcommand};
use midiflux_daemon::daemon::ipc::IpcClient;
use midiflux_daemon::daemon::types::{ManagementRequest, ManagementResponse};

#[derive(Parser)]
#[command(name = "midifluxctl")]
#[command(about = "Control and inspect the MIDIFlux daemon", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Print the raw JSON response instead of a formatted summary.
    #[arg(short, long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the daemon is responding.
    Ping,
    /// List profiles available in the profiles directory.
    ListProfiles,
    /// Show the name of the currently active profile.
    ActiveProfile,
    /// Switch the daemon to a different profile.
    SwitchProfile { name: String },
    /// List currently connected MIDI input devices.
    ListDevices,
    /// List mappings configured for a device (wildcard names allowed).
    ListMappings { device_name: String },
    /// Capture raw MIDI events for a few seconds.
    DetectInput {
        /// How long to listen, 1..20 seconds.
        #[arg(short, long, default_value_t = 5)]
        seconds: u8,
        /// Restrict capture to one device by name.
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List the action kinds the daemon knows how to validate and execute.
    ActionKinds,
    /// List the MIDI input types the daemon knows how to match.
    InputTypes,
    /// Show per-event dispatch latency statistics (diagnostics builds only).
    Diagnostics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let request = match &cli.command {
        Commands::Ping => ManagementRequest::Ping,
        Commands::ListProfiles => ManagementRequest::ListProfiles,
        Commands::ActiveProfile => ManagementRequest::GetActiveProfile,
        Commands::SwitchProfile { name } => ManagementRequest::SwitchProfile { name: name.clone() },
        Commands::ListDevices => ManagementRequest::ListDevices,
        Commands::ListMappings { device_name } => ManagementRequest::ListMappings {
            device_name: device_name.clone(),
        },
        Commands::DetectInput { seconds, device } => ManagementRequest::DetectInput {
            seconds: *seconds,
            device_name: device.clone(),
        },
        Commands::ActionKinds => ManagementRequest::SupportedActionKinds,
        Commands::InputTypes => ManagementRequest::SupportedInputTypes,
        Commands::Diagnostics => ManagementRequest::GetDiagnostics,
    };

    let mut client = IpcClient::connect()
        .await
        .map_err(|e| format!("failed to connect to midifluxd (is it running?): {e}"))?;

    let response = client.call(request).await?;

    print_response(&response, cli.json);

    if matches!(response.status, midiflux_daemon::daemon::types::ResponseStatus::Error) {
        std::process::exit(1);
    }
    Ok(())
}

fn print_response(response: &ManagementResponse, json: bool) {
    if json {
        match serde_json::to_string_pretty(response) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("failed to serialize response: {e}"),
        }
        return;
    }

    match (&response.data, &response.error) {
        (Some(data), _) => println!("{}", serde_json::to_string_pretty(data).unwrap_or_default()),
        (None, Some(error)) => eprintln!("error {}: {}", error.code, error.message),
        (None, None) => println!("ok"),
    }
}
