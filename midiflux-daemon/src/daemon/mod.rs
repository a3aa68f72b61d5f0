// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! The daemon's own modules: dispatcher (C8), profile controller (C9),
//! config-file watch, auto-release timers, diagnostics, and the daemon-level
//! error/command/IPC envelope types.

pub mod config_watcher;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod ipc;
pub mod paths;
pub mod profile_controller;
pub mod release_scheduler;
pub mod types;

pub use dispatcher::Dispatcher;
pub use error::{DaemonError, Result};
pub use ipc::IpcServer;
pub use profile_controller::ProfileController;
pub use release_scheduler::TimerReleaseScheduler;
