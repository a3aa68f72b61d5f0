// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Command sink (C10): child-process spawning behind the async
//! `CommandSink` contract, with explicit `shellKind`/`hideConsole`/
//! `waitForExit` handling (§4.4).

use async_trait::async_trait;
use midiflux_core::action::{CommandSink, ShellKind};
use midiflux_core::error::ActionError;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct ProcessCommandSink;

impl ProcessCommandSink {
    pub fn new() -> Self {
        ProcessCommandSink
    }
}

impl Default for ProcessCommandSink {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the `Command` for a given shell kind.
fn build_command(command: &str, shell_kind: ShellKind, hide_console: bool) -> Command {
    let mut cmd = match shell_kind {
        ShellKind::Bash => {
            let mut c = Command::new("bash");
            c.arg("-c").arg(command);
            c
        }
        ShellKind::Powershell => {
            let mut c = Command::new("powershell");
            c.args(["-NoProfile", "-Command", command]);
            c
        }
        ShellKind::Default => {
            #[cfg(unix)]
            {
                let mut c = Command::new("sh");
                c.arg("-c").arg(command);
                c
            }
            #[cfg(windows)]
            {
                let mut c = Command::new("cmd");
                c.args(["/C", command]);
                c
            }
        }
    };

    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

    #[cfg(windows)]
    if hide_console {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
    #[cfg(not(windows))]
    let _ = hide_console;

    cmd
}

#[async_trait]
impl CommandSink for ProcessCommandSink {
    fn spawn_detached(
        &self,
        command: &str,
        shell_kind: ShellKind,
        hide_console: bool,
    ) -> Result<(), ActionError> {
        debug!(command, ?shell_kind, "spawning detached command");
        build_command(command, shell_kind, hide_console)
            .spawn()
            .map(|_child| ())
            .map_err(|e| ActionError::OsRefused(format!("spawn failed: {e}")))
    }

    async fn spawn_and_wait(
        &self,
        command: &str,
        shell_kind: ShellKind,
        hide_console: bool,
    ) -> Result<i32, ActionError> {
        debug!(command, ?shell_kind, "spawning and awaiting command");
        let mut child = build_command(command, shell_kind, hide_console)
            .spawn()
            .map_err(|e| ActionError::OsRefused(format!("spawn failed: {e}")))?;
        let status = child
            .wait()
            .await
            .map_err(|e| ActionError::OsRefused(format!("wait failed: {e}")))?;
        let code = status.code().unwrap_or(-1);
        if code != 0 {
            warn!(command, exit_code = code, "command exited non-zero");
        }
        Ok(code)
    }
}
