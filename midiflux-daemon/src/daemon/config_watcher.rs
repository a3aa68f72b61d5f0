// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Profile hot-reload via filesystem watch (§14): watches the whole
//! profiles directory for any `.json` profile being created or modified.

use crate::daemon::error::{DaemonError, Result};
use crate::daemon::types::DaemonCommand;
use notify::event::{EventKind, ModifyKind};
use notify::{Event, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, NoCache};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

pub struct ProfileWatcher {
    profiles_dir: PathBuf,
    debouncer: Option<Debouncer<RecommendedWatcher, NoCache>>,
    event_rx: mpsc::Receiver<PathBuf>,
    command_tx: mpsc::Sender<DaemonCommand>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl ProfileWatcher {
    pub fn new(
        profiles_dir: impl Into<PathBuf>,
        command_tx: mpsc::Sender<DaemonCommand>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<Self> {
        let profiles_dir = profiles_dir.into();
        let (event_tx, event_rx) = mpsc::channel(16);

        let debouncer = new_debouncer(
            Duration::from_millis(500),
            None,
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        if let Some(path) = changed_profile(&event.event) {
                            debug!(?path, "profile file changed");
                            let _ = event_tx.blocking_send(path);
                        }
                    }
                }
                Err(errors) => {
                    for error in errors {
                        error!(?error, "profile watch error");
                    }
                }
            },
        )
        .map_err(|e| DaemonError::FileWatcher(format!("failed to create debouncer: {e}")))?;

        Ok(ProfileWatcher {
            profiles_dir,
            debouncer: Some(debouncer),
            event_rx,
            command_tx,
            shutdown_rx,
        })
    }

    pub async fn watch(&mut self) -> Result<()> {
        info!(dir = ?self.profiles_dir, "starting profile directory watch");
        if let Some(debouncer) = self.debouncer.as_mut() {
            debouncer
                .watch(&self.profiles_dir, RecursiveMode::NonRecursive)
                .map_err(|e| DaemonError::FileWatcher(format!("failed to watch directory: {e}")))?;
        }

        loop {
            tokio::select! {
                Some(path) = self.event_rx.recv() => {
                    if let Err(e) = self.command_tx.send(DaemonCommand::ProfileFileChanged(path)).await {
                        error!(error = %e, "failed to forward profile change command");
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    info!("profile watcher shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(mut debouncer) = self.debouncer.take() {
            let _ = debouncer.unwatch(&self.profiles_dir);
        }
    }
}

impl Drop for ProfileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn changed_profile(event: &Event) -> Option<PathBuf> {
    let is_relevant = matches!(
        event.kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) | EventKind::Create(_)
    );
    if !is_relevant {
        return None;
    }
    event
        .paths
        .iter()
        .find(|p| is_json_profile(p))
        .cloned()
}

fn is_json_profile(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::CreateKind;

    #[test]
    fn ignores_non_json_paths() {
        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec![PathBuf::from("/profiles/notes.txt")],
            attrs: Default::default(),
        };
        assert_eq!(changed_profile(&event), None);
    }

    #[test]
    fn accepts_json_create_events() {
        let event = Event {
            kind: EventKind::Create(CreateKind::File),
            paths: vec![PathBuf::from("/profiles/studio.json")],
            attrs: Default::default(),
        };
        assert_eq!(
            changed_profile(&event),
            Some(PathBuf::from("/profiles/studio.json"))
        );
    }
}
