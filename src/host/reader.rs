use std::sync::Arc;

use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    task::JoinHandle,
};

use crate::{
    config::BackendKind,
    infrastructure::shutdown::ShutdownListener,
    scanner::FeedPublisher,
    settings::SettingsStore,
};

use super::protocol::HostCommand;

pub type BackendSwitch = Arc<dyn Fn(BackendKind) + Send + Sync>;

pub struct CommandHandler {
    publisher: FeedPublisher,
    settings: Arc<dyn SettingsStore>,
    switch_backend: BackendSwitch,
}

impl CommandHandler {
    pub fn new(
        publisher: FeedPublisher,
        settings: Arc<dyn SettingsStore>,
        switch_backend: BackendSwitch,
    ) -> Self {
        Self {
            publisher,
            settings,
            switch_backend,
        }
    }

    /// Returns `false` once the scanner no longer accepts batches.
    pub fn handle_line(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return true;
        }
        match serde_json::from_str::<HostCommand>(line) {
            Ok(HostCommand::Batch(batch)) => return self.publisher.publish(batch),
            Ok(HostCommand::Settings(patch)) => {
                if let Err(err) = self.settings.update(patch) {
                    tracing::error!(target: "settings", error = %err, "failed to apply settings from host");
                }
            }
            Ok(HostCommand::Backend { kind }) => (self.switch_backend)(kind),
            Err(err) => {
                tracing::warn!(target: "host", error = %err, "ignoring malformed host command");
            }
        }
        true
    }
}

/// Reads commands line by line until EOF or shutdown. Dropping the handler
/// at the end closes the change feed.
pub fn spawn_command_reader<R>(
    input: R,
    handler: CommandHandler,
    mut shutdown: ShutdownListener,
) -> JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = input.lines();
        loop {
            let next = tokio::select! {
                _ = shutdown.notified() => break,
                next = lines.next_line() => next,
            };
            match next {
                Ok(Some(line)) => {
                    if !handler.handle_line(&line) {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::info!(target: "host", "host input closed");
                    break;
                }
                Err(err) => {
                    tracing::error!(target: "host", error = %err, "failed to read host input");
                    break;
                }
            }
        }
    })
}
