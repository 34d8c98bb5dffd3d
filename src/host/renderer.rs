use chrono::Utc;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{
    domain::UnitId,
    scanner::{Effect, Renderer},
};

use super::protocol::{RenderAction, RenderRecord};

/// Queues one JSON line per render instruction for a dedicated writer task.
pub struct JsonLinesRenderer {
    lines: mpsc::UnboundedSender<String>,
}

impl JsonLinesRenderer {
    /// The writer task ends, handing `out` back, once every renderer clone
    /// has been dropped and the backlog is written.
    pub fn spawn<W>(out: W) -> (Self, JoinHandle<W>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (lines, backlog) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_lines(out, backlog));
        (Self { lines }, handle)
    }

    fn emit(&self, unit: &UnitId, action: RenderAction) {
        let record = RenderRecord {
            at: Utc::now(),
            unit,
            action,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(target: "host", unit = %unit, error = %err, "failed to encode render record");
                return;
            }
        };
        if self.lines.send(line).is_err() {
            tracing::warn!(target: "host", unit = %unit, "render writer has stopped");
        }
    }
}

async fn write_lines<W>(mut out: W, mut backlog: mpsc::UnboundedReceiver<String>) -> W
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut line) = backlog.recv().await {
        line.push('\n');
        let written = match out.write_all(line.as_bytes()).await {
            Ok(()) => out.flush().await,
            Err(err) => Err(err),
        };
        if let Err(err) = written {
            tracing::warn!(target: "host", error = %err, "failed to write render record");
        }
    }
    tracing::debug!(target: "host", "render writer stopped");
    out
}

impl Renderer for JsonLinesRenderer {
    fn apply(&self, unit: &UnitId, effect: &Effect) {
        self.emit(
            unit,
            RenderAction::Apply {
                blur: effect.blur,
                badge: effect.badge,
            },
        );
    }

    fn revert(&self, unit: &UnitId) {
        self.emit(unit, RenderAction::Revert);
    }

    fn remove_badge(&self, unit: &UnitId) {
        self.emit(unit, RenderAction::RemoveBadge);
    }
}
