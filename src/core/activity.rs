// src/core/activity.rs

//! The activity log: one record per processed protocol line.
//!
//! Recording is fire-and-forget. Sessions call [`ActivitySink::record`] and never learn
//! whether the event reached disk. The file-backed sink hands events to a background
//! writer task over a bounded channel and drops them when the queue is full.

use crate::core::SessionServerError;
use crate::core::protocol::ReplyCode;
use chrono::{DateTime, Local};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File as TokioFile, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// The capacity of the queue between sessions and the writer task.
const ACTIVITY_QUEUE_CAPACITY: usize = 4096;

/// A shared handle to whichever sink the server was configured with.
pub type ActivityLog = Arc<dyn ActivitySink>;

/// One processed request: who sent what, and which code they got back.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Local>,
    pub peer: SocketAddr,
    /// The request line without its terminator. `None` for the connect greeting.
    pub input: Option<String>,
    pub reply: ReplyCode,
}

impl ActivityEvent {
    /// An answered request line. An empty line is still an input.
    pub fn new(peer: SocketAddr, input: impl Into<String>, reply: ReplyCode) -> Self {
        Self {
            timestamp: Local::now(),
            peer,
            input: Some(input.into()),
            reply,
        }
    }

    /// The greeting sent when a connection is admitted.
    pub fn connected(peer: SocketAddr) -> Self {
        Self {
            timestamp: Local::now(),
            peer,
            input: None,
            reply: ReplyCode::Connected,
        }
    }

    /// Formats the event as `[dd/mm/YYYY HH:MM:SS]$peer$input$code`, or
    /// `[dd/mm/YYYY HH:MM:SS]$peer$code` when there was no input.
    pub fn to_log_line(&self) -> String {
        let timestamp = self.timestamp.format("[%d/%m/%Y %H:%M:%S]");
        match &self.input {
            Some(input) => format!("{}${}${}${}", timestamp, self.peer, input, self.reply),
            None => format!("{}${}${}", timestamp, self.peer, self.reply),
        }
    }
}

/// The single call the session layer makes into the log.
pub trait ActivitySink: Send + Sync + 'static {
    fn record(&self, event: ActivityEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullActivityLog;

impl ActivitySink for NullActivityLog {
    fn record(&self, _event: ActivityEvent) {}
}

/// Queues events for [`ActivityWriterTask`].
#[derive(Debug, Clone)]
pub struct FileActivityLog {
    tx: mpsc::Sender<ActivityEvent>,
}

impl FileActivityLog {
    /// Opens `path` for appending and returns the sink together with the task that drains it.
    pub async fn open(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ActivityWriterTask), SessionServerError> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        let (tx, rx) = mpsc::channel(ACTIVITY_QUEUE_CAPACITY);
        info!("Activity log enabled. Writing to {}.", path.display());
        Ok((
            Self { tx },
            ActivityWriterTask {
                writer: BufWriter::new(file),
                rx,
            },
        ))
    }
}

impl ActivitySink for FileActivityLog {
    fn record(&self, event: ActivityEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Activity log queue is full; dropping event.");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Activity log writer has stopped; dropping event.");
            }
        }
    }
}

/// The background task that appends queued events to the log file.
pub struct ActivityWriterTask {
    writer: BufWriter<TokioFile>,
    rx: mpsc::Receiver<ActivityEvent>,
}

impl ActivityWriterTask {
    /// Runs until shutdown is signalled or every sink handle has been dropped.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Activity log writer shutting down. Draining pending events.");
                    self.rx.close();
                    while let Some(event) = self.rx.recv().await {
                        self.write_event(&event).await;
                    }
                    self.flush().await;
                    return;
                }
                maybe_event = self.rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.write_event(&event).await;
                            if self.rx.is_empty() {
                                self.flush().await;
                            }
                        }
                        None => {
                            self.flush().await;
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn write_event(&mut self, event: &ActivityEvent) {
        let mut line = event.to_log_line();
        line.push('\n');
        if let Err(e) = self.writer.write_all(line.as_bytes()).await {
            warn!("Failed to write activity log entry: {}", e);
        }
    }

    async fn flush(&mut self) {
        if let Err(e) = self.writer.flush().await {
            warn!("Failed to flush activity log: {}", e);
        }
    }
}
