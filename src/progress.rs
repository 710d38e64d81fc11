//! Progress milestones for a running simulation batch.
//!
//! A [`ProgressReporter`] pushes [`ProgressEvent`]s into an unbounded FIFO
//! channel and always ends it with [`ProgressSignal::Finished`], including
//! when the batch fails or panics (the sentinel is sent on drop). Sends never
//! block; once the reader has gone away they are silently discarded.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::info;

/// One milestone as seen by the progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// Percent complete, 0..=100.
    pub progress: u8,
    pub message: String,
}

/// What travels over the progress channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressSignal {
    Update(ProgressEvent),
    /// Terminal sentinel; nothing follows it.
    Finished,
}

pub type ProgressReceiver = UnboundedReceiver<ProgressSignal>;

/// Producer side of the progress channel.
///
/// Percentages are strictly increasing: an event that does not advance past
/// the last emitted percent is dropped.
#[derive(Debug)]
pub struct ProgressReporter {
    sender: Option<UnboundedSender<ProgressSignal>>,
    last: Option<u8>,
    finished: bool,
}

impl ProgressReporter {
    /// Creates a reporter together with the receiving end.
    pub fn channel() -> (Self, ProgressReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::with_sender(Some(tx)), rx)
    }

    /// A reporter nobody listens to. Milestones are still logged.
    pub fn detached() -> Self {
        Self::with_sender(None)
    }

    fn with_sender(sender: Option<UnboundedSender<ProgressSignal>>) -> Self {
        Self {
            sender,
            last: None,
            finished: false,
        }
    }

    /// Emits a milestone. Returns `false` if it was dropped for not advancing
    /// or because the reporter already finished.
    pub fn report(&mut self, progress: u8, message: impl Into<String>) -> bool {
        let progress = progress.min(100);
        if self.finished || self.last.is_some_and(|last| progress <= last) {
            return false;
        }
        self.last = Some(progress);

        let message = message.into();
        info!(progress, "{message}");
        if let Some(tx) = &self.sender {
            // A closed receiver means the client went away
            let _ = tx.send(ProgressSignal::Update(ProgressEvent { progress, message }));
        }
        true
    }

    /// Sends the terminal sentinel. Later calls are no-ops.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Some(tx) = self.sender.take() {
            let _ = tx.send(ProgressSignal::Finished);
        }
    }

    /// Last percent emitted, if any.
    pub fn last_progress(&self) -> Option<u8> {
        self.last
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Hands the current progress subscription to the next simulation.
///
/// Subscribing replaces any earlier subscriber, whose stream then ends.
/// Each subscription feeds at most one simulation.
#[derive(Debug, Default)]
pub struct ProgressHub {
    slot: Mutex<Option<UnboundedSender<ProgressSignal>>>,
}

impl ProgressHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscriber and returns its receiving end.
    pub fn subscribe(&self) -> ProgressReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(tx);
        if previous.is_some() {
            info!("progress subscriber replaced");
        }
        rx
    }

    /// Takes the pending subscription, or returns a detached reporter.
    pub fn reporter(&self) -> ProgressReporter {
        let sender = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        ProgressReporter::with_sender(sender)
    }

    /// Whether a subscriber is waiting for the next simulation.
    pub fn has_subscriber(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }
}
