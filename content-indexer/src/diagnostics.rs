//! Operator-facing diagnostic events.
//!
//! Conditions an operator has to act on (a missing ingest plugin, a
//! partition that could not be recreated) are broadcast instead of raised.

use content_index_repository::SearchIndexError;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Default number of buffered events per subscriber.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// The engine has no `attachment` ingest processor installed.
    MissingIngestProcessor { site_id: Option<i64>, reason: String },
    /// A partition index could not be recreated.
    PartitionRecreateFailed { site_id: i64, error: String },
}

/// Broadcast hub for diagnostic events.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    sender: broadcast::Sender<DiagnosticEvent>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Events nobody listens to are only logged.
    pub fn emit(&self, event: DiagnosticEvent) {
        warn!(event = ?event, "Diagnostic event");
        if self.sender.send(event).is_err() {
            debug!("No diagnostic subscribers");
        }
    }

    /// Raise `MissingIngestProcessor` if an engine error has the missing
    /// attachment processor signature.
    ///
    /// # Returns
    ///
    /// `true` if an event was emitted.
    pub fn report_search_error(&self, site_id: Option<i64>, error: &SearchIndexError) -> bool {
        if !error.is_missing_attachment_processor() {
            return false;
        }
        self.emit(DiagnosticEvent::MissingIngestProcessor {
            site_id,
            reason: error.reason().unwrap_or_default().to_string(),
        });
        true
    }
}

/// Hand every received event to `handler` until all senders are gone.
///
/// A lagging receiver skips the overwritten events and keeps listening.
pub async fn forward_events<F>(mut receiver: broadcast::Receiver<DiagnosticEvent>, mut handler: F)
where
    F: FnMut(DiagnosticEvent),
{
    loop {
        match receiver.recv().await {
            Ok(event) => handler(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Diagnostics listener lagged, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
