use std::sync::{Arc, Mutex};

/// Cross-stage failure cell: the first recorded error wins, later ones are
/// logged and dropped.
#[derive(Clone, Default)]
pub struct FirstError {
    slot: Arc<Mutex<Option<anyhow::Error>>>,
}

impl FirstError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `err` became the recorded error.
    pub fn record(&self, err: anyhow::Error) -> bool {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_some() {
            tracing::debug!(event = "ingest_error_suppressed", error = %format!("{err:#}"));
            return false;
        }
        tracing::error!(event = "ingest_failed", error = %format!("{err:#}"));
        *slot = Some(err);
        true
    }

    pub fn is_set(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }

    pub fn take(&self) -> Option<anyhow::Error> {
        self.slot.lock().unwrap().take()
    }
}
