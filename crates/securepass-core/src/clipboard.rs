//! Self-clearing clipboard channel
//!
//! Moves a secret to the clipboard and schedules its own erasure. Erasure
//! timers are per-label: copying again under the same label supersedes the
//! pending erasure, while distinct labels run independently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::error::{VaultError, VaultResult};

/// Destination for clipboard writes.
///
/// The OS clipboard is a UI-layer collaborator; the channel only needs a
/// text sink. Write failures surface to the caller, erasure failures do not.
pub trait ClipboardSink: Send + Sync + 'static {
    fn set_text(&self, text: &str) -> VaultResult<()>;
}

/// In-process clipboard, for tests and headless use
#[derive(Default)]
pub struct MemoryClipboard {
    contents: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&self, text: &str) -> VaultResult<()> {
        let mut contents = self
            .contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *contents = text.to_string();
        Ok(())
    }
}

/// Clipboard transfer with scheduled erasure.
///
/// `copy` is last-write-wins per label: the previous pending erasure for
/// that label is cancelled and replaced, so one copy produces exactly one
/// erasure. Must be used inside a Tokio runtime.
pub struct ClipboardChannel<C: ClipboardSink> {
    sink: Arc<C>,
    // One slot per label; finished handles linger until the next copy
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl<C: ClipboardSink> ClipboardChannel<C> {
    pub fn new(sink: Arc<C>) -> Self {
        Self {
            sink,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Write a secret to the clipboard and schedule its erasure.
    ///
    /// The write failure surfaces as `ClipboardFailure`; the later erasure
    /// is best-effort (the user already received the secret).
    pub fn copy(&self, text: &str, label: &str, clear_after: Duration) -> VaultResult<()> {
        self.sink
            .set_text(text)
            .map_err(|e| VaultError::ClipboardFailure(e.to_string()))?;

        let mut timers = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(pending) = timers.remove(label) {
            pending.abort();
        }

        let sink = Arc::clone(&self.sink);
        timers.insert(
            label.to_string(),
            tokio::spawn(async move {
                tokio::time::sleep(clear_after).await;
                let _ = sink.set_text("");
            }),
        );

        Ok(())
    }
}

impl<C: ClipboardSink> Drop for ClipboardChannel<C> {
    fn drop(&mut self) {
        let timers = self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for handle in timers.values() {
            handle.abort();
        }
    }
}
