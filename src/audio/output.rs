//! Audio output device lifecycle.
//!
//! The output stream is an explicitly owned resource with a lazy-open /
//! close pair, injected into the preview mixer. Opening is deferred until
//! the first play intent, mirroring how browser audio contexts stay
//! suspended until a user gesture.

use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle};
use tracing::debug;

/// Owns the platform audio output stream for one preview session.
///
/// Created closed; [`ensure_started`](AudioOutput::ensure_started) opens the
/// device on first use. [`close`](AudioOutput::close) is idempotent, and the
/// stream is closed on drop, so teardown can run in any order without
/// double-release.
pub struct AudioOutput {
    stream: Option<(OutputStream, OutputStreamHandle)>,
}

impl AudioOutput {
    /// Creates a closed output; no device is touched yet.
    pub fn new() -> Self {
        Self { stream: None }
    }

    /// Whether the device is currently open.
    pub fn is_started(&self) -> bool {
        self.stream.is_some()
    }

    /// Opens the default output device if it is not open yet and returns a
    /// handle for creating sinks.
    ///
    /// # Errors
    ///
    /// Returns error if no audio output device can be opened.
    pub fn ensure_started(&mut self) -> Result<&OutputStreamHandle> {
        if self.stream.is_none() {
            let pair = OutputStream::try_default().context("Failed to open audio output")?;
            debug!("audio output opened");
            self.stream = Some(pair);
        }
        match self.stream.as_ref() {
            Some((_, handle)) => Ok(handle),
            None => Err(anyhow::anyhow!("audio output unavailable")),
        }
    }

    /// Returns the open stream handle, or `None` while closed.
    pub fn handle(&self) -> Option<&OutputStreamHandle> {
        self.stream.as_ref().map(|(_, handle)| handle)
    }

    /// Closes the device. Safe to call any number of times.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("audio output closed");
        }
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.close();
    }
}
