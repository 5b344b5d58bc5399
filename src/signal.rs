//! Cooperative cancellation for the detection pipeline.
//!
//! A single [`ShutdownHandler`] is shared by every pipeline stage. It wraps an
//! `AtomicBool` that can be raised from anywhere (the Ctrl+C hook, a test, or a
//! caller that lost interest) and is observed by the walker, the digest
//! workers and the deduper.
//!
//! Raising the flag is idempotent. Stages never block indefinitely on a
//! channel: [`ShutdownHandler::send`] and [`ShutdownHandler::recv`] wake up
//! every [`POLL_INTERVAL`] to re-check the flag, so a raised flag unblocks every
//! stage within one poll interval (or one in-flight read chunk for a worker).
//!
//! # Usage
//!
//! ```rust,no_run
//! use dupdup::signal::install_handler;
//!
//! let handler = install_handler().expect("Failed to install signal handler");
//!
//! if handler.is_shutdown_requested() {
//!     println!("Shutdown requested, cleaning up...");
//! }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender};

/// How long a blocked send or receive waits before re-checking the flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Returned by a channel operation that gave up because the pipeline is
/// shutting down (flag raised, or the other side of the channel is gone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Shared, broadcast-style stop signal.
///
/// Cloning the handler shares the underlying flag, so a clone handed to a
/// worker thread observes a shutdown requested through any other clone.
///
/// # Example
///
/// ```rust
/// use dupdup::signal::ShutdownHandler;
///
/// let handler = ShutdownHandler::new();
/// let worker_view = handler.clone();
///
/// handler.request_shutdown();
/// assert!(worker_view.is_shutdown_requested());
/// ```
#[derive(Debug, Clone)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandler {
    /// Create a handler with no shutdown requested.
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Raise the stop signal. Calling this more than once has no further effect.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Reset the flag to `false`.
    ///
    /// Only used when the process-wide handler is handed out again.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Send `item` on a bounded channel, waiting for capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Cancelled`] if shutdown is requested before the item is
    /// accepted, or if every receiver has been dropped. The item is dropped.
    pub fn send<T>(&self, tx: &Sender<T>, mut item: T) -> Result<(), Cancelled> {
        loop {
            if self.is_shutdown_requested() {
                return Err(Cancelled);
            }
            match tx.send_timeout(item, POLL_INTERVAL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => item = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(Cancelled),
            }
        }
    }

    /// Receive the next item from a channel.
    ///
    /// Returns `None` once the channel is closed and drained, or as soon as
    /// shutdown is requested. Callers that need to tell the two apart check
    /// [`is_shutdown_requested`](Self::is_shutdown_requested) afterwards.
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Option<T> {
        loop {
            if self.is_shutdown_requested() {
                return None;
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

impl Default for ShutdownHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for signal handler installation.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// Failed to install the Ctrl+C handler.
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install a Ctrl+C handler that raises the shutdown flag on interrupt.
///
/// `ctrlc` only accepts one hook per process. A second call returns the
/// already-installed handler with its flag reset, which keeps repeated
/// `run_app` calls (as in tests) working.
///
/// # Errors
///
/// Returns [`SignalError::InstallFailed`] if the hook cannot be registered and
/// no handler was installed earlier by this module.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let hook = handler.clone();

    match ctrlc::set_handler(move || {
        hook.request_shutdown();

        let _ = writeln!(std::io::stderr(), "\nInterrupted. Cleaning up...");
        let _ = std::io::stderr().flush();

        log::info!("Shutdown signal received");
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(e) => match GLOBAL_HANDLER.get() {
            Some(existing) => {
                existing.reset();
                Ok(existing.clone())
            }
            None => Err(SignalError::InstallFailed(e)),
        },
    }
}
