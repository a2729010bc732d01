//! Progress-callback trait for batch generation events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ComposeConfigBuilder::progress_callback`] to receive an
//! event per generated image and per skipped line. The CLI forwards these to
//! an `indicatif` progress bar; a server could forward them to a websocket
//! without the library knowing anything about either.
//!
//! # Example
//!
//! ```rust
//! use imprint::{BatchProgressCallback, ComposeConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, index: usize, total: usize, file_name: &str, png_len: usize) {
//!         self.done.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} bytes)", index, total, file_name, png_len);
//!     }
//! }
//!
//! let config = ComposeConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each line.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The trait is `Send + Sync` because async wrappers
/// move the batch onto a blocking thread.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first line is composed.
    ///
    /// # Arguments
    /// * `total` — number of non-blank input lines (or counties)
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called after an image has been composed and encoded.
    ///
    /// # Arguments
    /// * `index`     — 1-based position in the input
    /// * `total`     — same value passed to `on_batch_start`
    /// * `file_name` — archive entry name, e.g. `image1.png`
    /// * `png_len`   — encoded size in bytes
    fn on_image_complete(&self, index: usize, total: usize, file_name: &str, png_len: usize) {
        let _ = (index, total, file_name, png_len);
    }

    /// Called when a line is skipped.
    ///
    /// # Arguments
    /// * `line`   — 1-based line number
    /// * `reason` — human-readable warning
    fn on_line_skipped(&self, line: usize, reason: &str) {
        let _ = (line, reason);
    }

    /// Called once after every line has been attempted.
    fn on_batch_complete(&self, total: usize, generated: usize) {
        let _ = (total, generated);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ComposeConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started: AtomicUsize,
        images: AtomicUsize,
        skipped: AtomicUsize,
        generated: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_batch_start(&self, total: usize) {
            self.started.store(total, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _index: usize, _total: usize, _name: &str, _len: usize) {
            self.images.fetch_add(1, Ordering::SeqCst);
        }

        fn on_line_skipped(&self, _line: usize, _reason: &str) {
            self.skipped.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, generated: usize) {
            self.generated.store(generated, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(3);
        cb.on_image_complete(1, 3, "a.png", 10);
        cb.on_line_skipped(2, "too short");
        cb.on_batch_complete(3, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_batch_start(3);
        tracker.on_image_complete(1, 3, "a.png", 100);
        tracker.on_line_skipped(2, "too short");
        tracker.on_image_complete(3, 3, "c.png", 100);
        tracker.on_batch_complete(3, 2);

        assert_eq!(tracker.started.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.images.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.skipped.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.generated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(1);
        cb.on_batch_complete(1, 1);
    }
}
