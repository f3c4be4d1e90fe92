//! Progress-callback trait for per-figure conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as figures are generated, compiled, retried and finished.
//!
//! Callers can forward events to a channel, a server-sent-events stream or a
//! terminal progress bar without the library knowing how the host
//! application communicates.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2tex::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_figure_complete(&self, figure: usize, total: usize, artifact: &str) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("figure {figure}/{total} → {artifact} ({n} done)");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { done: AtomicUsize::new(0) });
//! let config = ConversionConfig::builder()
//!     .progress_callback(cb as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each figure.
///
/// Figures run concurrently, so every method except the two conversion-level
/// ones may be called from several tasks at once. All methods default to
/// no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after figure discovery, before any figure task starts.
    fn on_conversion_start(&self, total_figures: usize) {
        let _ = total_figures;
    }

    /// Called when a figure task begins its first attempt.
    ///
    /// `figure` is 1-indexed throughout this trait.
    fn on_figure_start(&self, figure: usize, total: usize) {
        let _ = (figure, total);
    }

    /// Called after every failed attempt, including the last one.
    fn on_attempt_failed(&self, figure: usize, attempt: u32, diagnostic: &str) {
        let _ = (figure, attempt, diagnostic);
    }

    /// Called when a figure compiled successfully.
    ///
    /// `artifact` is the forward-slash path embedded in the document.
    fn on_figure_complete(&self, figure: usize, total: usize, artifact: &str) {
        let _ = (figure, total, artifact);
    }

    /// Called when a figure exhausted its attempts or its task aborted.
    fn on_figure_error(&self, figure: usize, total: usize, error: &str) {
        let _ = (figure, total, error);
    }

    /// Called once after every figure task has finished.
    fn on_conversion_complete(&self, total_figures: usize, success_count: usize) {
        let _ = (total_figures, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        failures: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_figure_start(&self, _figure: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_attempt_failed(&self, _figure: usize, _attempt: u32, _diagnostic: &str) {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }

        fn on_figure_complete(&self, _figure: usize, _total: usize, _artifact: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_figure_error(&self, _figure: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(2);
        cb.on_figure_start(1, 2);
        cb.on_attempt_failed(1, 1, "error");
        cb.on_figure_complete(1, 2, "figures/figure1.pdf");
        cb.on_figure_error(2, 2, "exhausted");
        cb.on_conversion_complete(2, 1);
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        cb.on_figure_start(1, 2);
        cb.on_attempt_failed(1, 1, "syntax error");
        cb.on_figure_complete(1, 2, "figures/figure1.pdf");
        cb.on_figure_start(2, 2);
        cb.on_figure_error(2, 2, "exhausted");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.failures.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
