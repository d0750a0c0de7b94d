//! Progress-callback trait for per-page operation events.
//!
//! Split and the OCR fallback both walk a document page by page. Inject an
//! [`Arc<dyn OperationProgress>`] to receive events as they go; the CLI turns
//! them into a progress bar, a server could forward them to a job record.
//!
//! # Example
//!
//! ```rust
//! use pdfdesk::OperationProgress;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct CountingProgress {
//!     pages: AtomicUsize,
//! }
//!
//! impl OperationProgress for CountingProgress {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize, _chars: usize) {
//!         self.pages.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}/{total_pages}");
//!     }
//! }
//! ```

use std::sync::Arc;

/// Receives page-level events from long-running operations.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync`; OCR runs on
/// the async runtime and split runs on the blocking pool.
pub trait OperationProgress: Send + Sync {
    /// Called once before the first page.
    fn on_operation_start(&self, operation: &str, total_pages: usize) {
        let _ = (operation, total_pages);
    }

    /// Called when a page has been processed.
    ///
    /// `chars` is the amount of text produced for the page (OCR) or 0 when the
    /// operation produces no text (split).
    fn on_page_complete(&self, page_num: usize, total_pages: usize, chars: usize) {
        let _ = (page_num, total_pages, chars);
    }

    /// Called when a page failed but the operation continues.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after all pages have been attempted.
    fn on_operation_complete(&self, total_pages: usize, success_count: usize) {
        let _ = (total_pages, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl OperationProgress for NoopProgress {}

/// Shared handle to a progress receiver.
pub type ProgressCallback = Arc<dyn OperationProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        operation: Mutex<String>,
        completes: AtomicUsize,
        errors: AtomicUsize,
        success: AtomicUsize,
    }

    impl OperationProgress for Recorder {
        fn on_operation_start(&self, operation: &str, _total_pages: usize) {
            *self.operation.lock().unwrap() = operation.to_string();
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize, _chars: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_operation_complete(&self, _total_pages: usize, success_count: usize) {
            self.success.store(success_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_progress_does_not_panic() {
        let p = NoopProgress;
        p.on_operation_start("split", 3);
        p.on_page_complete(1, 3, 0);
        p.on_page_error(2, 3, "bad page");
        p.on_operation_complete(3, 2);
    }

    #[test]
    fn recorder_receives_events_through_arc_dyn() {
        let recorder = Arc::new(Recorder::default());
        let cb: ProgressCallback = recorder.clone();

        cb.on_operation_start("ocr", 2);
        cb.on_page_complete(1, 2, 120);
        cb.on_page_error(2, 2, "timeout");
        cb.on_operation_complete(2, 1);

        assert_eq!(*recorder.operation.lock().unwrap(), "ocr");
        assert_eq!(recorder.completes.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.success.load(Ordering::SeqCst), 1);
    }
}
