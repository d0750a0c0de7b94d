//! Document operations.
//!
//! Each operation takes one or more input paths, reads them fully, writes one
//! output on local disk and returns its path. They are synchronous and do
//! their own input validation, so they can be called directly from a CLI or
//! a test without a runtime:
//!
//! ```text
//!  merge        [a.pdf, b.pdf]  ──► merged.pdf
//!  split        a.pdf           ──► dir/page_1.pdf … page_n.pdf
//!  zip_pages    [page_*.pdf]    ──► split_pages.zip
//!  sign         a.pdf, "Ada"    ──► signed.pdf
//!  word_to_pdf  a.docx          ──► a.pdf
//!  pdf_to_word  a.pdf           ──► a.docx   (async: may fall back to OCR)
//!  inspect      a.pdf           ──► PdfInfo
//! ```
//!
//! [`run_blocking_to`] moves a synchronous operation onto the blocking pool
//! under a time budget and cleans up the output of a task that outlived it.
//! The document service runs every file write through it.

pub mod archive;
pub mod input;
pub mod pages;
pub mod pdf;
pub mod pdf_to_word;
pub mod sign;
pub mod word_to_pdf;

pub use archive::zip_pages;
pub use pages::{merge, split};
pub use pdf::{inspect, PdfInfo};
pub use pdf_to_word::{
    pdf_to_word, read_paragraphs, write_docx, TextSource, Transcript, WordOutput,
};
pub use sign::{sign, SignOutcome, StampPlacement};
pub use word_to_pdf::word_to_pdf;

use crate::error::DocError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Run an operation that writes `output` on tokio's blocking pool, bounded by
/// `timeout_secs`.
///
/// On timeout the caller gets [`DocError::Timeout`] immediately. The blocking
/// thread cannot be cancelled, so `output` is removed once the abandoned task
/// has actually finished and a late write leaves nothing behind.
pub async fn run_blocking_to<T, F>(
    operation: &'static str,
    timeout_secs: u64,
    output: &Path,
    f: F,
) -> Result<T, DocError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DocError> + Send + 'static,
{
    debug!(operation, timeout_secs, "Dispatching to blocking pool");
    let mut task = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(Duration::from_secs(timeout_secs), &mut task).await {
        Ok(joined) => joined
            .map_err(|e| DocError::Internal(format!("{operation} task panicked: {e}")))?,
        Err(_) => {
            let path = output.to_path_buf();
            tokio::spawn(async move {
                let _ = task.await;
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => debug!(operation, "Removed late output '{}'", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Could not remove '{}': {}", path.display(), e),
                }
            });
            Err(DocError::Timeout {
                operation,
                secs: timeout_secs,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_value() {
        let dir = tempfile::tempdir().unwrap();
        let v = run_blocking_to("add", 5, &dir.path().join("unused"), || Ok(2 + 2))
            .await
            .unwrap();
        assert_eq!(v, 4);
    }

    #[tokio::test]
    async fn propagates_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_blocking_to::<(), _>("merge", 5, &dir.path().join("unused"), || {
            Err(DocError::TooFewInputs { count: 1 })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DocError::TooFewInputs { count: 1 }));
    }

    #[tokio::test]
    async fn late_output_of_timed_out_task_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("late.pdf");
        let out = output.clone();

        let err = run_blocking_to("slow_write", 1, &output, move || {
            std::thread::sleep(Duration::from_millis(1500));
            std::fs::write(&out, b"%PDF-late").map_err(|e| DocError::OutputWriteFailed {
                path: out.clone(),
                source: e,
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DocError::Timeout { operation: "slow_write", .. }));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!output.exists(), "late write must not be left behind");
    }

    #[tokio::test]
    async fn output_of_finished_task_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("done.pdf");
        let out = output.clone();
        run_blocking_to("write", 5, &output, move || {
            std::fs::write(&out, b"%PDF").map_err(|e| DocError::OutputWriteFailed {
                path: out.clone(),
                source: e,
            })
        })
        .await
        .unwrap();
        assert!(output.exists());
    }
}
