//! Document service: stored files in, stored artifacts out.
//!
//! ```text
//!  upload ──► FileStore ──► (file ids) ──► operation on the blocking pool
//!                                               │  output in work_dir
//!                                               ▼
//!                              FileStore::register_artifact
//!                                               │
//!                                               ▼
//!                                 ArtifactHook::on_artifact (each hook)
//! ```
//!
//! Every output is written to a fresh `work_dir/<operation>_<uuid>.<ext>`
//! path, so concurrent requests never share a file. An output is moved into
//! the store only after its operation succeeded; a failed or timed-out
//! operation leaves no record behind, and a write that lands after its
//! timeout is removed once the abandoned task ends.

use crate::config::ServiceConfig;
use crate::error::DocError;
use crate::notify::{ArtifactEvent, ArtifactHook};
use crate::ocr::OcrCapability;
use crate::ops::{self, run_blocking_to, StampPlacement, TextSource};
use crate::progress::ProgressCallback;
use crate::store::{FileStore, StoredFile};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The store, the operations and the post-artifact hooks, wired together.
pub struct DocumentService {
    config: ServiceConfig,
    store: FileStore,
    ocr: OcrCapability,
    hooks: Vec<Arc<dyn ArtifactHook>>,
    progress: Option<ProgressCallback>,
}

impl DocumentService {
    /// Open the store and prepare the work directory.
    pub async fn new(config: ServiceConfig, ocr: OcrCapability) -> Result<Self, DocError> {
        let store = FileStore::open(&config.storage_dir, config.max_upload_bytes).await?;
        tokio::fs::create_dir_all(&config.work_dir)
            .await
            .map_err(|e| DocError::OutputWriteFailed {
                path: config.work_dir.clone(),
                source: e,
            })?;
        info!(
            ocr = ocr.is_present(),
            "Document service ready (store: '{}')",
            config.storage_dir.display()
        );
        Ok(Self {
            config,
            store,
            ocr,
            hooks: Vec::new(),
            progress: None,
        })
    }

    /// Add a hook that runs after every registered artifact.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn ArtifactHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Receive per-page events from split and OCR.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn ocr(&self) -> &OcrCapability {
        &self.ocr
    }

    // ── Files ────────────────────────────────────────────────────────────

    pub async fn upload(
        &self,
        owner: Uuid,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<StoredFile, DocError> {
        self.store.upload(owner, filename, data).await
    }

    pub async fn list(&self, owner: Uuid) -> Vec<StoredFile> {
        self.store.list(owner).await
    }

    pub async fn get(&self, owner: Uuid, id: Uuid) -> Result<StoredFile, DocError> {
        self.store.get(owner, id).await
    }

    pub async fn delete(&self, owner: Uuid, id: Uuid) -> Result<(), DocError> {
        self.store.delete(owner, id).await
    }

    /// Public download URL of a file owned by `owner`.
    pub async fn share_link(&self, owner: Uuid, id: Uuid) -> Result<String, DocError> {
        let file = self.store.get(owner, id).await?;
        Ok(self.config.notify.public_url(&file.public_token))
    }

    /// Resolve a public share token to the file and the path of its bytes.
    pub async fn open_shared(&self, token: Uuid) -> Result<(StoredFile, PathBuf), DocError> {
        let file = self
            .store
            .find_by_token(token)
            .await
            .ok_or(DocError::StoredFileNotFound { id: token })?;
        let path = self.store.path_of(&file);
        Ok((file, path))
    }

    // ── Operations ───────────────────────────────────────────────────────

    /// Merge the given files, in order, into `merged.pdf`.
    pub async fn merge(&self, owner: Uuid, ids: &[Uuid]) -> Result<StoredFile, DocError> {
        if ids.len() < 2 {
            return Err(DocError::TooFewInputs { count: ids.len() });
        }
        let inputs = self.resolve_all(owner, ids).await?;
        let output = self.work_path("merge", "pdf");

        let out = output.clone();
        let result = run_blocking_to("merge", self.config.operation_timeout_secs, &output, move || {
            ops::merge(&inputs, &out)
        })
        .await;
        if let Err(e) = result {
            return Err(self.fail(&output, e).await);
        }
        self.publish(owner, &output, "merged.pdf", "PDF merged").await
    }

    /// Split a PDF into single pages and bundle them as `split_pages.zip`.
    pub async fn split(&self, owner: Uuid, id: Uuid) -> Result<StoredFile, DocError> {
        let input = self.resolve(owner, id).await?;
        let output = self.work_path("split", "zip");
        let pages_dir = tempfile::Builder::new()
            .prefix("split_")
            .tempdir_in(&self.config.work_dir)
            .map_err(|e| DocError::OutputWriteFailed {
                path: self.config.work_dir.clone(),
                source: e,
            })?;

        let out = output.clone();
        let progress = self.progress.clone();
        let result = run_blocking_to("split", self.config.operation_timeout_secs, &output, move || {
            let pages = ops::split(&input, pages_dir.path(), progress.as_ref())?;
            debug!("Split produced {} pages", pages.len());
            ops::zip_pages(&pages, &out)?;
            Ok(())
        })
        .await;
        if let Err(e) = result {
            return Err(self.fail(&output, e).await);
        }
        self.publish(owner, &output, "split_pages.zip", "PDF split").await
    }

    /// Stamp a signature line for `signer` into `signed.pdf`.
    pub async fn sign(
        &self,
        owner: Uuid,
        id: Uuid,
        signer: &str,
    ) -> Result<(StoredFile, StampPlacement), DocError> {
        let input = self.resolve(owner, id).await?;
        let output = self.work_path("sign", "pdf");

        let out = output.clone();
        let signer = signer.to_string();
        let options = self.config.sign.clone();
        let result = run_blocking_to("sign", self.config.operation_timeout_secs, &output, move || {
            ops::sign(&input, &out, &signer, &options)
        })
        .await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(&output, e).await),
        };
        let file = self.publish(owner, &output, "signed.pdf", "PDF signed").await?;
        Ok((file, outcome.placement))
    }

    /// Render a DOCX into `converted.pdf`.
    pub async fn word_to_pdf(&self, owner: Uuid, id: Uuid) -> Result<StoredFile, DocError> {
        let input = self.resolve(owner, id).await?;
        let output = self.work_path("word_to_pdf", "pdf");

        let out = output.clone();
        let layout = self.config.layout.clone();
        let secs = self.config.operation_timeout_secs;
        let result = run_blocking_to("word_to_pdf", secs, &output, move || {
            ops::word_to_pdf(&input, &out, &layout)
        })
        .await;
        if let Err(e) = result {
            return Err(self.fail(&output, e).await);
        }
        self.publish(owner, &output, "converted.pdf", "Word converted to PDF")
            .await
    }

    /// Extract a PDF's text into `converted.docx`, falling back to OCR.
    pub async fn pdf_to_word(
        &self,
        owner: Uuid,
        id: Uuid,
    ) -> Result<(StoredFile, TextSource), DocError> {
        let input = self.resolve(owner, id).await?;
        let output = self.work_path("pdf_to_word", "docx");
        let secs = self.config.ocr_timeout_secs;

        let started = Instant::now();
        let transcript = match tokio::time::timeout(
            Duration::from_secs(secs),
            ops::read_paragraphs(&input, &self.ocr, self.progress.as_ref()),
        )
        .await
        {
            Ok(Ok(transcript)) => transcript,
            Ok(Err(e)) => return Err(self.fail(&output, e).await),
            Err(_) => {
                let e = DocError::Timeout {
                    operation: "pdf_to_word",
                    secs,
                };
                return Err(self.fail(&output, e).await);
            }
        };

        // Writing gets whatever is left of the budget, at least one second.
        let remaining = secs.saturating_sub(started.elapsed().as_secs()).max(1);
        let out = output.clone();
        let ops::Transcript { paragraphs, source } = transcript;
        let result = run_blocking_to("pdf_to_word", remaining, &output, move || {
            ops::write_docx(&paragraphs, &out)
        })
        .await;
        if let Err(e) = result {
            return Err(self.fail(&output, e).await);
        }
        let file = self
            .publish(owner, &output, "converted.docx", "PDF converted to Word")
            .await?;
        Ok((file, source))
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn work_path(&self, operation: &str, ext: &str) -> PathBuf {
        self.config
            .work_dir
            .join(format!("{operation}_{}.{ext}", Uuid::new_v4()))
    }

    async fn resolve(&self, owner: Uuid, id: Uuid) -> Result<PathBuf, DocError> {
        let file = self.store.get(owner, id).await?;
        Ok(self.store.path_of(&file))
    }

    async fn resolve_all(&self, owner: Uuid, ids: &[Uuid]) -> Result<Vec<PathBuf>, DocError> {
        let mut paths = Vec::with_capacity(ids.len());
        for &id in ids {
            paths.push(self.resolve(owner, id).await?);
        }
        Ok(paths)
    }

    /// Drop the partial output of a failed operation and hand the error back.
    async fn fail(&self, output: &Path, error: DocError) -> DocError {
        discard(output).await;
        warn!(kind = ?error.kind(), "Operation failed: {}", error);
        error
    }

    /// Register a finished output and run the hooks.
    async fn publish(
        &self,
        owner: Uuid,
        output: &Path,
        filename: &str,
        title: &str,
    ) -> Result<StoredFile, DocError> {
        let file = match self.store.register_artifact(owner, output, filename).await {
            Ok(file) => file,
            Err(e) => {
                discard(output).await;
                return Err(e);
            }
        };
        info!(id = %file.id, size_bytes = file.size_bytes, "Created '{}'", file.filename);

        let event = ArtifactEvent {
            file: file.clone(),
            title: title.to_string(),
        };
        for hook in &self.hooks {
            hook.on_artifact(&event).await;
        }
        Ok(file)
    }
}

/// Remove a partial output, if any.
async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output '{}'", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove '{}': {}", path.display(), e),
    }
}
