//! Bundle split pages into a single downloadable zip.

use crate::error::DocError;
use crate::ops::input;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry name for an archived file: its base name, never a path.
fn entry_name(path: &Path, index: usize) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .map(str::to_string)
        .unwrap_or_else(|| format!("page_{}.pdf", index + 1))
}

/// Write `files` into a deflate-compressed zip at `output`, flat, in the given order.
pub fn zip_pages(files: &[PathBuf], output: &Path) -> Result<PathBuf, DocError> {
    input::ensure_parent(output)?;
    let write_err = |e: std::io::Error| DocError::OutputWriteFailed {
        path: output.to_path_buf(),
        source: e,
    };

    let file = File::create(output).map_err(write_err)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for (index, path) in files.iter().enumerate() {
        let data = std::fs::read(path).map_err(|_| DocError::FileNotFound { path: path.clone() })?;
        let name = entry_name(path, index);
        zip.start_file(name.as_str(), options)
            .map_err(|e| DocError::conversion("zip_pages", e))?;
        zip.write_all(&data).map_err(write_err)?;
    }

    zip.finish()
        .map_err(|e| DocError::conversion("zip_pages", e))?;
    info!("Archived {} files into '{}'", files.len(), output.display());
    Ok(output.to_path_buf())
}
