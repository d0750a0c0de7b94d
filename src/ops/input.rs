//! Input validation: confirm a path is a readable file of the expected type.
//!
//! Checking magic bytes up front turns "lopdf could not find the xref" or
//! "zip central directory missing" into a clear input error naming the file.
//! PDFs start with `%PDF`; DOCX files are zip containers starting with `PK\x03\x04`.

use crate::error::DocError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

const PDF_MAGIC: &[u8; 4] = b"%PDF";
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Validate that `path` is an existing, readable PDF.
pub fn check_pdf(path: &Path) -> Result<(), DocError> {
    let magic = read_magic(path)?;
    if &magic != PDF_MAGIC {
        return Err(DocError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    debug!("Validated PDF input: {}", path.display());
    Ok(())
}

/// Validate that `path` is an existing, readable DOCX container.
pub fn check_docx(path: &Path) -> Result<(), DocError> {
    let magic = read_magic(path)?;
    if &magic != ZIP_MAGIC {
        return Err(DocError::NotADocx {
            path: path.to_path_buf(),
            magic,
        });
    }
    debug!("Validated DOCX input: {}", path.display());
    Ok(())
}

/// Read the first four bytes, zero-padded when the file is shorter.
fn read_magic(path: &Path) -> Result<[u8; 4], DocError> {
    let owned = || PathBuf::from(path);

    if !path.is_file() {
        return Err(DocError::FileNotFound { path: owned() });
    }

    let mut f = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocError::PermissionDenied { path: owned() });
        }
        Err(_) => return Err(DocError::FileNotFound { path: owned() }),
    };

    let mut magic = [0u8; 4];
    let mut filled = 0;
    while filled < magic.len() {
        match f.read(&mut magic[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return Err(DocError::PermissionDenied { path: owned() }),
        }
    }
    Ok(magic)
}

/// Make sure the parent directory of `output` exists.
pub fn ensure_parent(output: &Path) -> Result<(), DocError> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| DocError::OutputWriteFailed {
                path: output.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}
