//! Document output
//!
//! Encoding and writing are reported separately from extraction: an
//! [`ExportError::Encode`] means the serializer produced something JSON
//! cannot hold, not that the scene was bad.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::ExportDocument;

/// Error types for the output stage
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to encode document as JSON: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Encode a document as JSON text
pub fn encode_document(document: &ExportDocument, pretty: bool) -> Result<String, ExportError> {
    let encoded = if pretty {
        serde_json::to_string_pretty(document)
    } else {
        serde_json::to_string(document)
    };
    encoded.map_err(ExportError::Encode)
}

/// Encode and write a document to `dir/filename`, creating `dir` if needed
pub fn write_document(
    document: &ExportDocument,
    dir: &Path,
    filename: &str,
    pretty: bool,
) -> Result<PathBuf, ExportError> {
    // Encode first so a bad document never leaves a truncated file behind
    let json = encode_document(document, pretty)?;

    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(filename);
    fs::write(&path, json).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::debug!("Wrote {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorDocument;

    fn error_document() -> ExportDocument {
        ExportDocument::Failed(ErrorDocument {
            error: "boom".to_string(),
            traceback: "boom\n\nCaused by:\n    bang".to_string(),
        })
    }

    #[test]
    fn test_encode_pretty_and_compact() {
        let doc = error_document();
        let pretty = encode_document(&doc, true).unwrap();
        let compact = encode_document(&doc, false).unwrap();
        assert!(pretty.contains("\n  \"error\": \"boom\""));
        assert!(!compact.contains('\n'));
    }

    #[test]
    fn test_write_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("configs").join("bone_mappings");
        let path = write_document(&error_document(), &target, "Rig_structure.json", true).unwrap();

        assert_eq!(path, target.join("Rig_structure.json"));
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["error"], "boom");
    }

    #[test]
    fn test_write_into_file_fails_with_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, "x").unwrap();

        let err = write_document(&error_document(), &blocker, "out.json", true).unwrap_err();
        assert!(matches!(err, ExportError::Io { .. }));
    }
}
