//! File attachment loading
//!
//! Reads submitted documents once, up front, and carries their extracted
//! text as a base64 payload so the composer never touches the filesystem.
//! PDF and DOCX files are accepted but not parsed; the composer represents
//! them by name only.

use crate::util::format_size;
use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::fs;
use std::path::Path;

pub const MAX_FILE_SIZE_MB: u64 = 10;
pub const MAX_FILE_COUNT: usize = 5;

const MAX_FILE_SIZE_BYTES: u64 = MAX_FILE_SIZE_MB * 1024 * 1024;

const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const MIME_TEXT: &str = "text/plain";

/// A document prepared for one analysis request. Immutable after load.
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Extracted text, base64-encoded UTF-8. Empty for unparsed kinds.
    pub payload: String,
}

impl FileAttachment {
    /// Whether the payload carries extracted text the composer can inline.
    pub fn is_text(&self) -> bool {
        self.mime_type == MIME_TEXT
    }

    /// Decode the stored payload back to text. `None` when the payload is
    /// not valid base64; invalid UTF-8 inside is replaced, not rejected.
    pub fn decoded_text(&self) -> Option<String> {
        let bytes = BASE64.decode(self.payload.as_bytes()).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Load a single document from disk, enforcing the per-file limits.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Invalid file path: {}", path.display()))?;

        let metadata = fs::metadata(path)
            .with_context(|| format!("Cannot read file: {}", path.display()))?;
        if !metadata.is_file() {
            bail!("Not a regular file: {}", path.display());
        }

        let size_bytes = metadata.len();
        if size_bytes > MAX_FILE_SIZE_BYTES {
            bail!(
                "File too large: {} is {} (limit {} MB)",
                name,
                format_size(size_bytes),
                MAX_FILE_SIZE_MB
            );
        }

        let mime_type = detect_mime(path)?;

        let payload = if mime_type == MIME_TEXT {
            let bytes = fs::read(path)
                .with_context(|| format!("Failed to read file: {}", path.display()))?;
            let text = String::from_utf8_lossy(&bytes);
            BASE64.encode(text.as_bytes())
        } else {
            // Content extraction for PDF/DOCX is out of scope; the name
            // still participates in the analysis.
            String::new()
        };

        Ok(Self {
            name,
            mime_type,
            size_bytes,
            payload,
        })
    }

    /// Load a batch of documents, enforcing the per-request count limit.
    pub fn load_all(paths: &[std::path::PathBuf]) -> Result<Vec<Self>> {
        if paths.len() > MAX_FILE_COUNT {
            bail!(
                "Too many files: {} submitted, at most {} per analysis",
                paths.len(),
                MAX_FILE_COUNT
            );
        }
        paths.iter().map(|p| Self::load(p)).collect()
    }
}

fn detect_mime(path: &Path) -> Result<String> {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    let essence = guessed.essence_str();

    match essence {
        MIME_PDF | MIME_DOCX | MIME_TEXT => Ok(essence.to_string()),
        _ => bail!(
            "Unsupported file type for {}: {} (supported: pdf, docx, txt)",
            path.display(),
            essence
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(dir: &tempfile::TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_load_text_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "policy.txt", "我们会收集您的位置信息".as_bytes());

        let attachment = FileAttachment::load(&path).unwrap();
        assert_eq!(attachment.name, "policy.txt");
        assert!(attachment.is_text());
        assert_eq!(
            attachment.decoded_text().unwrap(),
            "我们会收集您的位置信息"
        );
    }

    #[test]
    fn test_pdf_loads_as_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "policy.pdf", b"%PDF-1.4 ...");

        let attachment = FileAttachment::load(&path).unwrap();
        assert!(!attachment.is_text());
        assert!(attachment.payload.is_empty());
        assert_eq!(attachment.mime_type, MIME_PDF);
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_file(&dir, "tool.exe", b"MZ");

        let err = FileAttachment::load(&path).unwrap_err();
        assert!(err.to_string().contains("Unsupported file type"));
    }

    #[test]
    fn test_oversized_file_rejected_before_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.txt");
        let file = fs::File::create(&path).unwrap();
        file.set_len(MAX_FILE_SIZE_BYTES + 1).unwrap();

        let err = FileAttachment::load(&path).unwrap_err();
        assert!(err.to_string().contains("File too large"));
    }

    #[test]
    fn test_count_limit() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..MAX_FILE_COUNT + 1)
            .map(|i| temp_file(&dir, &format!("f{}.txt", i), b"x"))
            .collect();

        let err = FileAttachment::load_all(&paths).unwrap_err();
        assert!(err.to_string().contains("Too many files"));
    }

    #[test]
    fn test_invalid_payload_decodes_to_none() {
        let attachment = FileAttachment {
            name: "broken.txt".to_string(),
            mime_type: MIME_TEXT.to_string(),
            size_bytes: 3,
            payload: "%%%not-base64%%%".to_string(),
        };
        assert!(attachment.decoded_text().is_none());
    }
}
