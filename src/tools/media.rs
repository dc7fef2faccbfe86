//! OCR, transcription and image encoding.
//!
//! OCR and transcription shell out to configurable programs and return their
//! output verbatim.

use std::path::Path;
use std::time::Duration;

use base64::Engine;

use super::process::run_program;
use crate::submit::{StoredValueCache, STORED_PREFIX};

const MEDIA_TIMEOUT: Duration = Duration::from_secs(120);

fn ensure_file(path: &Path) -> anyhow::Result<String> {
    if !path.is_file() {
        anyhow::bail!("File not found: {}", path.display());
    }
    Ok(path.to_string_lossy().into_owned())
}

/// `<ocr_command> <path> stdout`, the tesseract calling convention.
pub async fn ocr_image(command: &str, path: &Path, workspace: &Path) -> anyhow::Result<String> {
    let file = ensure_file(path)?;
    let out = run_program(command, &[file.as_str(), "stdout"], workspace, MEDIA_TIMEOUT).await?;
    if !out.success() {
        return Ok(out.render());
    }
    Ok(out.stdout.trim().to_string())
}

/// `<transcribe_command> <path>`.
pub async fn transcribe_audio(
    command: &str,
    path: &Path,
    workspace: &Path,
) -> anyhow::Result<String> {
    let file = ensure_file(path)?;
    let out = run_program(command, &[file.as_str()], workspace, MEDIA_TIMEOUT).await?;
    if !out.success() {
        return Ok(out.render());
    }
    Ok(out.stdout.trim().to_string())
}

/// Base64 the file and cache it, returning the `STORED:<key>` placeholder.
///
/// The encoded image never enters the conversation; the submission client
/// swaps the placeholder back for the value.
pub async fn encode_image(path: &Path, store: &StoredValueCache) -> anyhow::Result<String> {
    ensure_file(path)?;
    let bytes = tokio::fs::read(path).await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
    let key = store.insert_generated(encoded);
    tracing::info!("Encoded {} ({} bytes) as {}", path.display(), bytes.len(), key);
    Ok(format!("{}{}", STORED_PREFIX, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encode_image_caches_value_behind_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img.png");
        std::fs::write(&path, b"hello").unwrap();

        let store = StoredValueCache::new();
        let placeholder = encode_image(&path, &store).await.unwrap();
        let key = placeholder.strip_prefix(STORED_PREFIX).unwrap();
        assert_eq!(store.get(key).as_deref(), Some("aGVsbG8="));
    }

    #[tokio::test]
    async fn missing_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let store = StoredValueCache::new();
        assert!(encode_image(&missing, &store).await.is_err());
        assert!(ocr_image("tesseract", &missing, dir.path()).await.is_err());
        assert!(store.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn transcription_returns_program_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        std::fs::write(&path, b"RIFF").unwrap();
        // `echo` stands in for the transcriber: it prints its argument.
        let text = transcribe_audio("echo", &path, dir.path()).await.unwrap();
        assert!(text.ends_with("clip.wav"));
    }
}
