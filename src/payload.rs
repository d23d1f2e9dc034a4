use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

/// Content type the built-in document is served with
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Built-in 1024-byte JSON document embedded in the binary
const BUILTIN_JSON: &[u8] = include_bytes!("../data/payload_1k.json");

/// Fixed response body served by the benchmark server
///
/// Holds the raw bytes and their gzip form, both computed once at
/// construction. The store is immutable afterwards and shared read-only
/// across every server connection, so the per-response cost is a slice pick.
#[derive(Debug, Clone)]
pub struct Payload {
    raw: Vec<u8>,
    gzipped: Vec<u8>,
    content_type: String,
}

impl Payload {
    /// Create a payload from raw bytes, pre-computing the gzip variant
    pub fn from_bytes(raw: Vec<u8>, content_type: impl Into<String>) -> Result<Self> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len()), Compression::default());
        encoder
            .write_all(&raw)
            .context("Failed to gzip payload bytes")?;
        let gzipped = encoder.finish().context("Failed to finish gzip stream")?;

        Ok(Self {
            raw,
            gzipped,
            content_type: content_type.into(),
        })
    }

    /// Load a payload from a file
    ///
    /// A missing or unreadable file is fatal for server startup, so the error
    /// carries the path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)
            .with_context(|| format!("Failed to read payload file {}", path.display()))?;
        Self::from_bytes(raw, JSON_CONTENT_TYPE)
    }

    /// The built-in JSON document
    pub fn builtin_json() -> Result<Self> {
        Self::from_bytes(BUILTIN_JSON.to_vec(), JSON_CONTENT_TYPE)
    }

    /// Uncompressed body bytes
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Pre-computed gzip body bytes
    pub fn gzipped(&self) -> &[u8] {
        &self.gzipped
    }

    /// Declared content type, identical for both variants
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_builtin_payload_is_1024_bytes_of_json() {
        let payload = Payload::builtin_json().unwrap();
        assert_eq!(payload.raw().len(), 1024);
        assert_eq!(payload.content_type(), JSON_CONTENT_TYPE);

        let parsed: serde_json::Value = serde_json::from_slice(payload.raw()).unwrap();
        assert!(parsed.is_object());
    }

    #[test]
    fn test_gzip_variant_round_trips() {
        let payload = Payload::builtin_json().unwrap();
        assert!(!payload.gzipped().is_empty());
        assert_ne!(payload.gzipped(), payload.raw());

        let mut decoder = flate2::read::GzDecoder::new(payload.gzipped());
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, payload.raw());
    }

    #[test]
    fn test_from_bytes_keeps_content_type() {
        let payload = Payload::from_bytes(b"hello".to_vec(), "text/plain").unwrap();
        assert_eq!(payload.raw(), b"hello");
        assert_eq!(payload.content_type(), "text/plain");
    }

    #[test]
    fn test_missing_payload_file_is_an_error() {
        let result = Payload::from_file(Path::new("/nonexistent/payload.json"));
        assert!(result.is_err());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("/nonexistent/payload.json"));
    }
}
