use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::ClientError;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Graph paths are either absolute URLs (hosted images) or paths served by
/// the backend itself, e.g. `/graph/plot_12.png`.
pub fn resolve_graph_url(base_url: &Url, graph_path: &str) -> String {
    let graph_path = graph_path.trim();
    let lower = graph_path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return graph_path.to_string();
    }
    format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        graph_path.trim_start_matches('/')
    )
}

/// Decoded inline graph image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphImage {
    bytes: Vec<u8>,
}

impl GraphImage {
    pub fn from_base64(encoded: &str) -> Result<Self, ClientError> {
        let encoded = encoded.trim();
        let payload = match encoded.split_once(";base64,") {
            Some((prefix, data)) if prefix.starts_with("data:") => data,
            _ => encoded,
        };
        let bytes = STANDARD
            .decode(payload)
            .map_err(|err| ClientError::Malformed(format!("invalid graph data: {err}")))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_png(&self) -> bool {
        self.bytes.starts_with(&PNG_SIGNATURE)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref();
        fs::write(path, &self.bytes)
            .map_err(|err| ClientError::Io(format!("failed to write {}: {err}", path.display())))
    }
}
