//! Data URL encoding and decoding.
//!
//! A data URL has the shape `data:<mime>;base64,<payload>` and is the value
//! every non-download export resolves with.

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;

use crate::error::ExportError;

const DATA_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// Raw content tagged with a MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Bytes,
    pub mime: String,
}

impl Blob {
    pub fn new(data: impl Into<Bytes>, mime: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime: mime.into(),
        }
    }

    /// Reads the blob back as a data URL.
    pub fn to_data_url(&self) -> String {
        add_type_prefix(&STANDARD.encode(&self.data), &self.mime)
    }
}

/// Decodes a data URL into a [`Blob`] carrying the MIME type of its prefix.
pub fn to_blob(data_url: &str) -> Result<Blob, ExportError> {
    let (header, payload) = data_url
        .split_once(',')
        .ok_or_else(|| ExportError::MalformedDataUrl("missing ',' separator".to_string()))?;

    // the mime sits between the first ':' and the next ';'
    let mime = header
        .split_once(':')
        .and_then(|(_, rest)| rest.split_once(';'))
        .map(|(mime, _)| mime)
        .filter(|mime| !mime.is_empty())
        .ok_or_else(|| ExportError::MalformedDataUrl(format!("no mime type in {header:?}")))?;

    let data = STANDARD
        .decode(payload)
        .map_err(|e| ExportError::MalformedDataUrl(e.to_string()))?;

    Ok(Blob::new(data, mime))
}

/// Removes a leading `data:...;base64,` prefix, leaving other content untouched.
pub fn strip_type_prefix(content: &str) -> &str {
    if !content.starts_with(DATA_SCHEME) {
        return content;
    }
    match content.rfind(BASE64_MARKER) {
        Some(idx) => &content[idx + BASE64_MARKER.len()..],
        None => content,
    }
}

pub fn add_type_prefix(content: &str, mime: &str) -> String {
    format!("{DATA_SCHEME}{mime}{BASE64_MARKER}{content}")
}

/// Base64 of the UTF-8 bytes of `content`.
pub fn encode_text(content: &str) -> String {
    STANDARD.encode(content.as_bytes())
}
