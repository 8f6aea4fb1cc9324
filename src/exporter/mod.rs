use bytes::Bytes;
use derive_new::new;

use crate::{
    codec::Blob,
    dom::Document,
    error::ExportError,
    export_config::{ExportConfig, JsonRow},
};

pub mod csv;
pub mod docx;
pub mod json;
pub mod pdf;
pub mod png;
pub mod xlsx;
pub mod xml;

#[derive(Debug, new)]
pub struct Exported {
    pub data: Bytes,
    pub mime: &'static str,
    /// Structured rows, returned instead of the encoded data when not downloading.
    #[new(default)]
    pub rows: Option<Vec<JsonRow>>,
}

impl Exported {
    pub fn with_rows(mut self, rows: Vec<JsonRow>) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn to_blob(&self) -> Blob {
        Blob::new(self.data.clone(), self.mime)
    }
}

/// A format converter: reads its source from the page and produces the file
/// content.
pub trait Export: Send + Sync {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError>;
}
