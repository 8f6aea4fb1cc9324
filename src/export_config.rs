use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use typst::layout::PagedDocument;

use crate::error::ExportError;

/// Hook run on the laid out document right before the PDF is written.
pub type PdfCallback = Arc<dyn Fn(&mut PagedDocument) + Send + Sync>;

/// A JSON export row: header key to cell markup, in column order.
pub type JsonRow = Map<String, Value>;

/// Per-call input of an export.
///
/// Serializes as `{type, elementIdOrContent, options, download, fileName}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfig {
    #[serde(rename = "type")]
    pub export_type: String,
    pub element_id_or_content: String,
    #[serde(default)]
    pub options: ExportOptions,
    #[serde(default)]
    pub download: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl ExportConfig {
    pub fn new(export_type: impl Into<String>, element_id_or_content: impl Into<String>) -> Self {
        Self {
            export_type: export_type.into(),
            element_id_or_content: element_id_or_content.into(),
            ..Default::default()
        }
    }

    pub fn with_download(mut self, file_name: impl Into<String>) -> Self {
        self.download = true;
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.values.insert(key.into(), value.into());
        self
    }

    pub fn with_pdf_callback(
        mut self,
        callback: impl Fn(&mut PagedDocument) + Send + Sync + 'static,
    ) -> Self {
        self.options.pdf_callback_fn = Some(Arc::new(callback));
        self
    }
}

/// Converter options, handed through to the adapter which picks the keys it
/// understands.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(flatten)]
    pub values: Map<String, Value>,
    #[serde(skip)]
    pub pdf_callback_fn: Option<PdfCallback>,
}

impl fmt::Debug for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOptions")
            .field("values", &self.values)
            .field("pdf_callback_fn", &self.pdf_callback_fn.is_some())
            .finish()
    }
}

impl ExportOptions {
    /// Reads the options as an adapter settings struct; unknown keys are ignored.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, ExportError> {
        Ok(serde_json::from_value(Value::Object(self.values.clone()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_json_shape() {
        let config: ExportConfig = serde_json::from_str(
            r#"{"type":"PDF","elementIdOrContent":"table","options":{"margin":5},
                "download":true,"fileName":"r.pdf"}"#,
        )
        .unwrap();
        assert_eq!(config.export_type, "PDF");
        assert_eq!(config.element_id_or_content, "table");
        assert_eq!(config.options.values["margin"], 5);
        assert!(config.download);
        assert_eq!(config.file_name.as_deref(), Some("r.pdf"));

        let back = serde_json::to_value(&config).unwrap();
        assert_eq!(back["type"], "PDF");
        assert_eq!(back["elementIdOrContent"], "table");
        assert_eq!(back["fileName"], "r.pdf");
    }

    #[test]
    fn test_defaults() {
        let config: ExportConfig =
            serde_json::from_str(r#"{"type":"csv","elementIdOrContent":"t"}"#).unwrap();
        assert!(!config.download);
        assert!(config.file_name.is_none());
        assert!(config.options.values.is_empty());
        assert!(config.options.pdf_callback_fn.is_none());
    }

    #[test]
    fn test_settings_ignore_unknown_keys() {
        #[derive(Deserialize, Default)]
        #[serde(default)]
        struct Scale {
            scale: f32,
        }

        let config = ExportConfig::new("png", "t")
            .with_option("scale", 3.0)
            .with_option("logging", true);
        let scale: Scale = config.options.settings().unwrap();
        assert_eq!(scale.scale, 3.0);
    }
}
