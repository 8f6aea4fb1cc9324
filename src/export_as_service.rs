use std::{collections::HashMap, fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    dom::{Document, Page},
    download::Downloader,
    error::ExportError,
    export_config::{ExportConfig, JsonRow},
    exporter::{
        Export, Exported, csv::CsvExporter, docx::DocxExporter, json::JsonExporter,
        pdf::PdfExporter, png::PngExporter, xlsx::XlsxExporter, xml::XmlExporter,
    },
    settings::ExportAsSettings,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExportType {
    Pdf,
    Png,
    Csv,
    Txt,
    Xls,
    Xlsx,
    Docx,
    Doc,
    Json,
    Xml,
}

/// The converters behind the export types; aliases share one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Pdf,
    Png,
    Csv,
    Xls,
    Docx,
    Json,
    Xml,
}

impl ExportType {
    pub const ALL: [ExportType; 10] = [
        ExportType::Pdf,
        ExportType::Png,
        ExportType::Csv,
        ExportType::Txt,
        ExportType::Xls,
        ExportType::Xlsx,
        ExportType::Docx,
        ExportType::Doc,
        ExportType::Json,
        ExportType::Xml,
    ];

    pub fn handler(self) -> Handler {
        match self {
            ExportType::Pdf => Handler::Pdf,
            ExportType::Png => Handler::Png,
            ExportType::Csv | ExportType::Txt => Handler::Csv,
            ExportType::Xls | ExportType::Xlsx => Handler::Xls,
            ExportType::Docx | ExportType::Doc => Handler::Docx,
            ExportType::Json => Handler::Json,
            ExportType::Xml => Handler::Xml,
        }
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportType::Pdf => write!(f, "pdf"),
            ExportType::Png => write!(f, "png"),
            ExportType::Csv => write!(f, "csv"),
            ExportType::Txt => write!(f, "txt"),
            ExportType::Xls => write!(f, "xls"),
            ExportType::Xlsx => write!(f, "xlsx"),
            ExportType::Docx => write!(f, "docx"),
            ExportType::Doc => write!(f, "doc"),
            ExportType::Json => write!(f, "json"),
            ExportType::Xml => write!(f, "xml"),
        }
    }
}

impl FromStr for ExportType {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ExportType::Pdf),
            "png" => Ok(ExportType::Png),
            "csv" => Ok(ExportType::Csv),
            "txt" => Ok(ExportType::Txt),
            "xls" => Ok(ExportType::Xls),
            "xlsx" => Ok(ExportType::Xlsx),
            "docx" => Ok(ExportType::Docx),
            "doc" => Ok(ExportType::Doc),
            "json" => Ok(ExportType::Json),
            "xml" => Ok(ExportType::Xml),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// What an export resolves with.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutput {
    /// The file was handed to the download location.
    Downloaded,
    DataUrl(String),
    /// JSON exports resolve with the rows themselves.
    Rows(Vec<JsonRow>),
}

impl ExportOutput {
    pub fn data_url(&self) -> Option<&str> {
        match self {
            ExportOutput::DataUrl(url) => Some(url),
            _ => None,
        }
    }

    pub fn rows(&self) -> Option<&[JsonRow]> {
        match self {
            ExportOutput::Rows(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Exports elements of one page.
pub struct ExportAsService {
    page: Page,
    downloader: Downloader,
    default_file_name: String,
    exporters: HashMap<Handler, Arc<dyn Export>>,
}

impl ExportAsService {
    pub fn new(page: Page, downloader: Downloader) -> Self {
        let mut exporters = HashMap::<Handler, Arc<dyn Export>>::new();

        exporters.insert(Handler::Pdf, Arc::new(PdfExporter::default()));
        exporters.insert(Handler::Png, Arc::new(PngExporter::new()));
        exporters.insert(Handler::Csv, Arc::new(CsvExporter::new()));
        exporters.insert(Handler::Xls, Arc::new(XlsxExporter::new()));
        exporters.insert(Handler::Docx, Arc::new(DocxExporter::default()));
        exporters.insert(Handler::Json, Arc::new(JsonExporter::new()));
        exporters.insert(Handler::Xml, Arc::new(XmlExporter::new()));

        Self {
            page,
            downloader,
            default_file_name: ExportAsSettings::default().default_file_name,
            exporters,
        }
    }

    pub fn from_settings(page: Page, settings: &ExportAsSettings) -> Self {
        let mut service = Self::new(page, Downloader::new(&settings.download_dir));
        service.default_file_name = settings.default_file_name.clone();
        service
    }

    /// Swaps the converter behind `handler`.
    pub fn register(&mut self, handler: Handler, exporter: Arc<dyn Export>) {
        self.exporters.insert(handler, exporter);
    }

    pub fn supported_types(&self) -> Vec<ExportType> {
        ExportType::ALL
            .into_iter()
            .filter(|t| self.exporters.contains_key(&t.handler()))
            .collect()
    }

    /// Exports the element named by `config`, resolving with the encoded
    /// content, or with [`ExportOutput::Downloaded`] when `config.download`
    /// is set.
    pub async fn get(&self, mut config: ExportConfig) -> Result<ExportOutput, ExportError> {
        let export_type = config.export_type.parse::<ExportType>().inspect_err(|e| {
            tracing::warn!("Export rejected: {e}");
        })?;
        let handler = export_type.handler();
        let exporter = self
            .exporters
            .get(&handler)
            .cloned()
            .ok_or_else(|| ExportError::UnsupportedFormat(config.export_type.clone()))?;

        if export_type == ExportType::Txt {
            config.file_name = config.file_name.as_deref().map(txt_file_name);
        }
        if config.download && config.file_name.is_none() {
            config.file_name = Some(format!("{}.{export_type}", self.default_file_name));
        }

        tracing::debug!(
            %export_type,
            ?handler,
            download = config.download,
            target = %config.element_id_or_content,
            "Dispatching export"
        );

        let page = self.page.clone();
        let downloader = self.downloader.clone();
        let result = tokio::task::spawn_blocking(move || {
            let document = Document::parse(&page);
            let exported = exporter.export(&document, &config)?;
            finish(exported, &config, &downloader)
        })
        .await
        .map_err(ExportError::from)
        .and_then(|result| result);

        if let Err(e) = &result {
            tracing::warn!(%export_type, "Export failed: {e}");
        }
        result
    }

    /// Downloads the export as `<file_name>.<type>`.
    pub async fn save(
        &self,
        mut config: ExportConfig,
        file_name: &str,
    ) -> Result<ExportOutput, ExportError> {
        config.download = true;
        config.file_name = Some(format!("{file_name}.{}", config.export_type));
        self.get(config).await
    }
}

/// `report.csv` becomes `report.txt`.
fn txt_file_name(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or_default();
    format!("{stem}.txt")
}

fn finish(
    exported: Exported,
    config: &ExportConfig,
    downloader: &Downloader,
) -> Result<ExportOutput, ExportError> {
    if config.download {
        let file_name = config.file_name.as_deref().unwrap_or_default();
        downloader.from_blob(&exported.to_blob(), file_name)?;
        return Ok(ExportOutput::Downloaded);
    }

    match exported.rows {
        Some(rows) => Ok(ExportOutput::Rows(rows)),
        None => Ok(ExportOutput::DataUrl(exported.to_blob().to_data_url())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("PDF".parse::<ExportType>().unwrap(), ExportType::Pdf);
        assert_eq!("Xlsx".parse::<ExportType>().unwrap(), ExportType::Xlsx);
        assert!(matches!(
            "rtf".parse::<ExportType>(),
            Err(ExportError::UnsupportedFormat(t)) if t == "rtf"
        ));
    }

    #[test]
    fn test_display_round_trips() {
        for t in ExportType::ALL {
            assert_eq!(t.to_string().parse::<ExportType>().unwrap(), t);
        }
    }

    #[test]
    fn test_aliases_share_handlers() {
        assert_eq!(ExportType::Xlsx.handler(), ExportType::Xls.handler());
        assert_eq!(ExportType::Doc.handler(), ExportType::Docx.handler());
        assert_eq!(ExportType::Txt.handler(), ExportType::Csv.handler());

        let canonical = [
            ExportType::Pdf,
            ExportType::Png,
            ExportType::Csv,
            ExportType::Xls,
            ExportType::Docx,
            ExportType::Json,
            ExportType::Xml,
        ];
        let handlers: std::collections::HashSet<Handler> =
            canonical.iter().map(|t| t.handler()).collect();
        assert_eq!(handlers.len(), canonical.len());
    }

    #[test]
    fn test_txt_file_name() {
        assert_eq!(txt_file_name("report.csv"), "report.txt");
        assert_eq!(txt_file_name("report"), "report.txt");
        assert_eq!(txt_file_name("a.b.c"), "a.txt");
    }
}
