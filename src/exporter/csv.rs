use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::{
    dom::{self, Document},
    error::ExportError,
    export_config::ExportConfig,
    exporter::{Export, Exported},
};

const CSV_MIME: &'static str = "text/csv";

/// Table rows as quoted, comma separated lines. Also serves TXT exports.
pub struct CsvExporter;

impl CsvExporter {
    pub fn new() -> Self {
        Self {}
    }

    fn render_line(&self, cells: &[String]) -> Result<String, ExportError> {
        if cells.is_empty() {
            return Ok(String::new());
        }

        let mut writer = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(cells)?;

        let bytes = writer
            .into_inner()
            .map_err(|e| ExportError::ConversionFailure(format!("Csv: {e}")))?;
        let line = String::from_utf8(bytes)
            .map_err(|e| ExportError::ConversionFailure(format!("Csv: {e}")))?;

        Ok(line.strip_suffix('\n').unwrap_or(&line).to_string())
    }

    pub fn render(&self, document: &Document, id: &str) -> Result<String, ExportError> {
        let element = document.require_element(id)?;
        let rows = dom::selector("table tr")?;
        let cells = dom::selector("td, th")?;

        let mut lines = Vec::new();
        for row in element.select(&rows) {
            let texts: Vec<String> = row.select(&cells).map(dom::inner_text).collect();
            lines.push(self.render_line(&texts)?);
        }

        Ok(lines.join("\n"))
    }
}

impl Export for CsvExporter {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError> {
        let content = self.render(document, &config.element_id_or_content)?;
        Ok(Exported::new(content.into(), CSV_MIME))
    }
}
