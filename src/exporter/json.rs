use serde_json::Value;

use crate::{
    dom::{self, Document},
    error::ExportError,
    export_config::{ExportConfig, JsonRow},
    exporter::{Export, Exported},
};

const JSON_MIME: &'static str = "text/json";

/// Table rows as objects keyed by the header row.
pub struct JsonExporter;

impl JsonExporter {
    pub fn new() -> Self {
        Self {}
    }

    fn header_key(markup: &str) -> String {
        markup.to_lowercase().replace(' ', "")
    }

    pub fn rows(&self, document: &Document, id: &str) -> Result<Vec<JsonRow>, ExportError> {
        let table = document.require_element(id)?;
        if !dom::is_tag(&table, "table") {
            return Err(ExportError::NotATable(id.to_string()));
        }

        let rows = dom::table_rows(table);
        let Some((header, body)) = rows.split_first() else {
            return Ok(Vec::new());
        };

        let headers: Vec<String> = dom::row_cells(*header)
            .into_iter()
            .map(|cell| Self::header_key(&cell.inner_html()))
            .collect();

        let data = body
            .iter()
            .map(|row| {
                dom::row_cells(*row)
                    .into_iter()
                    .zip(&headers)
                    .map(|(cell, key)| (key.clone(), Value::String(cell.inner_html())))
                    .collect::<JsonRow>()
            })
            .collect();

        Ok(data)
    }
}

impl Export for JsonExporter {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError> {
        let rows = self.rows(document, &config.element_id_or_content)?;
        let json = serde_json::to_string(&rows)
            .map_err(|e| ExportError::ConversionFailure(format!("Json: {e}")))?;
        Ok(Exported::new(json.into(), JSON_MIME).with_rows(rows))
    }
}
