use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet};
use serde::Deserialize;

use crate::{
    dom::{self, Document, GridCell},
    error::ExportError,
    export_config::ExportConfig,
    exporter::{Export, Exported},
};

const XLSX_MIME: &'static str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const DEFAULT_SHEET_NAME: &str = "Sheet1";
const MAX_SHEET_NAME: usize = 31;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct XlsxSettings {
    /// Keep every cell as text instead of detecting numbers.
    pub raw: bool,
    /// Only the first `sheet_rows` table rows are read.
    pub sheet_rows: Option<usize>,
}

/// How a cell lands in the sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue<'a> {
    Number(f64),
    Text(&'a str),
}

impl XlsxSettings {
    /// Grid cells within the `sheet_rows` limit.
    pub fn sheet_cells<'a>(&self, grid: &'a [GridCell]) -> impl Iterator<Item = &'a GridCell> {
        let limit = self.sheet_rows;
        grid.iter().filter(move |cell| limit.is_none_or(|limit| cell.row < limit))
    }

    pub fn cell_value<'a>(&self, cell: &'a GridCell) -> CellValue<'a> {
        match cell.text.parse::<f64>() {
            Ok(num) if !self.raw && num.is_finite() => CellValue::Number(num),
            _ => CellValue::Text(&cell.text),
        }
    }
}

/// Fixed so that identical tables give identical workbooks.
fn creation_time() -> Result<ExcelDateTime, ExportError> {
    Ok(ExcelDateTime::from_ymd(2000, 1, 1)?)
}

/// Writes the table under the target element into a single sheet workbook.
pub struct XlsxExporter;

impl XlsxExporter {
    pub fn new() -> Self {
        Self {}
    }

    /// Excel forbids `[]:*?/\` in sheet names and caps them at 31 characters.
    pub fn sheet_name(file_name: Option<&str>) -> String {
        let name: String = file_name
            .unwrap_or_default()
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
            .take(MAX_SHEET_NAME)
            .collect();
        let name = name.trim_matches(|c: char| c == '\'' || c.is_whitespace());
        if name.is_empty() {
            DEFAULT_SHEET_NAME.to_string()
        } else {
            name.to_string()
        }
    }

    fn write_cell(
        &self,
        sheet: &mut Worksheet,
        cell: &GridCell,
        settings: &XlsxSettings,
        header_format: &Format,
    ) -> Result<(), ExportError> {
        let row = to_row(cell.row)?;
        let col = to_col(cell.col)?;
        let format = if cell.header {
            header_format.clone()
        } else {
            Format::new()
        };

        if cell.is_merged() {
            let last_row = to_row(cell.row + cell.row_span - 1)?;
            let last_col = to_col(cell.col + cell.col_span - 1)?;
            sheet.merge_range(row, col, last_row, last_col, &cell.text, &format)?;
            return Ok(());
        }

        match settings.cell_value(cell) {
            CellValue::Number(num) => {
                sheet.write_number_with_format(row, col, num, &format)?;
            }
            CellValue::Text(text) => {
                sheet.write_string_with_format(row, col, text, &format)?;
            }
        }
        Ok(())
    }
}

fn to_row(row: usize) -> Result<u32, ExportError> {
    u32::try_from(row)
        .map_err(|_| ExportError::ConversionFailure(format!("row {row} out of range")))
}

fn to_col(col: usize) -> Result<u16, ExportError> {
    u16::try_from(col)
        .map_err(|_| ExportError::ConversionFailure(format!("column {col} out of range")))
}

impl Export for XlsxExporter {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError> {
        let settings: XlsxSettings = config.options.settings()?;
        let element = document.require_element(&config.element_id_or_content)?;
        let grid = dom::table_grid(element);

        let mut workbook = Workbook::new();
        workbook.set_properties(&DocProperties::new().set_creation_datetime(&creation_time()?));
        let header_format = Format::new().set_bold();
        let sheet = workbook.add_worksheet();
        sheet.set_name(Self::sheet_name(config.file_name.as_deref()))?;

        for cell in settings.sheet_cells(&grid) {
            self.write_cell(sheet, cell, &settings, &header_format)?;
        }
        sheet.autofit();

        let bytes = workbook.save_to_buffer()?;
        tracing::debug!(cells = grid.len(), bytes = bytes.len(), "Workbook written");

        Ok(Exported::new(bytes.into(), XLSX_MIME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;

    const TABLE: &str = "<table id='t'><tr><th>Item</th><th>Price</th></tr>\
        <tr><td>Widget</td><td>9.99</td></tr>\
        <tr><td colspan='2'>Total</td></tr></table>";

    fn export(config: &ExportConfig) -> Result<Exported, ExportError> {
        XlsxExporter::new().export(&Document::parse(&Page::from_html(TABLE)), config)
    }

    #[test]
    fn test_workbook_is_zip() {
        let out = export(&ExportConfig::new("xlsx", "t")).unwrap();
        assert_eq!(out.mime, XLSX_MIME);
        assert!(out.data.len() > 100);
        assert_eq!(&out.data[0..2], b"PK");
    }

    fn grid() -> Vec<GridCell> {
        let doc = Document::parse(&Page::from_html(TABLE));
        dom::table_grid(doc.require_element("t").unwrap())
    }

    #[test]
    fn test_numbers_unless_raw() {
        let grid = grid();
        let price = &grid[3];
        assert_eq!(price.text, "9.99");

        let detect = XlsxSettings::default();
        assert_eq!(detect.cell_value(price), CellValue::Number(9.99));
        assert_eq!(detect.cell_value(&grid[2]), CellValue::Text("Widget"));

        let raw = XlsxSettings { raw: true, ..Default::default() };
        assert_eq!(raw.cell_value(price), CellValue::Text("9.99"));
    }

    #[test]
    fn test_sheet_rows_limits_cells() {
        let grid = grid();
        let settings = XlsxSettings { sheet_rows: Some(2), ..Default::default() };
        let texts: Vec<&str> = settings.sheet_cells(&grid).map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Item", "Price", "Widget", "9.99"]);
        assert_eq!(XlsxSettings::default().sheet_cells(&grid).count(), 5);
    }

    #[test]
    fn test_options_are_parsed() {
        let config = ExportConfig::new("xls", "t")
            .with_option("raw", true)
            .with_option("sheetRows", 1);
        let settings: XlsxSettings = config.options.settings().unwrap();
        assert!(settings.raw);
        assert_eq!(settings.sheet_rows, Some(1));
        assert!(export(&config).is_ok());
    }

    #[test]
    fn test_same_table_gives_same_bytes() {
        let first = export(&ExportConfig::new("xls", "t")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let second = export(&ExportConfig::new("xlsx", "t")).unwrap();
        assert_eq!(first.data, second.data);
    }

    #[test]
    fn test_overlapping_spans_export() {
        let page = Page::from_html(
            "<table id='o'><tr><td>a</td><td rowspan='2'>b</td></tr>\
             <tr><td colspan='3'>c</td></tr></table>",
        );
        let out = XlsxExporter::new()
            .export(&Document::parse(&page), &ExportConfig::new("xlsx", "o"))
            .unwrap();
        assert_eq!(&out.data[0..2], b"PK");
    }

    #[test]
    fn test_missing_target() {
        let err = export(&ExportConfig::new("xls", "missing")).unwrap_err();
        assert!(matches!(err, ExportError::TargetNotFound(_)));
    }

    #[test]
    fn test_sheet_name() {
        assert_eq!(XlsxExporter::sheet_name(Some("report.xlsx")), "report.xlsx");
        assert_eq!(XlsxExporter::sheet_name(Some("a/b:c")), "abc");
        assert_eq!(XlsxExporter::sheet_name(None), "Sheet1");
        assert_eq!(XlsxExporter::sheet_name(Some("[]")), "Sheet1");
        assert_eq!(XlsxExporter::sheet_name(Some("' 'x")), "x");
        assert_eq!(XlsxExporter::sheet_name(Some(" 'q' ")), "q");
        assert_eq!(
            XlsxExporter::sheet_name(Some(&"x".repeat(40))).len(),
            MAX_SHEET_NAME
        );
    }
}
