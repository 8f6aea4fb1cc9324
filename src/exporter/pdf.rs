use serde::Deserialize;

use crate::{
    dom::Document,
    error::ExportError,
    export_config::ExportConfig,
    exporter::{Export, Exported},
    render::{self, markup},
};

const PDF_MIME: &'static str = "application/pdf";
const DEFAULT_PAPER: &str = "a4";
const DEFAULT_MARGIN_MM: f64 = 10.0;
const DEFAULT_FONT_SIZE: f64 = 11.0;
const DEFAULT_TEMPLATE: &str = r#"
{{page}}
#set text(font: "Libertinus Serif", size: {{font_size}}pt)
#set table(stroke: 0.5pt + gray, inset: 5pt)

{{content}}
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PdfSettings {
    paper: Option<String>,
    orientation: Option<String>,
    /// Millimetres: one value, `[vertical, horizontal]` or `[top, left, bottom, right]`.
    margin: Option<Margin>,
    font_size: Option<f64>,
    #[serde(rename = "jsPDF")]
    js_pdf: JsPdfSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsPdfSettings {
    format: Option<String>,
    orientation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Margin {
    Uniform(f64),
    Sides(Vec<f64>),
}

/// Typst-based PDF exporter.
/// Template must contain the placeholders `{{page}}`, `{{font_size}}` and `{{content}}`.
pub struct PdfExporter {
    template: String,
}

impl Default for PdfExporter {
    fn default() -> Self {
        Self::new(None)
    }
}

impl PdfExporter {
    /// Create a new PdfExporter.
    /// - template: Optional template string. If None, a default is used.
    pub fn new<T: Into<Option<String>>>(template: T) -> Self {
        let template = template
            .into()
            .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string());
        Self { template }
    }

    fn page_setup(&self, settings: &PdfSettings) -> Result<String, ExportError> {
        let paper = settings
            .paper
            .as_deref()
            .or(settings.js_pdf.format.as_deref())
            .unwrap_or(DEFAULT_PAPER);
        let flipped = settings
            .orientation
            .as_deref()
            .or(settings.js_pdf.orientation.as_deref())
            .is_some_and(|o| o.to_ascii_lowercase().starts_with('l'));
        let margin = match &settings.margin {
            Some(margin) => typst_margin(margin)?,
            None => typst_margin(&Margin::Uniform(DEFAULT_MARGIN_MM))?,
        };

        Ok(format!(
            "#set page(paper: \"{}\", flipped: {flipped}, margin: {margin})",
            typst_paper(paper)?
        ))
    }

    /// Typst source for the element, or for the literal content when no
    /// element carries that id.
    pub fn source(
        &self,
        document: &Document,
        config: &ExportConfig,
    ) -> Result<String, ExportError> {
        let settings: PdfSettings = config.options.settings()?;
        let target = &config.element_id_or_content;

        let body = match document.element_by_id(target) {
            Some(element) => markup::to_typst(element)?,
            None => {
                tracing::debug!("No element with id {target:?}, rendering it as content");
                markup::to_typst(Document::parse_fragment(target).root())?
            }
        };

        let font_size = settings.font_size.unwrap_or(DEFAULT_FONT_SIZE);
        if !font_size.is_finite() || font_size <= 0.0 {
            return Err(ExportError::InvalidOptions(format!(
                "font size must be positive, got {font_size}"
            )));
        }

        let template = self
            .template
            .replacen("{{page}}", &self.page_setup(&settings)?, 1)
            .replacen("{{font_size}}", &font_size.to_string(), 1);
        Ok(markup::inject_content(&template, &body))
    }
}

fn typst_paper(name: &str) -> Result<String, ExportError> {
    let name = name.trim().to_ascii_lowercase();
    let name = match name.as_str() {
        "letter" | "legal" | "tabloid" => format!("us-{name}"),
        _ => name,
    };
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ExportError::InvalidOptions(format!("unknown paper {name:?}")));
    }
    Ok(name)
}

fn typst_margin(margin: &Margin) -> Result<String, ExportError> {
    let [top, left, bottom, right] = match margin {
        Margin::Uniform(m) => [*m; 4],
        Margin::Sides(sides) => match sides.as_slice() {
            [m] => [*m; 4],
            [v, h] => [*v, *h, *v, *h],
            [t, l, b, r] => [*t, *l, *b, *r],
            _ => {
                return Err(ExportError::InvalidOptions(format!(
                    "margin takes 1, 2 or 4 values, got {}",
                    sides.len()
                )));
            }
        },
    };
    if [top, left, bottom, right]
        .iter()
        .any(|m| !m.is_finite() || *m < 0.0)
    {
        return Err(ExportError::InvalidOptions("margins must be non-negative".to_string()));
    }
    Ok(format!(
        "(top: {top}mm, left: {left}mm, bottom: {bottom}mm, right: {right}mm)"
    ))
}

impl Export for PdfExporter {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError> {
        let source = self.source(document, config)?;
        let mut doc = render::compile(source)?;

        if let Some(callback) = &config.options.pdf_callback_fn {
            callback(&mut doc);
        }

        let pdf = render::pdf(&doc)?;
        tracing::debug!(pages = doc.pages.len(), bytes = pdf.len(), "Pdf written");
        Ok(Exported::new(pdf.into(), PDF_MIME))
    }
}
