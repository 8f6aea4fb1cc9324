use serde::Deserialize;

use crate::{
    dom::Document,
    error::ExportError,
    export_config::ExportConfig,
    exporter::{Export, Exported},
    render::{self, markup},
};

const PNG_MIME: &'static str = "image/PNG";
// CSS pixels per typst point
const PX_PER_PT: f32 = 96.0 / 72.0;
const PNG_TEMPLATE: &str = r#"
#set page(width: auto, height: auto, margin: 8pt, fill: {{fill}})
#set text(font: "Libertinus Serif", size: 11pt)
#set table(stroke: 0.5pt + gray, inset: 5pt)

{{content}}
"#;

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PngSettings {
    /// Device pixels per CSS pixel.
    scale: f32,
    /// Hex color; `null` keeps the background transparent.
    background_color: Option<String>,
}

impl Default for PngSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background_color: Some("#ffffff".to_string()),
        }
    }
}

/// Rasterizes the target element.
pub struct PngExporter;

impl PngExporter {
    pub fn new() -> Self {
        Self {}
    }
}

fn typst_fill(color: Option<&str>) -> Result<String, ExportError> {
    let Some(color) = color.map(str::trim) else {
        return Ok("none".to_string());
    };
    if color.eq_ignore_ascii_case("transparent") {
        return Ok("none".to_string());
    }

    let valid = color.strip_prefix('#').is_some_and(|hex| {
        matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit())
    });
    if !valid {
        return Err(ExportError::InvalidOptions(format!(
            "background color must be a hex color, got {color:?}"
        )));
    }
    Ok(format!("rgb(\"{color}\")"))
}

impl Export for PngExporter {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError> {
        let settings: PngSettings = config.options.settings()?;
        let element = document.require_element(&config.element_id_or_content)?;

        let template = PNG_TEMPLATE.replacen(
            "{{fill}}",
            &typst_fill(settings.background_color.as_deref())?,
            1,
        );
        let source = markup::inject_content(&template, &markup::to_typst(element)?);

        let doc = render::compile(source)?;
        let png = render::png(&doc, settings.scale * PX_PER_PT)?;
        tracing::debug!(bytes = png.len(), scale = settings.scale, "Png written");

        Ok(Exported::new(png.into(), PNG_MIME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;

    fn export(config: &ExportConfig) -> Result<Exported, ExportError> {
        let page = Page::from_html("<table id='t'><tr><td>a</td><td>b</td></tr></table>");
        PngExporter::new().export(&Document::parse(&page), config)
    }

    #[test]
    fn test_png_output() {
        let out = export(&ExportConfig::new("png", "t")).unwrap();
        assert_eq!(out.mime, "image/PNG");
        let img = image::load_from_memory(&out.data).unwrap();
        assert!(img.width() > 0 && img.height() > 0);
    }

    #[test]
    fn test_scale_grows_image() {
        let small = export(&ExportConfig::new("png", "t")).unwrap();
        let large = export(&ExportConfig::new("png", "t").with_option("scale", 2.0)).unwrap();
        let small = image::load_from_memory(&small.data).unwrap();
        let large = image::load_from_memory(&large.data).unwrap();
        assert!(large.width() > small.width());
    }

    #[test]
    fn test_fill() {
        assert_eq!(typst_fill(None).unwrap(), "none");
        assert_eq!(typst_fill(Some("#fff")).unwrap(), "rgb(\"#fff\")");
        assert!(typst_fill(Some("red\")")).is_err());
    }

    #[test]
    fn test_invalid_scale_fails() {
        for scale in [0.0, 1e9] {
            let config = ExportConfig::new("png", "t").with_option("scale", scale);
            let err = export(&config).unwrap_err();
            assert!(matches!(err, ExportError::InvalidOptions(_)), "{scale}: {err}");
        }
    }

    #[test]
    fn test_missing_target() {
        let err = export(&ExportConfig::new("png", "x")).unwrap_err();
        assert!(matches!(err, ExportError::TargetNotFound(_)));
    }
}
