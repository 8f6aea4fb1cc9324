//! Typst-backed rendering shared by the PDF and PNG exporters.
//!
//! The font registry is process-wide. Hosts may call [`init`] or
//! [`init_with_fonts`] once at startup; exporters fall back to lazy
//! initialization with the embedded fonts.

use std::sync::OnceLock;

use typst::layout::{Abs, PagedDocument};
use typst_as_lib::TypstEngine;

use crate::error::ExportError;

pub mod markup;

/// Largest raster side, in pixels.
const MAX_PIXMAP_SIDE: f64 = 16_384.0;
/// Largest raster area, in pixels.
const MAX_PIXMAP_AREA: f64 = 64.0 * 1024.0 * 1024.0;

static FONTS: OnceLock<Vec<&'static [u8]>> = OnceLock::new();

/// Installs the embedded fonts. Returns `false` if the registry was already
/// initialized, in which case nothing changes.
pub fn init() -> bool {
    init_with_fonts(&[])
}

/// Installs `extra` fonts ahead of the embedded ones. Only the first
/// initialization takes effect; later calls return `false`.
pub fn init_with_fonts(extra: &[&'static [u8]]) -> bool {
    let mut installed = false;
    FONTS.get_or_init(|| {
        installed = true;
        load_fonts(extra)
    });
    installed
}

fn load_fonts(extra: &[&'static [u8]]) -> Vec<&'static [u8]> {
    let mut fonts = extra.to_vec();
    fonts.extend(typst_assets::fonts());
    tracing::debug!(count = fonts.len(), "Font registry initialized");
    fonts
}

pub fn fonts() -> &'static [&'static [u8]] {
    FONTS.get_or_init(|| load_fonts(&[]))
}

/// Compiles a complete typst source into a laid out document.
pub fn compile(source: String) -> Result<PagedDocument, ExportError> {
    let engine = TypstEngine::builder()
        .main_file(source)
        .fonts(fonts().to_vec())
        .build();

    let doc: PagedDocument = engine
        .compile()
        .output
        .map_err(|e| ExportError::ConversionFailure(format!("Typst output error: {e:?}")))?;
    Ok(doc)
}

pub fn pdf(doc: &PagedDocument) -> Result<Vec<u8>, ExportError> {
    typst_pdf::pdf(doc, &typst_pdf::PdfOptions::default()).map_err(|e| {
        ExportError::ConversionFailure(format!("Typst PDF rendering error: {e:?}"))
    })
}

/// Rasterizes every page, stacked vertically, into a PNG.
pub fn png(doc: &PagedDocument, pixel_per_pt: f32) -> Result<Vec<u8>, ExportError> {
    if !pixel_per_pt.is_finite() || pixel_per_pt <= 1e-6 {
        return Err(ExportError::InvalidOptions(format!(
            "invalid scale: {pixel_per_pt}"
        )));
    }

    let ppp = f64::from(pixel_per_pt);
    let width = doc
        .pages
        .iter()
        .map(|page| page.frame.width().to_pt())
        .fold(0.0, f64::max)
        * ppp;
    let height = doc
        .pages
        .iter()
        .map(|page| page.frame.height().to_pt())
        .sum::<f64>()
        * ppp;
    if width.max(height).ceil() > MAX_PIXMAP_SIDE || (width * height).ceil() > MAX_PIXMAP_AREA {
        return Err(ExportError::InvalidOptions(format!(
            "scale {pixel_per_pt} gives a {width:.0}x{height:.0} image, too large to render"
        )));
    }

    typst_render::render_merged(doc, pixel_per_pt, Abs::zero(), None)
        .encode_png()
        .map_err(|e| ExportError::ConversionFailure(format!("failed to encode PNG ({e})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let _ = init();
        assert!(!init());
        assert!(!init_with_fonts(&[]));
        assert!(!fonts().is_empty());
    }

    #[test]
    fn test_png_rejects_unusable_scale() {
        let doc = compile("#set page(width: 100pt, height: 100pt)\nhello".to_string()).unwrap();
        for scale in [f32::INFINITY, f32::NAN, 0.0, 1e6] {
            let err = png(&doc, scale).unwrap_err();
            assert!(matches!(err, ExportError::InvalidOptions(_)), "{scale}: {err}");
        }
        assert!(png(&doc, 2.0).is_ok());
    }

    #[test]
    fn test_compile_reports_errors() {
        let err = compile("#unknown-function()".to_string()).unwrap_err();
        assert!(matches!(err, ExportError::ConversionFailure(_)));
    }
}
