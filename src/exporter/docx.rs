use std::io::Cursor;

use bytes::Bytes;
use docx_rs::{
    BreakType, Docx, PageOrientationType, Paragraph as DocxParagraph, Run as DocxRun, RunFonts,
    SpecialIndentType, Table as DocxTable, TableCell as DocxTableCell, TableRow as DocxTableRow,
    VMergeType,
};
use scraper::ElementRef;
use serde::Deserialize;

use crate::{
    dom::{self, Document, GridCell, Page},
    error::ExportError,
    export_config::ExportConfig,
    exporter::{Export, Exported},
};

#[derive(Clone)]
pub struct DocxExporter {
    default_font_family: String, // e.g. "Times New Roman"
    mono_font_family: String,    // e.g. "Courier New"
    default_font_size: usize,    // half-points (22 = 11pt)
    landscape: bool,
}

const DOCX_MIME: &'static str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

// A4 in twips
const PAGE_WIDTH: u32 = 11906;
const PAGE_HEIGHT: u32 = 16838;

// Indentation (in twips: 1440 twips = 1 inch)
const LIST_BASE_LEFT: i32 = 720; // 0.5"
const LIST_LEVEL_INCREMENT: i32 = 360; // 0.25"
const LIST_HANGING: i32 = 360; // Hanging indent for bullet/number

const SKIPPED: &[&str] = &[
    "head", "script", "style", "title", "meta", "link", "template", "noscript", "img", "svg",
    "canvas", "iframe",
];

const BLOCKS: &[&str] = &[
    "html", "body", "p", "div", "section", "article", "main", "header", "footer", "nav", "aside",
    "blockquote", "figure", "figcaption", "form", "fieldset", "address", "h1", "h2", "h3", "h4",
    "h5", "h6", "ul", "ol", "li", "table", "pre", "hr", "dl", "dt", "dd",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DocxSettings {
    font: Option<String>,
    /// Half-points.
    font_size: Option<usize>,
    orientation: Option<String>,
}

enum Block {
    Paragraph(DocxParagraph),
    Table(DocxTable),
}

#[derive(Debug, Clone, Copy, Default)]
struct InlineStyle {
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    mono: bool,
    size: usize,
}

impl Default for DocxExporter {
    fn default() -> Self {
        Self {
            default_font_family: "Times New Roman".to_string(),
            mono_font_family: "Courier New".to_string(),
            default_font_size: 22, // 11pt
            landscape: false,
        }
    }
}

impl DocxExporter {
    pub fn new(
        default_font_family: String,
        mono_font_family: String,
        default_font_size: usize,
    ) -> Self {
        Self {
            default_font_family,
            mono_font_family,
            default_font_size,
            landscape: false,
        }
    }

    fn with_settings(&self, settings: DocxSettings) -> Self {
        let mut exporter = self.clone();
        if let Some(font) = settings.font {
            exporter.default_font_family = font;
        }
        if let Some(size) = settings.font_size.filter(|s| *s > 0) {
            exporter.default_font_size = size;
        }
        if let Some(orientation) = settings.orientation {
            exporter.landscape = orientation.eq_ignore_ascii_case("landscape");
        }
        exporter
    }

    // ---------------- Headings ----------------

    // Map heading depth (1..=6) to half-point font sizes (Word uses half-points: 32 = 16pt)
    fn heading_font_size(&self, depth: usize) -> usize {
        let body_half = self.default_font_size as f32;
        let multiplier = match depth {
            1 => 1.60,
            2 => 1.45,
            3 => 1.30,
            4 => 1.15,
            5 => 1.05,
            _ => 1.00,
        };
        (body_half * multiplier).round().clamp(2.0, 400.0) as usize
    }

    // Spacing scales with the body size against an 11pt baseline.
    fn heading_spacing(&self, depth: usize) -> (u32, u32) {
        let (base_before, base_after) = match depth {
            1 => (360u32, 180u32),
            2 => (320, 160),
            3 => (300, 140),
            _ => (240, 120),
        };
        let ratio = self.default_font_size as f32 / 2.0 / 11.0;
        let scale = |v: u32| -> u32 { (v as f32 * ratio).round().max(20.0) as u32 };
        (scale(base_before), scale(base_after))
    }

    fn render_heading(&self, el: ElementRef<'_>, depth: usize) -> DocxParagraph {
        let (before, after) = self.heading_spacing(depth);
        let p = DocxParagraph::new()
            .line_spacing(docx_rs::LineSpacing::new().before(before).after(after));
        let style = InlineStyle {
            bold: true,
            size: self.heading_font_size(depth),
            ..Default::default()
        };
        self.append_inline_children(p, el, style)
    }

    // --------------- Lists with real indentation (not spaces) ---------------

    fn list_left_indent(depth: usize) -> i32 {
        LIST_BASE_LEFT + (depth as i32) * LIST_LEVEL_INCREMENT
    }

    fn render_list(
        &self,
        list: ElementRef<'_>,
        ordered: bool,
        depth: usize,
        out: &mut Vec<Block>,
    ) {
        let mut index = list
            .value()
            .attr("start")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(1);

        for item in dom::child_elements(list).filter(|c| dom::is_tag(c, "li")) {
            let marker = if ordered {
                format!("{}.", index)
            } else {
                "•".to_string()
            };
            let mut para = DocxParagraph::new()
                .indent(
                    Some(Self::list_left_indent(depth)),
                    Some(SpecialIndentType::Hanging(LIST_HANGING)),
                    None,
                    None,
                )
                .add_run(DocxRun::new().bold().add_text(marker + " "));

            let mut nested = Vec::new();
            for child in item.children() {
                if let Some(text) = dom::node_text(child.value()) {
                    let text = dom::collapse_keep_edges(text);
                    para = self.add_text_run(para, &text, InlineStyle::default());
                } else if let Some(child) = ElementRef::wrap(child) {
                    match dom::tag_name(&child) {
                        "ul" => self.render_list(child, false, depth + 1, &mut nested),
                        "ol" => self.render_list(child, true, depth + 1, &mut nested),
                        name if BLOCKS.contains(&name) => {
                            self.render_block(child, depth + 1, &mut nested)
                        }
                        _ => para = self.append_inline(para, child, InlineStyle::default()),
                    }
                }
            }

            out.push(Block::Paragraph(para));
            out.extend(nested);
            if ordered {
                index += 1;
            }
        }
    }

    // ---------------- Tables ----------------

    /// Row spans become vertical merges: the first row restarts the merge and
    /// every covered row carries a continuation cell.
    fn render_table(&self, el: ElementRef<'_>) -> Option<DocxTable> {
        let grid = dom::table_grid(el);
        let last_row = grid.iter().map(|c| c.row + c.row_span).max()?;

        let rows = (0..last_row)
            .map(|r| {
                let mut covering: Vec<&GridCell> = grid
                    .iter()
                    .filter(|c| c.row <= r && r < c.row + c.row_span)
                    .collect();
                covering.sort_by_key(|c| c.col);
                let cells = covering
                    .into_iter()
                    .map(|c| self.render_table_cell(c, r))
                    .collect();
                DocxTableRow::new(cells)
            })
            .collect();

        Some(DocxTable::new(rows))
    }

    fn render_table_cell(&self, cell: &GridCell, row: usize) -> DocxTableCell {
        let mut out = DocxTableCell::new();
        if cell.col_span > 1 {
            out = out.grid_span(cell.col_span);
        }
        if cell.row_span > 1 {
            let merge = if cell.row == row {
                VMergeType::Restart
            } else {
                VMergeType::Continue
            };
            out = out.vertical_merge(merge);
        }

        let mut para = DocxParagraph::new();
        if cell.row == row {
            let style = InlineStyle {
                bold: cell.header,
                ..Default::default()
            };
            para = self.add_text_run(para, &cell.text, style);
        }
        out.add_paragraph(para)
    }

    // ---------------- Block dispatcher ----------------

    fn render_block(&self, el: ElementRef<'_>, depth: usize, out: &mut Vec<Block>) {
        let name = dom::tag_name(&el);
        match name {
            _ if SKIPPED.contains(&name) => {}
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                out.push(Block::Paragraph(self.render_heading(el, level)));
            }
            "p" => {
                let para = self.new_body_paragraph();
                let para = self.append_inline_children(para, el, InlineStyle::default());
                out.push(Block::Paragraph(para));
            }
            "pre" => {
                let code = dom::text_content(el);
                out.push(Block::Paragraph(self.render_code_block(&code)));
            }
            "ul" => self.render_list(el, false, depth, out),
            "ol" => self.render_list(el, true, depth, out),
            "hr" => out.push(Block::Paragraph(self.new_body_paragraph())),
            "table" => {
                if let Some(table) = self.render_table(el) {
                    out.push(Block::Table(table));
                }
            }
            _ => self.render_flow(el, depth, out),
        }
    }

    /// Children of a generic container: inline runs gather into paragraphs
    /// that break around nested blocks.
    fn render_flow(&self, el: ElementRef<'_>, depth: usize, out: &mut Vec<Block>) {
        let mut current: Option<DocxParagraph> = None;
        let mut has_content = false;

        for child in el.children() {
            if let Some(text) = dom::node_text(child.value()) {
                if text.trim().is_empty() && !has_content {
                    continue;
                }
                let para = current.take().unwrap_or_else(|| self.new_body_paragraph());
                let text = dom::collapse_keep_edges(text);
                current = Some(self.add_text_run(para, &text, InlineStyle::default()));
                has_content = true;
            } else if let Some(child) = ElementRef::wrap(child) {
                let name = dom::tag_name(&child);
                if SKIPPED.contains(&name) {
                    continue;
                }
                if BLOCKS.contains(&name) {
                    if let Some(para) = current.take().filter(|_| has_content) {
                        out.push(Block::Paragraph(para));
                    }
                    has_content = false;
                    self.render_block(child, depth, out);
                } else {
                    let para = current.take().unwrap_or_else(|| self.new_body_paragraph());
                    current = Some(self.append_inline(para, child, InlineStyle::default()));
                    has_content = true;
                }
            }
        }

        if let Some(para) = current.filter(|_| has_content) {
            out.push(Block::Paragraph(para));
        }
    }

    fn render_code_block(&self, code: &str) -> DocxParagraph {
        let mut p = self.new_body_paragraph();
        p = p.indent(Some(0), None, None, None);

        let lines: Vec<&str> = code.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            let style = InlineStyle {
                mono: true,
                ..Default::default()
            };
            p = self.add_text_run(p, line, style);

            // Add line break after each line except the last
            if i + 1 < lines.len() {
                p = p.add_run(DocxRun::new().add_break(BreakType::TextWrapping));
            }
        }

        p
    }

    // ---------------- Inline handling ----------------

    fn append_inline_children(
        &self,
        mut paragraph: DocxParagraph,
        el: ElementRef<'_>,
        style: InlineStyle,
    ) -> DocxParagraph {
        for child in el.children() {
            if let Some(text) = dom::node_text(child.value()) {
                paragraph = self.add_text_run(paragraph, &dom::collapse_keep_edges(text), style);
            } else if let Some(child) = ElementRef::wrap(child) {
                paragraph = self.append_inline(paragraph, child, style);
            }
        }
        paragraph
    }

    fn append_inline(
        &self,
        paragraph: DocxParagraph,
        el: ElementRef<'_>,
        mut style: InlineStyle,
    ) -> DocxParagraph {
        match dom::tag_name(&el) {
            name if SKIPPED.contains(&name) => return paragraph,
            "br" => return paragraph.add_run(DocxRun::new().add_break(BreakType::TextWrapping)),
            "strong" | "b" => style.bold = true,
            "em" | "i" => style.italic = true,
            "u" | "ins" => style.underline = true,
            "s" | "del" | "strike" => style.strike = true,
            "code" | "kbd" | "samp" => style.mono = true,
            _ => {}
        }
        self.append_inline_children(paragraph, el, style)
    }

    fn add_text_run(
        &self,
        paragraph: DocxParagraph,
        text: &str,
        style: InlineStyle,
    ) -> DocxParagraph {
        if text.is_empty() {
            return paragraph;
        }
        let mut run = DocxRun::new().add_text(text.to_string());

        if style.bold {
            run = run.bold();
        }
        if style.italic {
            run = run.italic();
        }
        if style.underline {
            run = run.underline("single");
        }
        if style.strike {
            run = run.strike();
        }

        let family = if style.mono {
            &self.mono_font_family
        } else {
            &self.default_font_family
        };
        run = run.fonts(RunFonts::new().ascii(family).hi_ansi(family));

        // size > 0 means a specific caller (e.g., heading) provided size.
        let effective_size = if style.size > 0 {
            style.size
        } else {
            self.default_font_size
        };
        if effective_size > 0 {
            run = run.size(effective_size);
        }

        paragraph.add_run(run)
    }

    fn body_paragraph_spacing(&self) -> (u32, u32) {
        // baseline: before = 0, after = 160 twips (~8pt)
        let ratio = self.default_font_size as f32 / 2.0 / 11.0;
        let after = (160.0 * ratio).round().max(20.0) as u32;
        (0, after)
    }

    fn new_body_paragraph(&self) -> DocxParagraph {
        let (before, after) = self.body_paragraph_spacing();
        DocxParagraph::new().line_spacing(docx_rs::LineSpacing::new().before(before).after(after))
    }

    /// Converts a full HTML document into a docx package.
    pub fn convert(&self, html: &str) -> Result<Bytes, ExportError> {
        let shell = Document::parse(&Page::from_html(html));
        let mut blocks = Vec::new();
        self.render_flow(shell.root(), 0, &mut blocks);

        let mut docx = Docx::new();
        if self.landscape {
            docx = docx
                .page_size(PAGE_HEIGHT, PAGE_WIDTH)
                .page_orient(PageOrientationType::Landscape);
        }
        for block in blocks {
            docx = match block {
                Block::Paragraph(p) => docx.add_paragraph(p),
                Block::Table(t) => docx.add_table(t),
            };
        }

        let mut cursor = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut cursor)
            .map_err(|err| ExportError::ConversionFailure(format!("Docx: {err}")))?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

impl Export for DocxExporter {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError> {
        let settings: DocxSettings = config.options.settings()?;
        let element = document.require_element(&config.element_id_or_content)?;

        // the element is converted as a standalone document
        let content = format!("<!DOCTYPE html>{}", element.html());
        let bytes = self.with_settings(settings).convert(&content)?;

        Ok(Exported::new(bytes, DOCX_MIME))
    }
}
