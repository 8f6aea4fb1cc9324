//! The page being exported and the DOM queries the adapters rely on.

use std::{collections::HashSet, fs, path::Path, sync::Arc};

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ExportError;

/// HTML source of the page that export targets are looked up in.
///
/// Cheap to clone; parsing happens per export on the worker thread since the
/// parsed tree is not `Send`.
#[derive(Debug, Clone)]
pub struct Page {
    html: Arc<str>,
}

impl Page {
    pub fn from_html(html: impl Into<Arc<str>>) -> Self {
        Self { html: html.into() }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ExportError> {
        Ok(Self::from_html(fs::read_to_string(path)?))
    }

    pub fn html(&self) -> &str {
        &self.html
    }
}

pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(page: &Page) -> Self {
        Self {
            html: Html::parse_document(page.html()),
        }
    }

    pub fn parse_fragment(content: &str) -> Self {
        Self {
            html: Html::parse_fragment(content),
        }
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.html.root_element()
    }

    pub fn element_by_id(&self, id: &str) -> Option<ElementRef<'_>> {
        self.html
            .tree
            .nodes()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().id() == Some(id))
    }

    pub fn require_element(&self, id: &str) -> Result<ElementRef<'_>, ExportError> {
        self.element_by_id(id)
            .ok_or_else(|| ExportError::TargetNotFound(id.to_string()))
    }
}

pub fn selector(css: &str) -> Result<Selector, ExportError> {
    Selector::parse(css)
        .map_err(|e| ExportError::ConversionFailure(format!("Selector {css:?}: {e}")))
}

pub fn tag_name<'a>(el: &ElementRef<'a>) -> &'a str {
    el.value().name()
}

pub fn is_tag(el: &ElementRef<'_>, name: &str) -> bool {
    tag_name(el).eq_ignore_ascii_case(name)
}

pub fn child_elements<'a>(el: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    el.children().filter_map(ElementRef::wrap)
}

/// Concatenated text of all descendant text nodes.
pub fn text_content(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Visible text approximation: whitespace runs collapse to a single space.
pub fn inner_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&text_content(el))
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace runs but keeps a single leading/trailing space so
/// inline siblings stay separated.
pub fn collapse_keep_edges(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return if text.is_empty() {
            String::new()
        } else {
            " ".to_string()
        };
    }
    let lead = if text.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if text.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{collapsed}{trail}")
}

/// Text of a direct text node child, if `node` is one.
pub fn node_text<'a>(node: &'a Node) -> Option<&'a str> {
    match node {
        Node::Text(text) => Some(&**text),
        _ => None,
    }
}

/// Rows of a `<table>` in `HTMLTableElement.rows` order: header rows, then
/// body rows and direct rows, then footer rows.
pub fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut head = Vec::new();
    let mut body = Vec::new();
    let mut foot = Vec::new();

    for child in child_elements(table) {
        match tag_name(&child) {
            "tr" => body.push(child),
            "thead" => head.extend(child_elements(child).filter(|c| is_tag(c, "tr"))),
            "tbody" => body.extend(child_elements(child).filter(|c| is_tag(c, "tr"))),
            "tfoot" => foot.extend(child_elements(child).filter(|c| is_tag(c, "tr"))),
            _ => {}
        }
    }

    head.extend(body);
    head.extend(foot);
    head
}

/// `td`/`th` children of a row.
pub fn row_cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    child_elements(row)
        .filter(|c| is_tag(c, "td") || is_tag(c, "th"))
        .collect()
}

fn span_attr(el: &ElementRef<'_>, name: &str) -> usize {
    el.value()
        .attr(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
    pub text: String,
    pub header: bool,
}

impl GridCell {
    pub fn is_merged(&self) -> bool {
        self.row_span > 1 || self.col_span > 1
    }
}

/// Cells of every `tr` below `el`, positioned on a grid that honors
/// `rowspan` and `colspan`.
pub fn table_grid(el: ElementRef<'_>) -> Vec<GridCell> {
    let rows = el
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| is_tag(e, "tr"));
    let mut occupied = HashSet::new();
    let mut cells = Vec::new();

    for (r, row) in rows.enumerate() {
        let mut col = 0;
        for cell in row_cells(row) {
            while occupied.contains(&(r, col)) {
                col += 1;
            }
            let row_span = span_attr(&cell, "rowspan");
            // a colspan stops at a slot already taken by a rowspan from above
            let col_span = (1..span_attr(&cell, "colspan"))
                .take_while(|dc| !occupied.contains(&(r, col + dc)))
                .count()
                + 1;
            for dr in 0..row_span {
                for dc in 0..col_span {
                    occupied.insert((r + dr, col + dc));
                }
            }
            cells.push(GridCell {
                row: r,
                col,
                row_span,
                col_span,
                text: inner_text(cell),
                header: is_tag(&cell, "th"),
            });
            col += col_span;
        }
    }

    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
        <div id="wrap"><table id="t">
          <tfoot><tr><td>foot</td></tr></tfoot>
          <thead><tr><th>Name</th><th>Age</th></tr></thead>
          <tbody><tr><td>  Bob
             Smith </td><td>30</td></tr></tbody>
        </table></div>
        </body></html>"#;

    #[test]
    fn test_element_by_id() {
        let doc = Document::parse(&Page::from_html(PAGE));
        assert_eq!(tag_name(&doc.require_element("t").unwrap()), "table");
        assert!(matches!(
            doc.require_element("missing"),
            Err(ExportError::TargetNotFound(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_table_rows_order() {
        let doc = Document::parse(&Page::from_html(PAGE));
        let rows = table_rows(doc.require_element("t").unwrap());
        let firsts: Vec<String> = rows
            .iter()
            .map(|r| inner_text(row_cells(*r)[0]))
            .collect();
        assert_eq!(firsts, vec!["Name", "Bob Smith", "foot"]);
    }

    #[test]
    fn test_table_grid_spans() {
        let page = Page::from_html(
            r#"<table id="g">
                <tr><td rowspan="2">a</td><td colspan="2">b</td></tr>
                <tr><td>c</td><td>d</td></tr>
            </table>"#,
        );
        let doc = Document::parse(&page);
        let grid = table_grid(doc.require_element("g").unwrap());
        let positions: Vec<(usize, usize, &str)> = grid
            .iter()
            .map(|c| (c.row, c.col, c.text.as_str()))
            .collect();
        assert_eq!(
            positions,
            vec![(0, 0, "a"), (0, 1, "b"), (1, 1, "c"), (1, 2, "d")]
        );
        assert!(grid[0].is_merged());
        assert_eq!(grid[1].col_span, 2);
    }

    #[test]
    fn test_colspan_stops_at_rowspan_from_above() {
        let page = Page::from_html(
            r#"<table id="g">
                <tr><td>a</td><td rowspan="2">b</td></tr>
                <tr><td colspan="3">c</td></tr>
            </table>"#,
        );
        let doc = Document::parse(&page);
        let grid = table_grid(doc.require_element("g").unwrap());
        let placed: Vec<(usize, usize, usize, usize)> = grid
            .iter()
            .map(|c| (c.row, c.col, c.row_span, c.col_span))
            .collect();
        assert_eq!(placed, vec![(0, 0, 1, 1), (0, 1, 2, 1), (1, 0, 1, 1)]);
    }
}
